use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "gzagg: deduplicating gzip log aggregator", long_about = None)]
pub struct Cli {
    /// tracing filter, e.g. "info" or "gzagg_core=debug" (defaults to RUST_LOG, then info)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// JSON configuration file (defaults to ./Aggregator.json)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// override files_location; "#wd" expands to the working directory
    #[arg(long)]
    pub files_location: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate every input file once and hand the batches to the sink
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// override max_workers
        #[arg(long)]
        workers: Option<usize>,
        /// override max_aggregated_file_size (bytes)
        #[arg(long)]
        max_batch_size: Option<u64>,
    },

    /// List the files a run would pick up, with their size estimates
    Catalog {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Decompress a sealed batch artifact to stdout
    Cat {
        artifact: PathBuf,
        /// codec of the artifact; inferred from its extension when omitted
        #[arg(long, value_parser = ["gzip", "zstd"])]
        codec: Option<String>,
    },
}
