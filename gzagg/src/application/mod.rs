pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use gzagg_core::error::Result;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    match cli.command {
        Commands::Run {
            config,
            workers,
            max_batch_size,
        } => handlers::handle_run(config, workers, max_batch_size),
        Commands::Catalog { config } => handlers::handle_catalog(config),
        Commands::Cat { artifact, codec } => handlers::handle_cat(artifact, codec),
    }
}
