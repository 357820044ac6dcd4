use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use gzagg_core::catalog::catalog;
use gzagg_core::codec::CodecId;
use gzagg_core::config::AggregatorConfig;
use gzagg_core::error::{AggError, Result};
use gzagg_core::{Aggregator, RunSummary};
use tracing::info;

use crate::presentation::cli::ConfigArgs;

fn load_config(args: ConfigArgs) -> Result<AggregatorConfig> {
    let mut cfg = match args.config {
        Some(path) => AggregatorConfig::load(&path)?,
        None => AggregatorConfig::load_default()?,
    };
    if let Some(loc) = args.files_location {
        cfg.files_location = loc;
        cfg.resolve_placeholders()?;
    }
    Ok(cfg)
}

fn print_summary(s: &RunSummary) {
    println!("files mapped:      {}", s.files_mapped);
    println!("workers started:   {}", s.workers_started);
    println!("files consumed:    {}", s.files_consumed);
    println!("batches:           {} ({} failed)", s.batches, s.batch_errors);
    println!("lines kept:        {}", s.lines_kept);
    println!("lines discarded:   {}", s.lines_discarded);
    println!("unique lines:      {}", s.unique_lines);
    println!(
        "results persisted: {} ({} failures)",
        s.persisted, s.persist_failures
    );
    if let Some(first) = &s.first_failure {
        println!("first failure:     {first}");
    }
}

pub fn handle_run(
    config: ConfigArgs,
    workers: Option<usize>,
    max_batch_size: Option<u64>,
) -> Result<()> {
    let mut cfg = load_config(config)?;
    if let Some(w) = workers {
        cfg.max_workers = w;
    }
    if let Some(m) = max_batch_size {
        cfg.max_aggregated_file_size = m;
    }
    cfg.validate()?;
    info!(files_location = %cfg.files_location, workers = cfg.max_workers, "configuration loaded");

    let summary = Aggregator::from_config(cfg)?.run()?;
    print_summary(&summary);
    match summary.first_failure {
        Some(first) if summary.batch_errors > 0 => Err(AggError::FilesFailed {
            count: summary.batch_errors,
            first,
        }),
        _ => Ok(()),
    }
}

pub fn handle_catalog(config: ConfigArgs) -> Result<()> {
    let cfg = load_config(config)?;
    let files = catalog(&cfg.files_root(), &cfg.extension, cfg.gzip_avg_header_size)?;
    let mut out = std::io::stdout().lock();
    let mut total = 0u64;
    for f in &files {
        writeln!(out, "{}  ~{} bytes", f.path.display(), f.estimated_size)?;
        total += f.estimated_size;
    }
    writeln!(out, "{} files, ~{} bytes estimated", files.len(), total)?;
    Ok(())
}

pub fn handle_cat(artifact: PathBuf, codec: Option<String>) -> Result<()> {
    let codec = match codec.as_deref() {
        Some("gzip") => CodecId::Gzip,
        Some("zstd") => CodecId::Zstd,
        Some(other) => return Err(AggError::Config(format!("unknown codec {other:?}"))),
        None => CodecId::from_suffix(&artifact.to_string_lossy())?,
    };
    let mut src = BufReader::new(File::open(&artifact)?);
    let mut out = std::io::stdout().lock();
    codec.compressor().decompress(&mut src, &mut out)?;
    out.flush()?;
    Ok(())
}
