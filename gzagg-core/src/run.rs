use std::fs;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use tracing::{error, info, warn};

use crate::catalog::catalog;
use crate::config::AggregatorConfig;
use crate::dedup::DedupSet;
use crate::error::{AggError, Result};
use crate::pipeline::dispatch::{fan_out, work_queue};
use crate::pipeline::merge::merge;
use crate::pipeline::worker::{Worker, WorkerSettings};
use crate::sink::{Sink, open_sink};
use crate::stats::RunSummary;

/// Runs catalog → workers → merge → sink once per call.
pub struct Aggregator {
    config: AggregatorConfig,
    sink: Arc<dyn Sink>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig, sink: Arc<dyn Sink>) -> Self {
        Self { config, sink }
    }

    /// Build with the sink named in the configuration.
    pub fn from_config(config: AggregatorConfig) -> Result<Self> {
        let sink = open_sink(&config.sink)?;
        Ok(Self::new(config, sink))
    }

    /// Execute one full pass over the configured files.
    ///
    /// A file that cannot be opened or decoded does not stop the run; it is
    /// counted in `batch_errors` and the first one is kept in `first_failure`.
    /// Only startup and structural failures come back as `Err`.
    pub fn run(&self) -> Result<RunSummary> {
        let mut cfg = self.config.clone();
        cfg.resolve_placeholders()?;
        cfg.validate()?;
        let cfg = &cfg;
        let settings = WorkerSettings::from_config(cfg)?;

        if let Some(dir) = &settings.artifact_dir {
            fs::create_dir_all(dir)?;
        }

        if cfg.truncate_every_run {
            self.sink.truncate_all()?;
            info!("truncate finished");
        }

        let files = catalog(&cfg.files_root(), &cfg.extension, cfg.gzip_avg_header_size)?;
        let mut summary = RunSummary {
            files_mapped: files.len() as u64,
            ..RunSummary::default()
        };
        info!("{} files were mapped", files.len());

        // One dedup set for the whole run, shared by every worker.
        let dedup = Arc::new(DedupSet::new());
        let queue = work_queue(files);
        let workers = (0..cfg.max_workers)
            .map(|n| Worker::new(n, settings.clone(), Arc::clone(&dedup), Arc::clone(&self.sink)))
            .collect();
        let handles = fan_out(workers, &queue)?;
        drop(queue);
        summary.workers_started = handles.len() as u64;

        let mut joins = Vec::with_capacity(handles.len());
        let mut streams = Vec::with_capacity(handles.len());
        for h in handles {
            joins.push((h.number, h.join));
            streams.push(h.results);
        }
        let merged = merge(streams)?;

        info!("inserting results into the sink");
        let (to_sink, sink_rx) = bounded(0);
        let sink = Arc::clone(&self.sink);
        let ingest = thread::Builder::new()
            .name("gzagg-sink".into())
            .spawn(move || sink.ingest(sink_rx))
            .map_err(|e| AggError::Worker(format!("spawn sink: {e}")))?;

        let mut first_failure: Option<AggError> = None;
        let mut sink_open = true;
        for item in merged.results.iter() {
            match item {
                Ok(r) if sink_open => {
                    if to_sink.send(r).is_err() {
                        warn!("sink stopped reading; remaining results are discarded");
                        sink_open = false;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "batch failed");
                    first_failure.get_or_insert(e);
                }
            }
        }
        drop(to_sink);

        for (n, join) in joins {
            let stats = join
                .join()
                .map_err(|_| AggError::Worker(format!("worker {n} panicked")))?;
            summary.absorb(&stats);
        }
        merged.join()?;

        let report = ingest
            .join()
            .map_err(|_| AggError::Worker("sink thread panicked".into()))??;
        summary.persisted = report.persisted;
        summary.persist_failures = report.failed;
        summary.unique_lines = dedup.len() as u64;
        summary.first_failure = first_failure.map(|e| e.to_string());

        info!(
            files_mapped = summary.files_mapped,
            workers = summary.workers_started,
            batches = summary.batches,
            batch_errors = summary.batch_errors,
            lines_kept = summary.lines_kept,
            lines_discarded = summary.lines_discarded,
            unique_lines = summary.unique_lines,
            persisted = summary.persisted,
            persist_failures = summary.persist_failures,
            "done"
        );

        Ok(summary)
    }
}
