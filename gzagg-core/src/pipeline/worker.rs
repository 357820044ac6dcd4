use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::batch::{Batch, SealedBatch};
use crate::codec::CodecId;
use crate::config::AggregatorConfig;
use crate::dedup::DedupSet;
use crate::domain::{AggregatedResult, FileDescriptor, WorkerRecord};
use crate::error::{AggError, Result};
use crate::line_source::LineSource;
use crate::sink::Sink;
use crate::stats::WorkerStats;

/// One item of a worker's result stream. `Err` reports a file that could not be
/// opened or decoded.
pub type WorkerOutput = Result<AggregatedResult>;

#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub max_batch_size: u64,
    pub input_codec: CodecId,
    pub batch_codec: CodecId,
    pub compression_level: i32,
    /// When set, every sealed batch is also written here (best effort).
    pub artifact_dir: Option<PathBuf>,
}

impl WorkerSettings {
    pub fn from_config(cfg: &AggregatorConfig) -> Result<Self> {
        Ok(Self {
            max_batch_size: cfg.max_aggregated_file_size,
            input_codec: cfg.input_codec()?,
            batch_codec: cfg.batch_codec,
            compression_level: cfg.compression_level,
            artifact_dir: cfg
                .save_files_to_disk
                .then(|| cfg.local_folder_location.clone()),
        })
    }
}

/// Why a batch stopped taking files.
enum Fill {
    /// The work queue is closed and drained.
    Exhausted,
    /// The next descriptor did not fit and is held for the next batch.
    Full,
    /// A file failed to open or decode; the descriptor is dropped.
    Failed(AggError),
}

pub struct WorkerHandle {
    pub number: usize,
    pub id: Uuid,
    pub results: Receiver<WorkerOutput>,
    pub join: JoinHandle<WorkerStats>,
}

/// Turns files from the shared queue into deduplicated, compressed batches.
pub struct Worker {
    record: WorkerRecord,
    settings: WorkerSettings,
    dedup: Arc<DedupSet>,
    sink: Arc<dyn Sink>,
    pending: Option<FileDescriptor>,
    sequence: usize,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        number: usize,
        settings: WorkerSettings,
        dedup: Arc<DedupSet>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            record: WorkerRecord {
                id: Uuid::new_v4(),
                number,
                started_at: OffsetDateTime::now_utc(),
            },
            settings,
            dedup,
            sink,
            pending: None,
            sequence: 0,
            stats: WorkerStats::default(),
        }
    }

    /// Spawn the worker on its own thread. Results are handed over through a
    /// rendezvous channel, so the worker waits until its consumer takes each one.
    pub fn start(self, files: Receiver<FileDescriptor>) -> Result<WorkerHandle> {
        let (tx, rx) = bounded(0);
        let number = self.record.number;
        let id = self.record.id;
        let join = thread::Builder::new()
            .name(format!("gzagg-worker-{number}"))
            .spawn(move || self.run(files, tx))
            .map_err(|e| AggError::Worker(format!("spawn worker {number}: {e}")))?;
        Ok(WorkerHandle {
            number,
            id,
            results: rx,
            join,
        })
    }

    /// Produce batches until the queue is drained. Always emits at least one
    /// result, even when no file was ever received.
    ///
    /// The queue must already hold every descriptor and be closed: emptiness after
    /// a sealed batch is taken to mean there is no more work.
    pub fn run(mut self, files: Receiver<FileDescriptor>, out: Sender<WorkerOutput>) -> WorkerStats {
        if let Err(e) = self.sink.register_worker(&self.record) {
            warn!(worker = self.record.number, error = %e, "worker registration failed");
        }
        info!(worker = self.record.number, id = %self.record.id, "worker started");

        loop {
            let (batch, fill) = self.fill_batch(&files);
            let mut items = vec![self.seal(batch)];
            if let Fill::Failed(e) = fill {
                self.stats.batch_errors += 1;
                items.push(Err(e));
            }
            for item in items {
                if out.send(item).is_err() {
                    warn!(worker = self.record.number, "result stream closed early");
                    return self.stats;
                }
            }
            if self.pending.is_none() && files.is_empty() {
                break;
            }
        }

        info!(
            worker = self.record.number,
            files = self.stats.files,
            batches = self.stats.batches,
            "worker finished"
        );
        self.stats
    }

    fn fill_batch(&mut self, files: &Receiver<FileDescriptor>) -> (Batch, Fill) {
        let mut batch = Batch::new();
        loop {
            let next = match self.pending.take() {
                Some(d) => d,
                None => match files.recv() {
                    Ok(d) => d,
                    Err(_) => return (batch, Fill::Exhausted),
                },
            };
            if batch.is_full_for(next.estimated_size, self.settings.max_batch_size) {
                debug!(
                    worker = self.record.number,
                    current = batch.current_size(),
                    next = next.estimated_size,
                    "batch full"
                );
                self.pending = Some(next);
                return (batch, Fill::Full);
            }

            self.stats.files += 1;
            let mut src = match LineSource::open(&next.path, self.settings.input_codec) {
                Ok(src) => src,
                Err(e) => {
                    warn!(worker = self.record.number, path = %next.path.display(), error = %e, "dropping file");
                    return (batch, Fill::Failed(e));
                }
            };
            batch.add_file(next.file_name());
            while let Some(line) = src.next_line() {
                batch.offer_line(line, &self.dedup);
            }
        }
    }

    fn seal(&mut self, batch: Batch) -> WorkerOutput {
        let sealed = batch.seal(self.settings.batch_codec, self.settings.compression_level)?;
        let sequence = self.sequence;
        self.sequence += 1;
        self.stats.batches += 1;
        self.stats.lines_kept += sealed.lines_kept;
        self.stats.lines_discarded += sealed.lines_discarded;
        self.write_artifact(sequence, &sealed);

        info!(
            worker = self.record.number,
            batch = sequence,
            files = sealed.files.len(),
            bytes = sealed.raw_len,
            compressed = sealed.data.len(),
            "batch sealed"
        );
        Ok(AggregatedResult {
            id: Uuid::new_v4(),
            data: sealed.data,
            codec: self.settings.batch_codec,
            files: sealed.files,
            worker_id: self.record.id,
            worker_number: self.record.number,
            sequence,
            produced_at: OffsetDateTime::now_utc(),
        })
    }

    fn write_artifact(&self, sequence: usize, sealed: &SealedBatch) {
        let Some(dir) = &self.settings.artifact_dir else {
            return;
        };
        let path = dir.join(format!(
            "worker-{}-{}.{}",
            self.record.number,
            sequence,
            self.settings.batch_codec.extension()
        ));
        if let Err(e) = fs::write(&path, &sealed.data) {
            warn!(path = %path.display(), error = %e, "could not write local artifact");
        }
    }
}
