use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::config::SinkConfig;
use crate::domain::{AggregatedResult, WorkerRecord};
use crate::error::Result;

/// Outcome of draining one result stream into a sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub persisted: u64,
    pub failed: u64,
}

/// Persistence collaborator for sealed batches.
pub trait Sink: Send + Sync {
    /// Called once per worker at startup. Callers log failures and carry on.
    fn register_worker(&self, worker: &WorkerRecord) -> Result<()>;

    /// Drain `results` until every sender is gone. A failure to persist one result
    /// is counted in the report and does not stop the drain. Returning is the
    /// completion signal.
    fn ingest(&self, results: Receiver<AggregatedResult>) -> Result<IngestReport>;

    /// Remove everything persisted by earlier runs.
    fn truncate_all(&self) -> Result<()>;
}

pub fn open_sink(cfg: &SinkConfig) -> Result<Arc<dyn Sink>> {
    match cfg {
        SinkConfig::Directory { location } => Ok(Arc::new(fs::DirectorySink::open(location)?)),
        SinkConfig::Memory => Ok(Arc::new(memory::MemorySink::new())),
    }
}

pub mod fs;
pub mod memory;
