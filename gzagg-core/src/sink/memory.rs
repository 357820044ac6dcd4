use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Receiver;
use tracing::{error, info};
use uuid::Uuid;

use super::{IngestReport, Sink};
use crate::domain::{AggregatedResult, WorkerRecord};
use crate::error::{AggError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Truncate,
    RegisterWorker(Uuid),
    IngestStarted,
    Persisted(Uuid),
    IngestFinished,
}

/// Keeps everything in process memory and records the order of calls.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<AggregatedResult>>,
    workers: Mutex<Vec<WorkerRecord>>,
    events: Mutex<Vec<SinkEvent>>,
    // Number of upcoming persists that should fail.
    fail_next: AtomicUsize,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose first `n` persists fail.
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_next: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn results(&self) -> Vec<AggregatedResult> {
        locked(&self.results).clone()
    }

    pub fn workers(&self) -> Vec<WorkerRecord> {
        locked(&self.workers).clone()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        locked(&self.events).clone()
    }

    fn persist(&self, r: AggregatedResult) -> Result<()> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(AggError::Sink(format!("rejected {}", r.id)));
        }
        locked(&self.events).push(SinkEvent::Persisted(r.id));
        locked(&self.results).push(r);
        Ok(())
    }
}

impl Sink for MemorySink {
    fn register_worker(&self, worker: &WorkerRecord) -> Result<()> {
        locked(&self.events).push(SinkEvent::RegisterWorker(worker.id));
        locked(&self.workers).push(worker.clone());
        Ok(())
    }

    fn ingest(&self, results: Receiver<AggregatedResult>) -> Result<IngestReport> {
        locked(&self.events).push(SinkEvent::IngestStarted);
        let mut report = IngestReport::default();
        for r in results.iter() {
            let id = r.id;
            match self.persist(r) {
                Ok(()) => report.persisted += 1,
                Err(e) => {
                    error!(%id, error = %e, "failed to store result");
                    report.failed += 1;
                }
            }
        }
        locked(&self.events).push(SinkEvent::IngestFinished);
        info!(persisted = report.persisted, failed = report.failed, "memory sink drained");
        Ok(report)
    }

    fn truncate_all(&self) -> Result<()> {
        locked(&self.results).clear();
        locked(&self.workers).clear();
        locked(&self.events).push(SinkEvent::Truncate);
        Ok(())
    }
}
