use crossbeam_channel::{Receiver, bounded};
use tracing::info;

use super::worker::{Worker, WorkerHandle};
use crate::domain::FileDescriptor;
use crate::error::Result;

/// Load every descriptor into a closed queue sized to hold all of them.
/// Each descriptor is received by exactly one consumer.
pub fn work_queue(files: Vec<FileDescriptor>) -> Receiver<FileDescriptor> {
    let (tx, rx) = bounded(files.len().max(1));
    for f in files {
        // Capacity covers every item and `rx` is alive, so this cannot block or fail.
        if tx.send(f).is_err() {
            break;
        }
    }
    rx
}

/// Start every worker on the shared queue.
pub fn fan_out(workers: Vec<Worker>, queue: &Receiver<FileDescriptor>) -> Result<Vec<WorkerHandle>> {
    info!(workers = workers.len(), queued = queue.len(), "starting workers");
    workers
        .into_iter()
        .map(|w| w.start(queue.clone()))
        .collect()
}
