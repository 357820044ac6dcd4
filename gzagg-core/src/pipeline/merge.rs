use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, bounded};
use tracing::debug;

use crate::error::{AggError, Result};

/// Combined stream of several sources. Each forwarder owns a clone of the only
/// sender and drops it when its source closes, so `results` disconnects once the
/// last source is exhausted.
pub struct Merged<T> {
    pub results: Receiver<T>,
    forwarders: Vec<JoinHandle<u64>>,
}

impl<T> Merged<T> {
    /// Wait for the forwarders and return how many items each one moved.
    pub fn join(self) -> Result<Vec<u64>> {
        self.forwarders
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| AggError::Worker("merge forwarder panicked".into()))
            })
            .collect()
    }
}

/// Fan in: one forwarding thread per source copies every item into a shared
/// rendezvous channel. Ordering across sources follows arrival timing.
pub fn merge<T: Send + 'static>(sources: Vec<Receiver<T>>) -> Result<Merged<T>> {
    let (tx, rx) = bounded(0);
    let mut forwarders = Vec::with_capacity(sources.len());

    for (i, src) in sources.into_iter().enumerate() {
        let tx = tx.clone();
        let h = thread::Builder::new()
            .name(format!("gzagg-merge-{i}"))
            .spawn(move || {
                let mut moved = 0u64;
                for item in src.iter() {
                    if tx.send(item).is_err() {
                        break;
                    }
                    moved += 1;
                }
                debug!(source = i, moved, "source closed");
                moved
            })
            .map_err(|e| AggError::Worker(format!("spawn merge forwarder {i}: {e}")))?;
        forwarders.push(h);
    }
    // Forwarders now hold the only senders.
    drop(tx);

    Ok(Merged {
        results: rx,
        forwarders,
    })
}
