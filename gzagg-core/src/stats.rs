use serde::{Deserialize, Serialize};

/// Counters reported at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_mapped: u64,
    pub workers_started: u64,
    pub files_consumed: u64,
    pub batches: u64,
    pub batch_errors: u64,
    pub lines_kept: u64,
    pub lines_discarded: u64,
    /// Distinct line fingerprints recorded during the run.
    pub unique_lines: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    /// First file that could not be opened or decoded, if any.
    pub first_failure: Option<String>,
}

/// Per-worker counters, folded into [`RunSummary`] once the worker exits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub files: u64,
    pub batches: u64,
    pub batch_errors: u64,
    pub lines_kept: u64,
    pub lines_discarded: u64,
}

impl RunSummary {
    pub fn absorb(&mut self, w: &WorkerStats) {
        self.files_consumed += w.files;
        self.batches += w.batches;
        self.batch_errors += w.batch_errors;
        self.lines_kept += w.lines_kept;
        self.lines_discarded += w.lines_discarded;
    }
}
