use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// blake3 digest of one line's exact bytes, terminator included.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineFingerprint([u8; 32]);

impl LineFingerprint {
    pub fn of(line: &[u8]) -> Self {
        Self(*blake3::hash(line).as_bytes())
    }
}

impl fmt::Debug for LineFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineFingerprint({})", blake3::Hash::from(self.0).to_hex())
    }
}

/// Run-wide record of every line fingerprint already emitted.
///
/// Shared by all workers behind one mutex. The lock is held for a single
/// membership operation and never across I/O. Nothing is ever evicted.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<LineFingerprint>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fp: &LineFingerprint) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(fp)
    }

    /// Record `fp`. Returns true if it was not present before this call, so among
    /// concurrent callers with the same fingerprint exactly one sees `true`.
    pub fn record(&self, fp: LineFingerprint) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fp)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
