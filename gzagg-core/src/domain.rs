// gzagg_core/src/domain.rs
use std::path::PathBuf;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::codec::CodecId;

/// Separator written around every contributing file name, e.g. `|a.gz|b.gz|`.
pub const FILES_DELIMITER: char = '|';

/// A cataloged input file. `estimated_size` is the on-disk size minus the configured
/// average compressed-header size, clamped at zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub estimated_size: u64,
}

impl FileDescriptor {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// A sealed, compressed batch ready for persistence.
#[derive(Clone, Debug)]
pub struct AggregatedResult {
    pub id: Uuid,
    pub data: Vec<u8>,
    pub codec: CodecId,
    pub files: Vec<String>,
    pub worker_id: Uuid,
    pub worker_number: usize,
    pub sequence: usize,
    pub produced_at: OffsetDateTime,
}

impl AggregatedResult {
    /// Contributing file names in consumption order, joined as `|a|b|`.
    pub fn aggregated_files(&self) -> String {
        let mut out = String::from(FILES_DELIMITER);
        for name in &self.files {
            out.push_str(name);
            out.push(FILES_DELIMITER);
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct WorkerRecord {
    pub id: Uuid,
    pub number: usize,
    pub started_at: OffsetDateTime,
}
