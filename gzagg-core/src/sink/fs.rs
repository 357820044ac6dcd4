use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{IngestReport, Sink};
use crate::codec::CodecId;
use crate::domain::{AggregatedResult, WorkerRecord};
use crate::error::{AggError, Result};

const DOCUMENTS_DIR: &str = "documents";
const DOCUMENTS_TABLE: &str = "documents.jsonl";
const WORKERS_TABLE: &str = "workers.jsonl";

/// One persisted batch, as stored in `documents.jsonl`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRow {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub processed: String,
    pub aggregate_files: String,
    pub codec: CodecId,
    pub data_file: String,
    pub bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRow {
    pub id: Uuid,
    pub number: usize,
    pub start_date: String,
}

/// Sink that keeps batch payloads as files and their metadata as JSON lines:
///
/// ```text
/// <root>/documents/<id>.csv.gz
/// <root>/documents.jsonl
/// <root>/workers.jsonl
/// ```
pub struct DirectorySink {
    root: PathBuf,
    // Serializes appends from concurrently registering workers.
    workers_lock: Mutex<()>,
}

fn timestamp(t: OffsetDateTime) -> Result<String> {
    t.format(&Rfc3339)
        .map_err(|e| AggError::Sink(format!("timestamp format: {e}")))
}

fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let mut line = serde_json::to_vec(row)?;
    line.push(b'\n');
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(&line)?;
    Ok(())
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut rows = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

impl DirectorySink {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(DOCUMENTS_DIR))
            .map_err(|e| AggError::Sink(format!("cannot create {}: {e}", root.display())))?;
        Ok(Self {
            root: root.to_path_buf(),
            workers_lock: Mutex::new(()),
        })
    }

    pub fn documents(&self) -> Result<Vec<DocumentRow>> {
        read_rows(&self.root.join(DOCUMENTS_TABLE))
    }

    pub fn workers(&self) -> Result<Vec<WorkerRow>> {
        read_rows(&self.root.join(WORKERS_TABLE))
    }

    /// Absolute path of a document's payload file.
    pub fn data_path(&self, row: &DocumentRow) -> PathBuf {
        self.root.join(DOCUMENTS_DIR).join(&row.data_file)
    }

    /// Payload first, then its row. A payload whose row cannot be appended is
    /// removed again so no unlisted file stays behind.
    fn persist(&self, r: &AggregatedResult) -> Result<()> {
        let data_file = format!("{}.{}", r.id, r.codec.extension());
        let data_path = self.root.join(DOCUMENTS_DIR).join(&data_file);
        fs::write(&data_path, &r.data)?;
        let row = DocumentRow {
            id: r.id,
            worker_id: r.worker_id,
            processed: timestamp(r.produced_at)?,
            aggregate_files: r.aggregated_files(),
            codec: r.codec,
            data_file,
            bytes: r.data.len() as u64,
        };
        let appended = append_row(&self.root.join(DOCUMENTS_TABLE), &row);
        if appended.is_err() {
            if let Err(e) = fs::remove_file(&data_path) {
                warn!(path = %data_path.display(), error = %e, "could not remove orphaned payload");
            }
        }
        appended
    }
}

impl Sink for DirectorySink {
    fn register_worker(&self, worker: &WorkerRecord) -> Result<()> {
        let row = WorkerRow {
            id: worker.id,
            number: worker.number,
            start_date: timestamp(worker.started_at)?,
        };
        let _guard = self.workers_lock.lock().unwrap_or_else(PoisonError::into_inner);
        append_row(&self.root.join(WORKERS_TABLE), &row)
    }

    fn ingest(&self, results: Receiver<AggregatedResult>) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for r in results.iter() {
            match self.persist(&r) {
                Ok(()) => {
                    debug!(id = %r.id, bytes = r.data.len(), "document stored");
                    report.persisted += 1;
                }
                Err(e) => {
                    error!(id = %r.id, error = %e, "failed to store document");
                    report.failed += 1;
                }
            }
        }
        info!(
            persisted = report.persisted,
            failed = report.failed,
            "{} successful results and {} failures",
            report.persisted,
            report.failed
        );
        Ok(report)
    }

    fn truncate_all(&self) -> Result<()> {
        let docs = self.root.join(DOCUMENTS_DIR);
        if docs.exists() {
            fs::remove_dir_all(&docs)?;
        }
        fs::create_dir_all(&docs)?;
        File::create(self.root.join(DOCUMENTS_TABLE))?;
        File::create(self.root.join(WORKERS_TABLE))?;
        info!(root = %self.root.display(), "sink truncated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use time::macros::datetime;

    fn result(files: &[&str], data: &[u8]) -> AggregatedResult {
        AggregatedResult {
            id: Uuid::new_v4(),
            data: data.to_vec(),
            codec: CodecId::Gzip,
            files: files.iter().map(|s| s.to_string()).collect(),
            worker_id: Uuid::new_v4(),
            worker_number: 0,
            sequence: 0,
            produced_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let t = datetime!(2024-01-02 03:04:05 UTC);
        assert_eq!(timestamp(t).unwrap(), "2024-01-02T03:04:05Z");
    }

    #[test]
    fn ingest_writes_payload_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::open(dir.path()).unwrap();
        let (tx, rx) = unbounded();
        let r = result(&["a.gz", "b.gz"], b"payload");
        tx.send(r.clone()).unwrap();
        drop(tx);

        let report = sink.ingest(rx).unwrap();
        assert_eq!(report, IngestReport { persisted: 1, failed: 0 });

        let rows = sink.documents().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, r.id);
        assert_eq!(rows[0].aggregate_files, "|a.gz|b.gz|");
        assert_eq!(fs::read(sink.data_path(&rows[0])).unwrap(), b"payload");
    }

    #[test]
    fn failed_store_is_counted_and_drain_continues() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::open(dir.path()).unwrap();
        // A directory where the table file should be makes every append fail.
        fs::create_dir_all(dir.path().join(DOCUMENTS_TABLE)).unwrap();

        let (tx, rx) = unbounded();
        tx.send(result(&["a.gz"], b"1")).unwrap();
        tx.send(result(&["b.gz"], b"2")).unwrap();
        drop(tx);

        let report = sink.ingest(rx).unwrap();
        assert_eq!(report, IngestReport { persisted: 0, failed: 2 });
        // Payloads without a row are cleaned up.
        assert_eq!(fs::read_dir(dir.path().join(DOCUMENTS_DIR)).unwrap().count(), 0);
    }

    #[test]
    fn register_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::open(dir.path()).unwrap();
        let w = WorkerRecord {
            id: Uuid::new_v4(),
            number: 3,
            started_at: OffsetDateTime::now_utc(),
        };
        sink.register_worker(&w).unwrap();
        assert_eq!(sink.workers().unwrap()[0].number, 3);

        let (tx, rx) = unbounded();
        tx.send(result(&["a.gz"], b"x")).unwrap();
        drop(tx);
        sink.ingest(rx).unwrap();

        sink.truncate_all().unwrap();
        assert!(sink.workers().unwrap().is_empty());
        assert!(sink.documents().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path().join(DOCUMENTS_DIR)).unwrap().count(), 0);
    }
}
