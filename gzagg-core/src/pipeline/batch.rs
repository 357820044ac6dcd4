use crate::codec::{CodecId, compress_bytes};
use crate::dedup::{DedupSet, LineFingerprint};
use crate::error::Result;

/// Lines retained for one output batch, owned by a single worker.
#[derive(Debug, Default)]
pub struct Batch {
    buf: Vec<u8>,
    current_size: u64,
    files: Vec<String>,
    lines_kept: u64,
    lines_discarded: u64,
}

/// A batch after compression; the worker wraps it into an `AggregatedResult`.
#[derive(Debug)]
pub struct SealedBatch {
    pub data: Vec<u8>,
    pub files: Vec<String>,
    pub raw_len: u64,
    pub lines_kept: u64,
    pub lines_discarded: u64,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompressed bytes retained so far.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether a file with `next_estimated` payload must go to the next batch.
    ///
    /// Compares the *estimated* size of the candidate against the *actual*
    /// decompressed bytes already retained; the two bases differ on purpose and
    /// are kept that way. A batch without files accepts any candidate, so one
    /// oversized file still forms a batch of its own.
    pub fn is_full_for(&self, next_estimated: u64, max_batch_size: u64) -> bool {
        !self.files.is_empty() && self.current_size.saturating_add(next_estimated) >= max_batch_size
    }

    pub fn add_file(&mut self, name: String) {
        self.files.push(name);
    }

    /// Offer one line. The first line written into the batch is always kept (it
    /// carries the CSV header) and its fingerprint is still recorded. Any other
    /// line is kept only if this call is the one that records its fingerprint.
    pub fn offer_line(&mut self, line: &[u8], dedup: &DedupSet) -> bool {
        let fp = LineFingerprint::of(line);
        let first = self.buf.is_empty();
        let fresh = dedup.record(fp);
        if first || fresh {
            self.buf.extend_from_slice(line);
            self.current_size += line.len() as u64;
            self.lines_kept += 1;
            true
        } else {
            self.lines_discarded += 1;
            false
        }
    }

    pub fn seal(self, codec: CodecId, level: i32) -> Result<SealedBatch> {
        let data = compress_bytes(codec, &self.buf, level)?;
        Ok(SealedBatch {
            data,
            files: self.files,
            raw_len: self.buf.len() as u64,
            lines_kept: self.lines_kept,
            lines_discarded: self.lines_discarded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decompress_bytes;

    #[test]
    fn first_line_is_kept_even_if_seen() {
        let dedup = DedupSet::new();
        dedup.record(LineFingerprint::of(b"h\n"));

        let mut b = Batch::new();
        assert!(b.offer_line(b"h\n", &dedup));
        assert!(!b.offer_line(b"h\n", &dedup));
        assert!(b.offer_line(b"x\n", &dedup));
        assert!(!b.offer_line(b"x\n", &dedup));
        assert_eq!(b.current_size(), 4);
    }

    #[test]
    fn first_line_is_recorded_for_later_batches() {
        let dedup = DedupSet::new();
        let mut a = Batch::new();
        a.offer_line(b"h\n", &dedup);
        assert!(dedup.contains(&LineFingerprint::of(b"h\n")));

        let mut b = Batch::new();
        b.offer_line(b"other\n", &dedup);
        assert!(!b.offer_line(b"h\n", &dedup));
    }

    #[test]
    fn size_check_boundary_is_inclusive() {
        let mut b = Batch::new();
        let dedup = DedupSet::new();
        b.add_file("a.gz".into());
        b.offer_line(&[b'a'; 59], &dedup);
        b.offer_line(b"\n", &dedup);
        assert_eq!(b.current_size(), 60);
        assert!(!b.is_full_for(39, 100));
        assert!(b.is_full_for(40, 100));
        assert!(b.is_full_for(u64::MAX, 100));
    }

    #[test]
    fn empty_batch_accepts_oversized_file() {
        let b = Batch::new();
        assert!(!b.is_full_for(1_000, 10));
    }

    #[test]
    fn seal_restores_retained_lines_in_order() {
        let dedup = DedupSet::new();
        let mut b = Batch::new();
        b.add_file("a.gz".into());
        let lines: [&[u8]; 5] = [b"h\n", b"1\n", b"2\n", b"1\n", b"3"];
        for l in lines {
            b.offer_line(l, &dedup);
        }
        let sealed = b.seal(CodecId::Gzip, 6).unwrap();
        assert_eq!(sealed.files, vec!["a.gz".to_string()]);
        assert_eq!(sealed.lines_kept, 4);
        assert_eq!(sealed.lines_discarded, 1);
        assert_eq!(decompress_bytes(CodecId::Gzip, &sealed.data).unwrap(), b"h\n1\n2\n3");
    }
}
