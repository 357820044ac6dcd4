use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::CodecId;
use crate::error::{AggError, Result};

const READ_BUF: usize = 64 * 1024;

/// Compressed byte stream → decoder → buffer → lines split on `\n`.
///
/// Each yielded line keeps its terminator; only the final line of a stream may
/// lack one. A read error part-way through is logged and treated as end of stream.
pub struct LineSource<'a> {
    path: PathBuf,
    reader: BufReader<Box<dyn Read + Send + 'a>>,
    line: Vec<u8>,
    done: bool,
}

impl LineSource<'static> {
    pub fn open(path: &Path, codec: CodecId) -> Result<Self> {
        let f = File::open(path).map_err(|source| AggError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path.to_path_buf(), Box::new(f), codec)
    }
}

impl<'a> LineSource<'a> {
    /// Wrap an arbitrary compressed stream. The decoder is primed here so a bad
    /// header fails now rather than on the first line.
    pub fn from_reader(
        path: PathBuf,
        src: Box<dyn Read + Send + 'a>,
        codec: CodecId,
    ) -> Result<Self> {
        let decoder = codec.compressor().decoder(src).map_err(|e| AggError::Decompress {
            path: path.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let mut reader = BufReader::with_capacity(READ_BUF, decoder);
        if let Err(source) = reader.fill_buf() {
            return Err(AggError::Decompress { path, source });
        }
        Ok(Self {
            path,
            reader,
            line: Vec::with_capacity(256),
            done: false,
        })
    }

    /// Next line including its terminator, or `None` at end of stream.
    pub fn next_line(&mut self) -> Option<&[u8]> {
        if self.done {
            return None;
        }
        self.line.clear();
        match self.reader.read_until(b'\n', &mut self.line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(&self.line),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "read failed; treating as end of file");
                self.done = true;
                None
            }
        }
    }
}
