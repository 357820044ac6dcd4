use crate::error::{AggError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    #[default]
    Gzip = 0,
    Zstd = 1,
}

impl CodecId {
    /// Extension used for sealed batch artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            CodecId::Gzip => "csv.gz",
            CodecId::Zstd => "csv.zst",
        }
    }

    /// Pick the input codec from a suffix filter such as `.gz` or `.csv.zst`.
    pub fn from_suffix(suffix: &str) -> Result<Self> {
        if suffix.ends_with(".gz") {
            Ok(CodecId::Gzip)
        } else if suffix.ends_with(".zst") {
            Ok(CodecId::Zstd)
        } else {
            Err(AggError::Config(format!("no codec for extension {suffix:?}")))
        }
    }

    pub fn compressor(self) -> &'static dyn Compressor {
        match self {
            CodecId::Gzip => &gzip::GzipCompressor,
            CodecId::Zstd => &zstdc::ZstdCompressor,
        }
    }
}

pub trait Compressor: Send + Sync {
    fn id(&self) -> CodecId;
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: i32) -> Result<u64>;
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
    /// Wrap `src` in a streaming decoder. Nothing is read until the first `read`.
    fn decoder<'a>(&self, src: Box<dyn Read + Send + 'a>) -> Result<Box<dyn Read + Send + 'a>>;
}

/// Compress a whole in-memory buffer with `codec`.
pub fn compress_bytes(codec: CodecId, data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 4 + 64);
    codec.compressor().compress(&mut &data[..], &mut out, level)?;
    Ok(out)
}

/// Decompress a whole in-memory buffer with `codec`.
pub fn decompress_bytes(codec: CodecId, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    codec.compressor().decompress(&mut &data[..], &mut out)?;
    Ok(out)
}

pub mod gzip;
pub mod zstdc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_lookup() {
        assert_eq!(CodecId::from_suffix(".gz").unwrap(), CodecId::Gzip);
        assert_eq!(CodecId::from_suffix(".csv.zst").unwrap(), CodecId::Zstd);
        assert!(CodecId::from_suffix(".bz2").is_err());
    }

    #[test]
    fn both_codecs_restore_bytes() {
        let data = b"ts,level,msg\n1,info,hello\n2,warn,again\n".repeat(50);
        for codec in [CodecId::Gzip, CodecId::Zstd] {
            let packed = compress_bytes(codec, &data, 6).unwrap();
            assert!(packed.len() < data.len());
            assert_eq!(decompress_bytes(codec, &packed).unwrap(), data);
        }
    }

    #[test]
    fn empty_input_still_produces_a_valid_stream() {
        let packed = compress_bytes(CodecId::Gzip, b"", 6).unwrap();
        assert!(!packed.is_empty());
        assert!(decompress_bytes(CodecId::Gzip, &packed).unwrap().is_empty());
    }
}
