use super::{CodecId, Compressor};
use crate::error::Result;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn id(&self) -> CodecId {
        CodecId::Gzip
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: i32) -> Result<u64> {
        let level = Compression::new(level.clamp(0, 9) as u32);
        let mut enc = GzEncoder::new(dst, level);
        let written_uncompressed = std::io::copy(src, &mut enc)?;
        enc.finish()?;
        Ok(written_uncompressed)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        let mut dec = MultiGzDecoder::new(src);
        Ok(std::io::copy(&mut dec, dst)?)
    }

    fn decoder<'a>(&self, src: Box<dyn Read + Send + 'a>) -> Result<Box<dyn Read + Send + 'a>> {
        // Concatenated members are common when log shippers append to a .gz.
        Ok(Box::new(MultiGzDecoder::new(src)))
    }
}
