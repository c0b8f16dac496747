//! Handler for Deflate compressed data

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::warn;
use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// Zlib stream handler
///
/// Serves both Adobe Deflate (code 8, what GDAL writes) and the older
/// PKZIP-style Deflate code 32946. The two share the same zlib stream format.
pub struct DeflateHandler {
    code: u16,
}

impl DeflateHandler {
    /// Adobe Deflate, compression code 8
    pub fn adobe() -> Self {
        DeflateHandler { code: compression::ADOBE_DEFLATE }
    }

    /// Legacy Deflate, compression code 32946
    pub fn legacy() -> Self {
        DeflateHandler { code: compression::DEFLATE }
    }
}

impl CompressionHandler for DeflateHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed_data = Vec::new();
        match decoder.read_to_end(&mut decompressed_data) {
            Ok(_) => Ok(decompressed_data),
            Err(e) => {
                warn!("Deflate decompression error after {} bytes: {}", decompressed_data.len(), e);
                Err(TiffError::IoError(e))
            }
        }
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn name(&self) -> &'static str {
        match self.code {
            compression::ADOBE_DEFLATE => "Adobe Deflate",
            _ => "Deflate",
        }
    }

    fn code(&self) -> u64 {
        self.code as u64
    }
}
