//! Diff payload compression
//!
//! Diffs are compressed on their own before they go into a transport
//! instruction. Both ends of a session must be built with the same
//! algorithm; nothing on the wire says which one was used.

use crate::StateError;
use std::io::{Read, Write};

/// Zstd level for diffs; screen updates are small so speed wins
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum CompressionAlgorithm {
    #[default]
    #[cfg_attr(feature = "clap", value(name = "zstd"))]
    Zstd,
    #[cfg_attr(feature = "clap", value(name = "lz4"))]
    Lz4,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    algorithm: CompressionAlgorithm,
}

impl Compressor {
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Compress a diff; the empty diff stays empty
    pub fn compress(&self, diff: &[u8]) -> Result<Vec<u8>, StateError> {
        if diff.is_empty() {
            return Ok(Vec::new());
        }
        match self.algorithm {
            CompressionAlgorithm::Zstd => zstd_compress(diff),
            CompressionAlgorithm::Lz4 => Ok(lz4_flex::compress_prepend_size(diff)),
        }
    }

    pub fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>, StateError> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        match self.algorithm {
            CompressionAlgorithm::Zstd => zstd_decompress(payload),
            CompressionAlgorithm::Lz4 => lz4_flex::decompress_size_prepended(payload)
                .map_err(|e| StateError::CompressionError(format!("lz4 payload: {e}"))),
        }
    }
}

fn zstd_compress(diff: &[u8]) -> Result<Vec<u8>, StateError> {
    let failed = |e: std::io::Error| StateError::CompressionError(format!("zstd encode: {e}"));
    let mut encoder = zstd::Encoder::new(Vec::new(), ZSTD_LEVEL).map_err(failed)?;
    encoder.write_all(diff).map_err(failed)?;
    encoder.finish().map_err(failed)
}

fn zstd_decompress(payload: &[u8]) -> Result<Vec<u8>, StateError> {
    let failed = |e: std::io::Error| StateError::CompressionError(format!("zstd payload: {e}"));
    let mut diff = Vec::new();
    zstd::Decoder::new(payload)
        .map_err(failed)?
        .read_to_end(&mut diff)
        .map_err(failed)?;
    Ok(diff)
}
