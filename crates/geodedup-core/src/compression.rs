//! Compression for city list files.
//!
//! The upstream city lists ship compressed; reduced lists are written back
//! the same way.

use crate::error::{GeoError, Result};
use std::path::Path;

/// Trait for compression algorithms.
pub trait Compressor: Send + Sync {
    /// Compress data.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// File extension (without dot) this compressor writes.
    fn extension(&self) -> &'static str;

    /// Whether a file extension (without dot) names this compressor.
    fn matches_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case(self.extension())
    }
}

/// Zstd compressor with configurable level.
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    /// Create a new Zstd compressor with the maximum standard level (19).
    #[must_use]
    pub fn new() -> Self {
        Self::with_level(19)
    }

    /// Create a new Zstd compressor with specified level.
    ///
    /// Level ranges from -7 (fastest) to 22 (best compression).
    #[must_use]
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| GeoError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| GeoError::Decompression(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "zst"
    }

    fn matches_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("zst") || ext.eq_ignore_ascii_case("zstd")
    }
}

/// Pick a compressor for a path by its extension, if it names one.
#[must_use]
pub fn compressor_for_path<P: AsRef<Path>>(path: P) -> Option<Box<dyn Compressor>> {
    let ext = path.as_ref().extension()?.to_str()?;
    let known: [Box<dyn Compressor>; 1] = [Box::new(ZstdCompressor::new())];
    known.into_iter().find(|c| c.matches_extension(ext))
}
