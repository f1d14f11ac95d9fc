//! Payload compression
//!
//! Thin wrapper over `flate2` used by the queue's gzip payload codec.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CommonError, CommonResult};

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Gzip,
    Zlib,
}

/// Compresses and decompresses byte buffers
#[derive(Debug, Clone)]
pub struct CompressionService {
    algorithm: CompressionAlgorithm,
    level: u32,
}

impl CompressionService {
    /// Create a service; levels above 9 are clamped
    pub fn new(algorithm: CompressionAlgorithm, level: u32) -> Self {
        Self { algorithm, level: level.min(9) }
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn compress(&self, data: &[u8]) -> CommonResult<Vec<u8>> {
        let level = Compression::new(self.level);
        let result = match self.algorithm {
            CompressionAlgorithm::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(data).and_then(|()| encoder.finish())
            }
            CompressionAlgorithm::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), level);
                encoder.write_all(data).and_then(|()| encoder.finish())
            }
        };

        let compressed = result.map_err(|e| {
            CommonError::serialization_format("compressed", format!("{:?} compression failed: {e}", self.algorithm))
        })?;
        trace!(algorithm = ?self.algorithm, original = data.len(), compressed = compressed.len(), "Compressed buffer");
        Ok(compressed)
    }

    pub fn decompress(&self, data: &[u8]) -> CommonResult<Vec<u8>> {
        let mut decompressed = Vec::new();
        let result = match self.algorithm {
            CompressionAlgorithm::Gzip => GzDecoder::new(data).read_to_end(&mut decompressed),
            CompressionAlgorithm::Zlib => ZlibDecoder::new(data).read_to_end(&mut decompressed),
        };

        result.map(|_| decompressed).map_err(|e| {
            CommonError::serialization_format("compressed", format!("{:?} decompression failed: {e}", self.algorithm))
        })
    }

    /// Percentage of bytes saved; 0 for empty input
    pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
        if original == 0 {
            return 0.0;
        }
        (1.0 - (compressed as f64 / original as f64)) * 100.0
    }
}

impl Default for CompressionService {
    fn default() -> Self {
        Self::new(CompressionAlgorithm::Gzip, 6)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for compression.
    use super::*;

    /// Validates gzip and zlib both restore the original bytes.
    ///
    /// Assertions:
    /// - Decompressed output equals the input for each algorithm.
    /// - Repetitive input shrinks.
    #[test]
    fn test_compress_decompress_both_algorithms() {
        let original = b"{\"exercise\":\"squat\",\"reps\":5,\"weight_kg\":100}".repeat(20);

        for algorithm in [CompressionAlgorithm::Gzip, CompressionAlgorithm::Zlib] {
            let service = CompressionService::new(algorithm, 6);
            let compressed = service.compress(&original).unwrap();
            assert!(compressed.len() < original.len());
            assert_eq!(service.decompress(&compressed).unwrap(), original);
        }
    }

    /// Validates corrupted input surfaces a serialization error.
    ///
    /// Assertions:
    /// - `decompress` on non-gzip bytes returns `Err`.
    #[test]
    fn test_decompress_garbage_fails() {
        let service = CompressionService::default();
        let err = service.decompress(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, CommonError::Serialization { .. }));
    }

    /// Validates `CompressionService::new` clamps the level.
    ///
    /// Assertions:
    /// - Level 42 is stored as 9.
    #[test]
    fn test_level_is_clamped() {
        assert_eq!(CompressionService::new(CompressionAlgorithm::Zlib, 42).level(), 9);
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(CompressionService::compression_ratio(0, 0), 0.0);
        assert!((CompressionService::compression_ratio(1000, 250) - 75.0).abs() < f64::EPSILON);
    }
}
