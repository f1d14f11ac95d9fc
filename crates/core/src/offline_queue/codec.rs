//! Payload codecs applied before operations are persisted

use std::fmt;

use repsync_common::compression::{CompressionAlgorithm, CompressionService};

use super::errors::QueueResult;

/// Reversible payload transformation
pub trait PayloadCodec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn encode(&self, payload: &[u8]) -> QueueResult<Vec<u8>>;

    fn decode(&self, payload: &[u8]) -> QueueResult<Vec<u8>>;
}

/// Stores payloads unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl PayloadCodec for IdentityCodec {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, payload: &[u8]) -> QueueResult<Vec<u8>> {
        Ok(payload.to_vec())
    }

    fn decode(&self, payload: &[u8]) -> QueueResult<Vec<u8>> {
        Ok(payload.to_vec())
    }
}

/// Gzip-compresses payloads
#[derive(Debug, Clone)]
pub struct GzipCodec {
    service: CompressionService,
}

impl GzipCodec {
    pub fn new(level: u32) -> Self {
        Self { service: CompressionService::new(CompressionAlgorithm::Gzip, level) }
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

impl PayloadCodec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn encode(&self, payload: &[u8]) -> QueueResult<Vec<u8>> {
        Ok(self.service.compress(payload)?)
    }

    fn decode(&self, payload: &[u8]) -> QueueResult<Vec<u8>> {
        Ok(self.service.decompress(payload)?)
    }
}
