//! Wire format for values stored in the remote tier.
//!
//! Every payload is a marker prefix followed by the body:
//! `raw:` + JSON bytes, or `zlib:` + zlib-compressed JSON bytes.
//! Values whose serialized size is at or above the threshold are compressed.

use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;
use std::io::{Read, Write};

pub const RAW_MARKER: &[u8] = b"raw:";
pub const ZLIB_MARKER: &[u8] = b"zlib:";

/// Result of encoding a value, with the sizes needed for compression metrics.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub compressed: bool,
}

impl EncodedPayload {
    /// Stored size over serialized size (1.0 when stored raw).
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            1.0
        } else {
            self.bytes.len() as f64 / self.original_size as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct PayloadCodec {
    threshold: usize,
    level: u32,
}

impl PayloadCodec {
    /// `level` is clamped to zlib's 0..=9 range.
    pub fn new(threshold: usize, level: u32) -> Self {
        Self {
            threshold,
            level: level.min(9),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn encode(&self, value: &Value) -> Result<EncodedPayload> {
        let json = serde_json::to_vec(value)?;
        let original_size = json.len();
        if original_size >= self.threshold {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
            encoder.write_all(&json)?;
            let body = encoder.finish()?;
            let mut bytes = Vec::with_capacity(ZLIB_MARKER.len() + body.len());
            bytes.extend_from_slice(ZLIB_MARKER);
            bytes.extend_from_slice(&body);
            Ok(EncodedPayload {
                bytes,
                original_size,
                compressed: true,
            })
        } else {
            let mut bytes = Vec::with_capacity(RAW_MARKER.len() + json.len());
            bytes.extend_from_slice(RAW_MARKER);
            bytes.extend_from_slice(&json);
            Ok(EncodedPayload {
                bytes,
                original_size,
                compressed: false,
            })
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if let Some(body) = bytes.strip_prefix(ZLIB_MARKER) {
            let mut json = Vec::new();
            ZlibDecoder::new(body)
                .read_to_end(&mut json)
                .map_err(|e| Error::Compression(format!("zlib decode failed: {}", e)))?;
            Ok(serde_json::from_slice(&json)?)
        } else if let Some(body) = bytes.strip_prefix(RAW_MARKER) {
            Ok(serde_json::from_slice(body)?)
        } else {
            Err(Error::Compression("unknown payload marker".into()))
        }
    }

    pub fn is_compressed(bytes: &[u8]) -> bool {
        bytes.starts_with(ZLIB_MARKER)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(1000, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_values_stored_raw() {
        let codec = PayloadCodec::new(1000, 6);
        let encoded = codec.encode(&json!({"summary": "short"})).unwrap();
        assert!(!encoded.compressed);
        assert!(encoded.bytes.starts_with(RAW_MARKER));
        // marker overhead only
        assert!(encoded.compression_ratio() > 1.0);
        assert_eq!(codec.decode(&encoded.bytes).unwrap(), json!({"summary": "short"}));
    }

    #[test]
    fn test_large_values_compressed_and_smaller() {
        let codec = PayloadCodec::new(100, 6);
        let value = json!({"text": "lorem ipsum dolor sit amet ".repeat(200)});
        let encoded = codec.encode(&value).unwrap();
        assert!(encoded.compressed);
        assert!(PayloadCodec::is_compressed(&encoded.bytes));
        assert!(encoded.bytes.len() < encoded.original_size);
        assert_eq!(codec.decode(&encoded.bytes).unwrap(), value);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let value = json!("abcdefgh");
        let size = serde_json::to_vec(&value).unwrap().len();
        assert!(PayloadCodec::new(size, 6).encode(&value).unwrap().compressed);
        assert!(!PayloadCodec::new(size + 1, 6).encode(&value).unwrap().compressed);
    }

    #[test]
    fn test_corrupt_payloads_are_errors() {
        let codec = PayloadCodec::default();
        assert!(codec.decode(b"garbage").is_err());
        assert!(codec.decode(b"zlib:not-zlib").is_err());
        assert!(codec.decode(b"raw:{broken").is_err());
    }
}
