//! Payload codecs for stored sample blocks
//!
//! A stream payload is either raw samples or one compressed frame holding the
//! whole block. Decoding always knows how many raw bytes the layout expects,
//! so codecs stop reading there and report short or oversized frames.

use crate::error::{FiberError, Result};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

/// How a stream payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// Raw samples
    #[default]
    None,
    /// Raw deflate stream
    Deflate,
    /// Zstandard frame
    Zstd,
}

impl CompressionMethod {
    /// Raw payloads can be read window by window without touching the rest
    pub fn supports_partial_reads(&self) -> bool {
        matches!(self, CompressionMethod::None)
    }

    /// Most raw bytes a single payload byte can decode to
    ///
    /// Deflate tops out near 1032:1 and Zstandard near 43690:1 (a 3-byte
    /// header per 128 KiB block); both bounds sit above those ratios.
    pub fn max_expansion(&self) -> u64 {
        match self {
            CompressionMethod::None => 1,
            CompressionMethod::Deflate => 1 << 11,
            CompressionMethod::Zstd => 1 << 16,
        }
    }

    /// Codec implementing this method
    pub fn codec(&self) -> &'static dyn Compressor {
        match self {
            CompressionMethod::None => &RawCodec,
            CompressionMethod::Deflate => &DeflateCodec,
            CompressionMethod::Zstd => &ZstdCodec,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionMethod::None => "none",
            CompressionMethod::Deflate => "deflate",
            CompressionMethod::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Effort level on a 0-9 scale, mapped onto each codec's own range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Zstandard level; 9 maps to 19, the top of the non-ultra range
    fn zstd_level(&self) -> i32 {
        match self.0 {
            0 => 1,
            level => (level as i32 * 19 + 8) / 9,
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Encodes and decodes whole payloads
pub trait Compressor: Send + Sync {
    fn method(&self) -> CompressionMethod;

    /// Encode a raw sample block
    fn compress(&self, raw: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decode a payload that must expand to exactly `raw_len` bytes
    fn decompress(&self, payload: &[u8], raw_len: usize) -> Result<Vec<u8>>;
}

/// Read at most one byte past `raw_len` and insist on the exact size
fn read_bounded<R: Read>(
    method: CompressionMethod,
    decoder: R,
    raw_len: usize,
) -> Result<Vec<u8>> {
    // grow with the decoded output rather than trusting `raw_len` up front
    let mut raw = Vec::with_capacity(raw_len.min(1 << 20));
    decoder
        .take(raw_len as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|e| FiberError::Decompression(format!("{} payload: {}", method, e)))?;
    check_len(method, raw.len(), raw_len)?;
    Ok(raw)
}

fn check_len(method: CompressionMethod, actual: usize, raw_len: usize) -> Result<()> {
    if actual == raw_len {
        return Ok(());
    }
    let found = if actual > raw_len {
        "more than".to_string()
    } else {
        actual.to_string()
    };
    Err(FiberError::InvalidFormat(format!(
        "{} payload expands to {} bytes, layout needs {}",
        method, found, raw_len
    )))
}

/// Stored as is
#[derive(Debug, Default)]
pub struct RawCodec;

impl Compressor for RawCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::None
    }

    fn compress(&self, raw: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, payload: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        check_len(self.method(), payload.len(), raw_len)?;
        Ok(payload.to_vec())
    }
}

#[derive(Debug, Default)]
pub struct DeflateCodec;

impl Compressor for DeflateCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn compress(&self, raw: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(raw, FlateCompression::new(level.value() as u32));
        let mut payload = Vec::new();
        encoder
            .read_to_end(&mut payload)
            .map_err(|e| FiberError::Compression(e.to_string()))?;
        Ok(payload)
    }

    fn decompress(&self, payload: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        read_bounded(self.method(), DeflateDecoder::new(payload), raw_len)
    }
}

#[derive(Debug, Default)]
pub struct ZstdCodec;

impl Compressor for ZstdCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }

    fn compress(&self, raw: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        zstd::encode_all(raw, level.zstd_level())
            .map_err(|e| FiberError::Compression(e.to_string()))
    }

    fn decompress(&self, payload: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::new(payload)
            .map_err(|e| FiberError::Decompression(e.to_string()))?;
        read_bounded(self.method(), decoder, raw_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Vec<u8> {
        (0..512u32)
            .flat_map(|i| ((i % 16) as f32 * 0.25).to_le_bytes())
            .collect()
    }

    #[test]
    fn test_codecs_restore_block() {
        let raw = block();
        for method in [
            CompressionMethod::None,
            CompressionMethod::Deflate,
            CompressionMethod::Zstd,
        ] {
            let codec = method.codec();
            assert_eq!(codec.method(), method);
            let payload = codec.compress(&raw, CompressionLevel::fast()).unwrap();
            if method != CompressionMethod::None {
                assert!(payload.len() < raw.len(), "{} did not shrink", method);
            }
            assert_eq!(codec.decompress(&payload, raw.len()).unwrap(), raw);
        }
    }

    #[test]
    fn test_size_mismatch_is_format_error() {
        let raw = block();
        for method in [CompressionMethod::Deflate, CompressionMethod::Zstd] {
            let payload = method.codec().compress(&raw, CompressionLevel::default()).unwrap();
            let short = method.codec().decompress(&payload, raw.len() + 4).unwrap_err();
            assert!(short.is_format_error(), "{}: {:?}", method, short);
            let long = method.codec().decompress(&payload, raw.len() - 4).unwrap_err();
            assert!(long.is_format_error(), "{}: {:?}", method, long);
        }
        assert!(RawCodec.decompress(&raw[1..], raw.len()).is_err());
    }

    #[test]
    fn test_corrupt_zstd_payload() {
        let err = ZstdCodec.decompress(b"not a zstd frame", 64).unwrap_err();
        assert!(matches!(err, FiberError::Decompression(_)));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_zero_block_within_expansion_bound() {
        let raw = vec![0u8; 1 << 22];
        for method in [CompressionMethod::Deflate, CompressionMethod::Zstd] {
            let payload = method.codec().compress(&raw, CompressionLevel::best()).unwrap();
            let bound = payload.len() as u64 * method.max_expansion();
            assert!(raw.len() as u64 <= bound, "{} expanded past its bound", method);
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(CompressionLevel::new(42).value(), 9);
        assert_eq!(CompressionLevel::best().zstd_level(), 19);
        assert_eq!(CompressionLevel::fast().zstd_level(), 3);
        assert_eq!(CompressionLevel::new(0).zstd_level(), 1);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(
            serde_json::to_string(&CompressionMethod::Zstd).unwrap(),
            "\"zstd\""
        );
        assert_eq!(CompressionMethod::Deflate.to_string(), "deflate");
        assert!(CompressionMethod::None.supports_partial_reads());
        assert!(!CompressionMethod::Deflate.supports_partial_reads());
    }
}
