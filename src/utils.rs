//! Utility functions

use crate::error::{FiberError, Result};
use crate::types::SampleType;
use byteorder::{ByteOrder, WriteBytesExt};
use chrono::{DateTime, Utc};
use num_traits::Float;

/// Decode a raw sample buffer into `f64` values
pub fn decode_samples<B: ByteOrder>(bytes: &[u8], sample_type: SampleType) -> Result<Vec<f64>> {
    let size = sample_type.size_in_bytes();
    if bytes.len() % size != 0 {
        return Err(FiberError::InvalidFormat(format!(
            "payload of {} bytes is not a multiple of the {} sample size",
            bytes.len(),
            sample_type
        )));
    }

    let chunks = bytes.chunks_exact(size);
    let values: Vec<f64> = match sample_type {
        SampleType::I16 => chunks.map(|c| B::read_i16(c) as f64).collect(),
        SampleType::I32 => chunks.map(|c| B::read_i32(c) as f64).collect(),
        SampleType::F32 => chunks.map(|c| B::read_f32(c) as f64).collect(),
        SampleType::F64 => chunks.map(B::read_f64).collect(),
    };
    Ok(values)
}

/// Encode `f64` values into a raw sample buffer
///
/// Integer encodings round to the nearest representable value.
pub fn encode_samples<B: ByteOrder>(
    values: impl IntoIterator<Item = f64>,
    sample_type: SampleType,
    out: &mut Vec<u8>,
) -> Result<()> {
    for value in values {
        match sample_type {
            SampleType::I16 => out.write_i16::<B>(value.round() as i16)?,
            SampleType::I32 => out.write_i32::<B>(value.round() as i32)?,
            SampleType::F32 => out.write_f32::<B>(value as f32)?,
            SampleType::F64 => out.write_f64::<B>(value)?,
        }
    }
    Ok(())
}

/// Minimum and maximum of a sequence, ignoring NaN
pub fn min_max<T: Float>(values: impl IntoIterator<Item = T>) -> Option<(T, T)> {
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Convert epoch seconds into a UTC timestamp
pub fn seconds_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Read a NUL-padded ASCII field
pub fn read_fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

/// Write `value` into a NUL-padded field of exactly `width` bytes
pub fn write_fixed_str(value: &str, width: usize) -> Result<Vec<u8>> {
    let raw = value.as_bytes();
    if raw.len() > width {
        return Err(FiberError::InvalidFormat(format!(
            "'{}' does not fit a {}-byte header field",
            value, width
        )));
    }
    let mut field = raw.to_vec();
    field.resize(width, 0);
    Ok(field)
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
