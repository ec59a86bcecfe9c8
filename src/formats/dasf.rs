//! DASF 1.0: little-endian multi-stream container
//!
//! ```text
//! "DASF" | u16 major | u16 minor | u32 stream_count
//! per stream: u32 header_len | JSON header | u64 payload_len | payload
//! ```
//!
//! The payload is the row-major sample block in the order given by the
//! header's `dims`, optionally compressed as a whole.

use super::{FiberFormat, FormatId};
use crate::compression::{CompressionLevel, CompressionMethod};
use crate::error::{FiberError, Result};
use crate::io::{read_exact_at, read_magic, stream_len, with_reader, with_writer};
use crate::layout::{LayoutWindow, StreamLayout};
use crate::metadata::{FileSummary, PatchAttrs};
use crate::patch::{Patch, Spool};
use crate::types::{AxisDescriptor, Dimension, SampleType};
use crate::utils::{decode_samples, encode_samples, format_bytes};
use crate::window::ReadWindow;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Magic number for DASF files
pub const DASF_MAGIC: &[u8; 4] = b"DASF";

const VERSION_MAJOR: u16 = 1;
const VERSION_MINOR: u16 = 0;

/// Relative tolerance when checking that coordinates are evenly spaced
const SPACING_TOLERANCE: f64 = 1e-9;

/// JSON header describing one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StreamHeader {
    data_type: String,
    data_units: String,
    dims: [Dimension; 2],
    time: AxisDescriptor,
    distance: AxisDescriptor,
    sample_type: SampleType,
    #[serde(default)]
    compression: CompressionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gauge_length: Option<f64>,
    #[serde(default)]
    network: String,
    #[serde(default)]
    station: String,
    #[serde(default)]
    instrument_id: String,
    #[serde(default)]
    tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
}

impl StreamHeader {
    fn layout(&self) -> Result<StreamLayout> {
        let axis = |dim: Dimension| match dim {
            Dimension::Time => Ok(self.time.clone()),
            Dimension::Distance => Ok(self.distance.clone()),
            Dimension::Frequency => Err(FiberError::InvalidFormat(
                "DASF streams hold time and distance only".to_string(),
            )),
        };
        StreamLayout::new(
            self.dims,
            [axis(self.dims[0])?, axis(self.dims[1])?],
            self.sample_type,
        )
    }

    /// Attributes over the full extent of the stream
    fn attrs(&self) -> PatchAttrs {
        let mut attrs = PatchAttrs::new(self.data_type.clone(), self.data_units.clone());
        attrs.time_min = self.time.start;
        attrs.time_max = self.time.coord_max();
        attrs.d_time = self.time.step;
        attrs.distance_min = self.distance.start;
        attrs.distance_max = self.distance.coord_max();
        attrs.d_distance = self.distance.step;
        if !self.time.units.is_empty() {
            attrs.time_units = self.time.units.clone();
        }
        if !self.distance.units.is_empty() {
            attrs.distance_units = self.distance.units.clone();
        }
        attrs.gauge_length = self.gauge_length;
        attrs.network = self.network.clone();
        attrs.station = self.station.clone();
        attrs.instrument_id = self.instrument_id.clone();
        attrs.tag = self.tag.clone();
        attrs.extra = self.extra.clone();
        attrs
    }

    fn from_patch(
        patch: &Patch,
        sample_type: SampleType,
        compression: CompressionMethod,
    ) -> Result<Self> {
        let attrs = patch.attrs();
        let time = even_axis(patch, Dimension::Time, attrs.d_time, &attrs.time_units)?;
        let distance = even_axis(
            patch,
            Dimension::Distance,
            attrs.d_distance,
            &attrs.distance_units,
        )?;
        Ok(Self {
            data_type: attrs.data_type.clone(),
            data_units: attrs.data_units.clone(),
            dims: *patch.dims(),
            time,
            distance,
            sample_type,
            compression,
            gauge_length: attrs.gauge_length,
            network: attrs.network.clone(),
            station: attrs.station.clone(),
            instrument_id: attrs.instrument_id.clone(),
            tag: attrs.tag.clone(),
            extra: attrs.extra.clone(),
        })
    }
}

/// Describe the coordinates of `dim` as start + i * step, if they are evenly spaced
pub(crate) fn even_axis(
    patch: &Patch,
    dim: Dimension,
    step: f64,
    units: &str,
) -> Result<AxisDescriptor> {
    let coords = patch.coord(dim).ok_or_else(|| {
        FiberError::UnsupportedParameter(format!("patch has no '{}' dimension", dim))
    })?;
    let axis = AxisDescriptor::new(coords.len(), coords[0], step, units);
    if !axis.is_valid() {
        return Err(FiberError::UnsupportedParameter(format!(
            "'{}' spacing {} is not a positive number",
            dim, step
        )));
    }
    let uneven = coords.iter().enumerate().find(|&(i, &actual)| {
        let expected = axis.index_to_coord(i);
        !((expected - actual).abs() <= SPACING_TOLERANCE * expected.abs().max(1.0))
    });
    if let Some((i, actual)) = uneven {
        return Err(FiberError::UnsupportedParameter(format!(
            "'{}' coordinate {} at index {} is off the grid {} + i * {}",
            dim, actual, i, axis.start, step
        )));
    }
    Ok(axis)
}

/// One stream located inside a DASF file
#[derive(Debug, Clone)]
struct StreamEntry {
    header: StreamHeader,
    layout: StreamLayout,
    payload_offset: u64,
    payload_len: u64,
}

/// Walk the file headers, seeking over payloads
fn read_streams<R: Read + Seek>(reader: &mut R) -> Result<Vec<StreamEntry>> {
    let file_len = stream_len(reader)?;
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != DASF_MAGIC {
        return Err(FiberError::InvalidFormat("missing DASF magic".to_string()));
    }
    let major = reader.read_u16::<LittleEndian>()?;
    let minor = reader.read_u16::<LittleEndian>()?;
    if major != VERSION_MAJOR {
        return Err(FiberError::InvalidFormat(format!(
            "unsupported DASF version {}.{}",
            major, minor
        )));
    }
    let count = reader.read_u32::<LittleEndian>()?;
    if count == 0 {
        return Err(FiberError::InvalidFormat("DASF file has no streams".to_string()));
    }

    let mut streams = Vec::with_capacity(count as usize);
    for index in 0..count {
        let header_len = reader.read_u32::<LittleEndian>()? as u64;
        if reader.stream_position()? + header_len > file_len {
            return Err(FiberError::InvalidFormat(format!(
                "stream {} header runs past the end of the file",
                index
            )));
        }
        let mut raw = vec![0u8; header_len as usize];
        reader.read_exact(&mut raw)?;
        let header: StreamHeader = serde_json::from_slice(&raw).map_err(|e| {
            FiberError::InvalidFormat(format!("stream {} header: {}", index, e))
        })?;
        let layout = header.layout().map_err(|e| match e {
            FiberError::InvalidDimensions(msg) => FiberError::InvalidFormat(msg),
            other => other,
        })?;

        let payload_len = reader.read_u64::<LittleEndian>()?;
        let payload_offset = reader.stream_position()?;
        if payload_len > file_len.saturating_sub(payload_offset) {
            return Err(FiberError::InvalidFormat(format!(
                "stream {} payload of {} bytes is truncated",
                index, payload_len
            )));
        }
        let raw_len = layout.total_size_bytes()? as u64;
        let compression = header.compression;
        let fits = match compression {
            CompressionMethod::None => payload_len == raw_len,
            _ => raw_len <= payload_len.saturating_mul(compression.max_expansion()),
        };
        if !fits {
            return Err(FiberError::InvalidFormat(format!(
                "stream {} {} payload of {} bytes cannot hold layout {} ({} bytes)",
                index,
                compression,
                payload_len,
                layout.summary(),
                raw_len
            )));
        }
        reader.seek(SeekFrom::Start(payload_offset + payload_len))?;

        streams.push(StreamEntry {
            header,
            layout,
            payload_offset,
            payload_len,
        });
    }
    Ok(streams)
}

/// Truncated headers surface as format errors, not I/O errors
fn truncated_as_format(err: FiberError) -> FiberError {
    match err {
        FiberError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            FiberError::InvalidFormat(format!("truncated DASF file: {}", e))
        }
        other => other,
    }
}

/// Read the windowed block of one stream
fn read_block<R: Read + Seek>(
    reader: &mut R,
    stream: &StreamEntry,
    window: &LayoutWindow,
) -> Result<Array2<f64>> {
    let layout = &stream.layout;
    let sample_size = layout.sample_type.size_in_bytes();

    if !stream.header.compression.supports_partial_reads() {
        let raw = read_exact_at(reader, stream.payload_offset, stream.payload_len as usize)?;
        let bytes = stream
            .header
            .compression
            .codec()
            .decompress(&raw, layout.total_size_bytes()?)?;
        let samples = decode_samples::<LittleEndian>(&bytes, layout.sample_type)?;
        let full = Array2::from_shape_vec(layout.shape(), samples)
            .map_err(|e| FiberError::InvalidDimensions(e.to_string()))?;
        return Ok(full
            .slice(s![window.rows.clone(), window.cols.clone()])
            .to_owned());
    }

    let (n_rows, n_cols) = window.shape();
    let samples = if n_cols == layout.shape().1 {
        let offset = stream.payload_offset + layout.sample_offset(window.rows.start, 0)?;
        let bytes = read_exact_at(reader, offset, n_rows * layout.row_size_bytes()?)?;
        decode_samples::<LittleEndian>(&bytes, layout.sample_type)?
    } else {
        let mut samples = Vec::with_capacity(n_rows * n_cols);
        for row in window.rows.clone() {
            let offset = stream.payload_offset + layout.sample_offset(row, window.cols.start)?;
            let bytes = read_exact_at(reader, offset, n_cols * sample_size)?;
            samples.extend(decode_samples::<LittleEndian>(&bytes, layout.sample_type)?);
        }
        samples
    };
    Array2::from_shape_vec((n_rows, n_cols), samples)
        .map_err(|e| FiberError::InvalidDimensions(e.to_string()))
}

/// Backend for DASF 1.0 files
#[derive(Debug, Clone)]
pub struct DasfFormat {
    sample_type: SampleType,
    compression: CompressionMethod,
    level: CompressionLevel,
}

impl Default for DasfFormat {
    fn default() -> Self {
        Self {
            sample_type: SampleType::F64,
            compression: CompressionMethod::None,
            level: CompressionLevel::default(),
        }
    }
}

impl DasfFormat {
    /// Create a backend that writes uncompressed `f64` samples
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the payload compression used when writing
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    /// Set the compression level used when writing
    pub fn with_compression_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the sample encoding used when writing
    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }
}

impl FiberFormat for DasfFormat {
    fn name(&self) -> &'static str {
        "DASF"
    }

    fn version(&self) -> &'static str {
        "1.0"
    }

    fn preferred_extensions(&self) -> &'static [&'static str] {
        &["dasf"]
    }

    fn identify(&self, path: &Path) -> Option<FormatId> {
        let header = read_magic(path, 8)?;
        if &header[..4] != DASF_MAGIC {
            return None;
        }
        // any 1.x file is read by this 1.0 backend and reported as such
        let major = u16::from_le_bytes([header[4], header[5]]);
        (major == VERSION_MAJOR).then(|| self.id())
    }

    fn scan(&self, path: &Path) -> Result<Vec<FileSummary>> {
        let streams = with_reader(path, read_streams).map_err(truncated_as_format)?;
        debug!("scanned {} DASF stream(s) in {}", streams.len(), path.display());

        streams
            .iter()
            .enumerate()
            .map(|(index, stream)| {
                FileSummary::new(
                    path,
                    self.name(),
                    self.version(),
                    index,
                    stream.header.attrs(),
                )
            })
            .collect()
    }

    fn read(&self, path: &Path, window: &ReadWindow) -> Result<Spool> {
        with_reader(path, |reader| {
            let streams = read_streams(reader)?;
            let mut patches = Vec::with_capacity(streams.len());
            let mut miss = None;

            for (index, stream) in streams.iter().enumerate() {
                let selected = match stream.layout.window(window) {
                    Ok(selected) => selected,
                    Err(err @ FiberError::OutOfRange(_)) => {
                        debug!(
                            "stream {} of {} outside window: {}",
                            index,
                            path.display(),
                            err
                        );
                        miss = Some(err);
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                let data = read_block(reader, stream, &selected)?;
                debug!(
                    "read {} of stream {} ({}) from {}",
                    format_bytes(data.len() * stream.layout.sample_type.size_in_bytes()),
                    index,
                    stream.layout.summary(),
                    path.display()
                );
                let attrs = stream.header.attrs();
                attrs.validate()?;
                patches.push(Patch::from_layout(&stream.layout, &selected, data, attrs)?);
            }

            match (patches.is_empty(), miss) {
                (true, Some(err)) => Err(err),
                _ => Ok(Spool::new(patches)),
            }
        })
        .map_err(truncated_as_format)
    }

    fn write(&self, spool: &Spool, path: &Path) -> Result<()> {
        if spool.is_empty() {
            return Err(FiberError::UnsupportedParameter(
                "cannot write an empty spool".to_string(),
            ));
        }
        let codec = self.compression.codec();

        with_writer(path, |writer| {
            writer.write_all(DASF_MAGIC)?;
            writer.write_u16::<LittleEndian>(VERSION_MAJOR)?;
            writer.write_u16::<LittleEndian>(VERSION_MINOR)?;
            writer.write_u32::<LittleEndian>(spool.len() as u32)?;

            for patch in spool {
                let header = StreamHeader::from_patch(patch, self.sample_type, self.compression)?;
                let json = serde_json::to_vec(&header)?;
                writer.write_u32::<LittleEndian>(json.len() as u32)?;
                writer.write_all(&json)?;

                let mut raw =
                    Vec::with_capacity(patch.data().len() * self.sample_type.size_in_bytes());
                encode_samples::<LittleEndian>(
                    patch.data().iter().copied(),
                    self.sample_type,
                    &mut raw,
                )?;
                let payload = codec.compress(&raw, self.level)?;
                writer.write_u64::<LittleEndian>(payload.len() as u64)?;
                writer.write_all(&payload)?;
            }
            Ok(())
        })?;
        debug!("wrote {} stream(s) to {}", spool.len(), path.display());
        Ok(())
    }
}
