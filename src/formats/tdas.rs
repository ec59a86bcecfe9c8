//! TDAS 2.1: big-endian single-stream record with a fixed 128-byte header
//!
//! Samples follow the header as `f32` values, row-major over
//! `(time, distance)`.

use super::dasf::even_axis;
use super::{FiberFormat, FormatId};
use crate::error::{FiberError, Result};
use crate::io::{read_exact_at, read_magic, stream_len, with_reader, with_writer};
use crate::layout::StreamLayout;
use crate::metadata::{FileSummary, PatchAttrs};
use crate::patch::{Patch, Spool};
use crate::types::{AxisDescriptor, Dimension, SampleType};
use crate::utils::{decode_samples, encode_samples, read_fixed_str, write_fixed_str};
use crate::window::ReadWindow;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use ndarray::{s, Array2};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

/// Magic number for TDAS files
pub const TDAS_MAGIC: &[u8; 4] = b"TDAS";

/// Size of the fixed header
pub const HEADER_SIZE: usize = 128;

const VERSION_MAJOR: u8 = 2;
const VERSION_MINOR: u8 = 1;
const UNITS_WIDTH: usize = 16;
const INSTRUMENT_WIDTH: usize = 32;

/// `data_type` values and their header codes
const DATA_TYPE_CODES: &[(u8, &str)] = &[
    (1, "velocity"),
    (2, "strain_rate"),
    (3, "strain"),
    (4, "phase"),
];

/// Decoded fixed header
#[derive(Debug, Clone, PartialEq)]
struct TdasHeader {
    n_time: u32,
    n_distance: u32,
    time_start: f64,
    d_time: f64,
    distance_start: f64,
    d_distance: f64,
    data_type: String,
    data_units: String,
    instrument_id: String,
}

impl TdasHeader {
    fn parse(raw: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(raw);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != TDAS_MAGIC {
            return Err(FiberError::InvalidFormat("missing TDAS magic".to_string()));
        }
        let major = cursor.read_u8()?;
        let minor = cursor.read_u8()?;
        if major != VERSION_MAJOR {
            return Err(FiberError::InvalidFormat(format!(
                "unsupported TDAS version {}.{}",
                major, minor
            )));
        }
        let _reserved = cursor.read_u16::<BigEndian>()?;
        let n_time = cursor.read_u32::<BigEndian>()?;
        let n_distance = cursor.read_u32::<BigEndian>()?;
        let time_start = cursor.read_f64::<BigEndian>()?;
        let d_time = cursor.read_f64::<BigEndian>()?;
        let distance_start = cursor.read_f64::<BigEndian>()?;
        let d_distance = cursor.read_f64::<BigEndian>()?;

        let code = cursor.read_u8()?;
        let data_type = DATA_TYPE_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| name.to_string())
            .ok_or_else(|| {
                FiberError::InvalidFormat(format!("unknown TDAS data type code {}", code))
            })?;

        let mut units = [0u8; UNITS_WIDTH];
        cursor.read_exact(&mut units)?;
        let mut instrument = [0u8; INSTRUMENT_WIDTH];
        cursor.read_exact(&mut instrument)?;

        Ok(Self {
            n_time,
            n_distance,
            time_start,
            d_time,
            distance_start,
            d_distance,
            data_type,
            data_units: read_fixed_str(&units),
            instrument_id: read_fixed_str(&instrument),
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let code = DATA_TYPE_CODES
            .iter()
            .find(|(_, name)| *name == self.data_type)
            .map(|(c, _)| *c)
            .ok_or_else(|| {
                FiberError::UnsupportedParameter(format!(
                    "TDAS cannot store data_type '{}'",
                    self.data_type
                ))
            })?;

        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.write_all(TDAS_MAGIC)?;
        out.write_u8(VERSION_MAJOR)?;
        out.write_u8(VERSION_MINOR)?;
        out.write_u16::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(self.n_time)?;
        out.write_u32::<BigEndian>(self.n_distance)?;
        out.write_f64::<BigEndian>(self.time_start)?;
        out.write_f64::<BigEndian>(self.d_time)?;
        out.write_f64::<BigEndian>(self.distance_start)?;
        out.write_f64::<BigEndian>(self.d_distance)?;
        out.write_u8(code)?;
        out.write_all(&write_fixed_str(&self.data_units, UNITS_WIDTH)?)?;
        out.write_all(&write_fixed_str(&self.instrument_id, INSTRUMENT_WIDTH)?)?;
        out.resize(HEADER_SIZE, 0);
        Ok(out)
    }

    fn layout(&self) -> Result<StreamLayout> {
        StreamLayout::new(
            [Dimension::Time, Dimension::Distance],
            [
                AxisDescriptor::new(self.n_time as usize, self.time_start, self.d_time, "s"),
                AxisDescriptor::new(
                    self.n_distance as usize,
                    self.distance_start,
                    self.d_distance,
                    "m",
                ),
            ],
            SampleType::F32,
        )
    }

    fn attrs(&self, layout: &StreamLayout) -> PatchAttrs {
        let mut attrs = PatchAttrs::new(self.data_type.clone(), self.data_units.clone());
        if let Some(time) = layout.axis(Dimension::Time) {
            attrs.time_min = time.start;
            attrs.time_max = time.coord_max();
            attrs.d_time = time.step;
        }
        if let Some(distance) = layout.axis(Dimension::Distance) {
            attrs.distance_min = distance.start;
            attrs.distance_max = distance.coord_max();
            attrs.d_distance = distance.step;
        }
        attrs.instrument_id = self.instrument_id.clone();
        attrs
    }
}

/// Sample count as stored in the 32-bit header fields
fn header_count(dim: Dimension, n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| {
        FiberError::UnsupportedParameter(format!(
            "TDAS cannot store {} {} samples, the limit is {}",
            n,
            dim,
            u32::MAX
        ))
    })
}

/// Read and check the header against the file size
fn read_header<R: Read + Seek>(reader: &mut R) -> Result<(TdasHeader, StreamLayout)> {
    let file_len = stream_len(reader)?;
    if file_len < HEADER_SIZE as u64 {
        return Err(FiberError::InvalidFormat(format!(
            "{} bytes is too short for a TDAS header",
            file_len
        )));
    }
    let raw = read_exact_at(reader, 0, HEADER_SIZE)?;
    let header = TdasHeader::parse(&raw)?;
    let layout = header.layout()?;

    let expected = (layout.total_size_bytes()? as u64).checked_add(HEADER_SIZE as u64);
    if expected != Some(file_len) {
        return Err(FiberError::InvalidFormat(format!(
            "TDAS file holds {} bytes, header {} needs {}",
            file_len,
            layout.summary(),
            expected.map_or_else(|| "more".to_string(), |n| n.to_string())
        )));
    }
    Ok((header, layout))
}

/// Backend for TDAS 2.1 files
#[derive(Debug, Clone, Default)]
pub struct TdasFormat;

impl TdasFormat {
    pub fn new() -> Self {
        Self
    }
}

impl FiberFormat for TdasFormat {
    fn name(&self) -> &'static str {
        "TDAS"
    }

    fn version(&self) -> &'static str {
        "2.1"
    }

    fn preferred_extensions(&self) -> &'static [&'static str] {
        &["tdas", "bin"]
    }

    fn identify(&self, path: &Path) -> Option<FormatId> {
        let header = read_magic(path, 6)?;
        let claimed = &header[..4] == TDAS_MAGIC && header[4] == VERSION_MAJOR;
        claimed.then(|| self.id())
    }

    fn scan(&self, path: &Path) -> Result<Vec<FileSummary>> {
        let (header, layout) = with_reader(path, read_header)?;
        debug!("scanned TDAS {} in {}", layout.summary(), path.display());
        let summary = FileSummary::new(
            path,
            self.name(),
            self.version(),
            0,
            header.attrs(&layout),
        )?;
        Ok(vec![summary])
    }

    fn read(&self, path: &Path, window: &ReadWindow) -> Result<Spool> {
        with_reader(path, |reader| {
            let (header, layout) = read_header(reader)?;
            let selected = layout.window(window)?;
            let attrs = header.attrs(&layout);
            attrs.validate()?;

            let (n_rows, n_cols) = selected.shape();
            let offset = HEADER_SIZE as u64 + layout.sample_offset(selected.rows.start, 0)?;
            let bytes = read_exact_at(reader, offset, n_rows * layout.row_size_bytes()?)?;
            let rows = Array2::from_shape_vec(
                (n_rows, layout.shape().1),
                decode_samples::<BigEndian>(&bytes, layout.sample_type)?,
            )
            .map_err(|e| FiberError::InvalidDimensions(e.to_string()))?;
            let data = rows.slice(s![.., selected.cols.clone()]).to_owned();
            debug!(
                "read ({} x {}) TDAS samples from {}",
                n_rows,
                n_cols,
                path.display()
            );

            Ok(Spool::from(Patch::from_layout(
                &layout, &selected, data, attrs,
            )?))
        })
    }

    fn write(&self, spool: &Spool, path: &Path) -> Result<()> {
        let patch = match spool.len() {
            1 => &spool[0],
            n => {
                return Err(FiberError::UnsupportedParameter(format!(
                    "TDAS files hold exactly one patch, got {}",
                    n
                )))
            }
        };
        let attrs = patch.attrs();
        let time = even_axis(patch, Dimension::Time, attrs.d_time, "s")?;
        let distance = even_axis(patch, Dimension::Distance, attrs.d_distance, "m")?;
        let header = TdasHeader {
            n_time: header_count(Dimension::Time, time.num_samples)?,
            n_distance: header_count(Dimension::Distance, distance.num_samples)?,
            time_start: time.start,
            d_time: time.step,
            distance_start: distance.start,
            d_distance: distance.step,
            data_type: attrs.data_type.clone(),
            data_units: attrs.data_units.clone(),
            instrument_id: attrs.instrument_id.clone(),
        };
        let encoded_header = header.encode()?;

        // samples go out time-major whatever the patch order
        let view = if patch.axis_of(Dimension::Time) == Some(0) {
            patch.data().view()
        } else {
            patch.data().t()
        };
        let mut payload = Vec::with_capacity(view.len() * SampleType::F32.size_in_bytes());
        encode_samples::<BigEndian>(view.iter().copied(), SampleType::F32, &mut payload)?;

        with_writer(path, |writer| {
            writer.write_all(&encoded_header)?;
            writer.write_all(&payload)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::tests::make_patch;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_header_layout() {
        let header = TdasHeader {
            n_time: 3,
            n_distance: 2,
            time_start: 10.0,
            d_time: 0.25,
            distance_start: -5.0,
            d_distance: 2.5,
            data_type: "strain_rate".into(),
            data_units: "1/s".into(),
            instrument_id: "iDAS-007".into(),
        };
        let raw = header.encode().unwrap();
        assert_eq!(raw.len(), HEADER_SIZE);
        assert_eq!(&raw[..4], TDAS_MAGIC);
        assert_eq!(&raw[8..12], &3u32.to_be_bytes());
        assert_eq!(raw[48], 2);
        assert_eq!(TdasHeader::parse(&raw).unwrap(), header);
    }

    #[test]
    fn test_unknown_data_type_code() {
        let mut raw = TdasHeader {
            n_time: 1,
            n_distance: 1,
            time_start: 0.0,
            d_time: 1.0,
            distance_start: 0.0,
            d_distance: 1.0,
            data_type: "velocity".into(),
            data_units: "m/s".into(),
            instrument_id: String::new(),
        }
        .encode()
        .unwrap();
        raw[48] = 99;
        assert!(TdasHeader::parse(&raw).unwrap_err().is_format_error());
    }

    #[test]
    fn test_write_transposes_to_time_major() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.tdas");
        let patch = make_patch(3, 4);
        TdasFormat::new().write(&patch.clone().into(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 12 * 4);
        // second sample on disk: time 0, distance 1
        assert_eq!(&bytes[HEADER_SIZE + 4..HEADER_SIZE + 8], &10f32.to_be_bytes());

        let spool = TdasFormat::new().read(&path, &ReadWindow::full()).unwrap();
        let out = &spool[0];
        assert_eq!(out.dims(), &[Dimension::Time, Dimension::Distance]);
        assert_eq!(out.data(), &patch.data().t());
    }

    #[test]
    fn test_size_mismatch_is_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.tdas");
        TdasFormat::new().write(&make_patch(3, 4).into(), &path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0u8; 4]);
        fs::write(&path, bytes).unwrap();

        assert!(TdasFormat::new().identify(&path).is_some());
        assert!(TdasFormat::new().scan(&path).unwrap_err().is_format_error());
    }

    #[test]
    fn test_oversized_header_counts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("huge.tdas");
        let header = TdasHeader {
            n_time: u32::MAX,
            n_distance: u32::MAX,
            time_start: 0.0,
            d_time: 0.001,
            distance_start: 0.0,
            d_distance: 1.0,
            data_type: "velocity".into(),
            data_units: "m/s".into(),
            instrument_id: String::new(),
        };
        let mut bytes = header.encode().unwrap();
        bytes.extend_from_slice(&[0u8; 64]);
        fs::write(&path, bytes).unwrap();

        let format = TdasFormat::new();
        assert!(format.identify(&path).is_some());
        assert!(format.scan(&path).unwrap_err().is_format_error());
        let err = format.read(&path, &ReadWindow::full()).unwrap_err();
        assert!(err.is_format_error(), "{:?}", err);
    }

    #[test]
    fn test_header_count_limit() {
        assert_eq!(header_count(Dimension::Time, 1500).unwrap(), 1500);
        assert_eq!(header_count(Dimension::Time, u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            header_count(Dimension::Distance, u32::MAX as usize + 1),
            Err(FiberError::UnsupportedParameter(_))
        ));
    }

    #[test]
    fn test_minor_version_reports_backend_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.tdas");
        let format = TdasFormat::new();
        format.write(&make_patch(2, 3).into(), &path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes[5] = 7;
        fs::write(&path, bytes).unwrap();

        let id = format.identify(&path).unwrap();
        assert_eq!(id, format.id());
        assert_eq!(format.scan(&path).unwrap()[0].file_version, id.version);
    }

    #[test]
    fn test_interior_uneven_coordinates_rejected_on_write() {
        let (data, dims, mut coords, attrs) = make_patch(3, 4).into_parts();
        coords.insert(Dimension::Time, ndarray::array![100.0, 100.1, 101.4, 101.5]);
        let patch = Patch::new(data, dims, coords, attrs).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let err = TdasFormat::new()
            .write(&patch.into(), &temp_dir.path().join("x.tdas"))
            .unwrap_err();
        assert!(matches!(err, FiberError::UnsupportedParameter(_)), "{:?}", err);
    }

    #[test]
    fn test_write_rejects_multiple_patches() {
        let temp_dir = TempDir::new().unwrap();
        let spool = Spool::new(vec![make_patch(2, 2), make_patch(2, 2)]);
        let err = TdasFormat::new()
            .write(&spool, &temp_dir.path().join("a.tdas"))
            .unwrap_err();
        assert!(matches!(err, FiberError::UnsupportedParameter(_)));
    }
}
