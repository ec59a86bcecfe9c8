//! Core data types for fiberio

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FiberError;

/// Sample encodings found in DAS payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SampleType {
    /// Signed 16-bit integer (raw phase counts)
    I16 = 0,
    /// Signed 32-bit integer
    I32 = 1,
    /// 32-bit floating point
    F32 = 2,
    /// 64-bit floating point
    F64 = 3,
}

impl SampleType {
    /// Size in bytes of this sample type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            SampleType::I16 => 2,
            SampleType::I32 | SampleType::F32 => 4,
            SampleType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Named dimension of a patch axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Time,
    Distance,
    Frequency,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Time => "time",
            Dimension::Distance => "distance",
            Dimension::Frequency => "frequency",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = FiberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(Dimension::Time),
            "distance" => Ok(Dimension::Distance),
            "frequency" => Ok(Dimension::Frequency),
            other => Err(FiberError::InvalidDimensions(format!(
                "unknown dimension name '{}'",
                other
            ))),
        }
    }
}

/// Evenly sampled axis: start, step and number of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    /// Number of samples along this axis
    #[serde(rename = "count")]
    pub num_samples: usize,
    /// Coordinate of the first sample
    pub start: f64,
    /// Spacing between consecutive samples
    pub step: f64,
    /// Unit of measurement (e.g., "s", "m")
    #[serde(default)]
    pub units: String,
}

impl AxisDescriptor {
    /// Create a new axis descriptor
    pub fn new(num_samples: usize, start: f64, step: f64, units: impl Into<String>) -> Self {
        Self {
            num_samples,
            start,
            step,
            units: units.into(),
        }
    }

    /// Coordinate of the sample at `index`
    ///
    /// Every coordinate array in the crate is produced through this function,
    /// so full and windowed reads agree bit for bit.
    pub fn index_to_coord(&self, index: usize) -> f64 {
        self.start + index as f64 * self.step
    }

    /// Coordinate of the last sample
    pub fn coord_max(&self) -> f64 {
        self.index_to_coord(self.num_samples.saturating_sub(1))
    }

    /// Materialize the full coordinate array
    pub fn coords(&self) -> Array1<f64> {
        Array1::from_iter((0..self.num_samples).map(|i| self.index_to_coord(i)))
    }

    /// Structural sanity: non-empty, finite start, positive finite step
    pub fn is_valid(&self) -> bool {
        self.num_samples > 0 && self.start.is_finite() && self.step.is_finite() && self.step > 0.0
    }
}

/// Closed coordinate interval `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordRange {
    pub min: f64,
    pub max: f64,
}

impl CoordRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        !self.min.is_nan() && !self.max.is_nan() && self.min <= self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl From<(f64, f64)> for CoordRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self::new(min, max)
    }
}

impl fmt::Display for CoordRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_type_sizes() {
        assert_eq!(SampleType::I16.size_in_bytes(), 2);
        assert_eq!(SampleType::I32.size_in_bytes(), 4);
        assert_eq!(SampleType::F32.size_in_bytes(), 4);
        assert_eq!(SampleType::F64.size_in_bytes(), 8);
        assert!(!SampleType::I32.is_float());
    }

    #[test]
    fn test_dimension_parsing() {
        assert_eq!("time".parse::<Dimension>().unwrap(), Dimension::Time);
        assert_eq!("distance".parse::<Dimension>().unwrap(), Dimension::Distance);
        assert!("channel".parse::<Dimension>().is_err());
        assert_eq!(Dimension::Frequency.to_string(), "frequency");
    }

    #[test]
    fn test_axis_descriptor() {
        let axis = AxisDescriptor::new(101, 0.0, 10.0, "m");
        assert_eq!(axis.index_to_coord(0), 0.0);
        assert_eq!(axis.coord_max(), 1000.0);
        let coords = axis.coords();
        assert_eq!(coords.len(), 101);
        assert_eq!(coords[50], 500.0);
        assert!(axis.is_valid());
        assert!(!AxisDescriptor::new(0, 0.0, 1.0, "m").is_valid());
        assert!(!AxisDescriptor::new(10, 0.0, -1.0, "m").is_valid());
    }

    #[test]
    fn test_coord_range() {
        let range = CoordRange::from((1.0, 2.0));
        assert!(range.is_valid());
        assert!(range.contains(1.0));
        assert!(range.contains(2.0));
        assert!(!range.contains(2.5));
        assert!(!CoordRange::new(3.0, 1.0).is_valid());
        assert!(!CoordRange::new(f64::NAN, 1.0).is_valid());
    }
}
