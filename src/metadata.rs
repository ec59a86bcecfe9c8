//! Patch attributes and file summaries

use crate::error::{FiberError, Result};
use crate::utils::seconds_to_datetime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Attribute keys every summary and every patch must carry
pub const REQUIRED_DAS_ATTRS: &[&str] = &[
    "time_min",
    "time_max",
    "d_time",
    "distance_min",
    "distance_max",
    "d_distance",
    "data_units",
    "data_type",
];

/// `data_type` of particle-velocity recordings
pub const VELOCITY: &str = "velocity";

/// `data_type` of strain-rate recordings
pub const STRAIN_RATE: &str = "strain_rate";

/// A single attribute value looked up by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Number(_) => None,
        }
    }
}

/// Metadata attached to a patch
///
/// Coordinate bounds (`time_min` and friends) are owned by the patch: they
/// are rewritten from the coordinate arrays whenever a patch is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchAttrs {
    /// Physical quantity, e.g. "velocity" or "strain_rate"
    pub data_type: String,
    /// Units of the samples, e.g. "m/s"
    pub data_units: String,

    pub time_min: f64,
    pub time_max: f64,
    pub d_time: f64,
    #[serde(default = "default_time_units")]
    pub time_units: String,

    pub distance_min: f64,
    pub distance_max: f64,
    pub d_distance: f64,
    #[serde(default = "default_distance_units")]
    pub distance_units: String,

    /// Gauge length, set once the data has been differentiated in space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gauge_length: Option<f64>,

    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub station: String,
    #[serde(default)]
    pub instrument_id: String,
    #[serde(default)]
    pub tag: String,

    /// Free-form vendor key-value pairs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

fn default_time_units() -> String {
    "s".to_string()
}

fn default_distance_units() -> String {
    "m".to_string()
}

impl PatchAttrs {
    /// Create attributes with the given quantity and units, everything else empty
    pub fn new(data_type: impl Into<String>, data_units: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            data_units: data_units.into(),
            time_min: f64::NAN,
            time_max: f64::NAN,
            d_time: f64::NAN,
            time_units: default_time_units(),
            distance_min: f64::NAN,
            distance_max: f64::NAN,
            d_distance: f64::NAN,
            distance_units: default_distance_units(),
            gauge_length: None,
            network: String::new(),
            station: String::new(),
            instrument_id: String::new(),
            tag: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Look up an attribute by key; `None` for unknown keys, NaN and empty text
    pub fn get(&self, key: &str) -> Option<AttrValue> {
        let number = |v: f64| (!v.is_nan()).then_some(AttrValue::Number(v));
        let text = |s: &str| (!s.is_empty()).then(|| AttrValue::Text(s.to_string()));

        match key {
            "data_type" => text(&self.data_type),
            "data_units" => text(&self.data_units),
            "time_min" => number(self.time_min),
            "time_max" => number(self.time_max),
            "d_time" => number(self.d_time),
            "time_units" => text(&self.time_units),
            "distance_min" => number(self.distance_min),
            "distance_max" => number(self.distance_max),
            "d_distance" => number(self.d_distance),
            "distance_units" => text(&self.distance_units),
            "gauge_length" => self.gauge_length.and_then(number),
            "network" => text(&self.network),
            "station" => text(&self.station),
            "instrument_id" => text(&self.instrument_id),
            "tag" => text(&self.tag),
            other => self.extra.get(other).and_then(|v| text(v)),
        }
    }

    /// Keys that currently hold a value
    pub fn keys(&self) -> Vec<String> {
        const KNOWN: &[&str] = &[
            "data_type",
            "data_units",
            "time_min",
            "time_max",
            "d_time",
            "time_units",
            "distance_min",
            "distance_max",
            "d_distance",
            "distance_units",
            "gauge_length",
            "network",
            "station",
            "instrument_id",
            "tag",
        ];
        KNOWN
            .iter()
            .map(|k| k.to_string())
            .chain(self.extra.keys().cloned())
            .filter(|k| self.get(k).is_some())
            .collect()
    }

    /// Check the required attribute set and the ordering of the bounds
    pub fn validate(&self) -> Result<()> {
        if let Some(missing) = REQUIRED_DAS_ATTRS.iter().find(|k| self.get(k).is_none()) {
            return Err(FiberError::MissingField(missing.to_string()));
        }
        let numeric = [
            ("time_min", self.time_min),
            ("time_max", self.time_max),
            ("d_time", self.d_time),
            ("distance_min", self.distance_min),
            ("distance_max", self.distance_max),
            ("d_distance", self.d_distance),
        ];
        if let Some((key, value)) = numeric.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FiberError::InvalidFormat(format!(
                "{} is not finite ({})",
                key, value
            )));
        }
        if self.time_min > self.time_max {
            return Err(FiberError::InvalidFormat(format!(
                "time_min {} exceeds time_max {}",
                self.time_min, self.time_max
            )));
        }
        if self.distance_min > self.distance_max {
            return Err(FiberError::InvalidFormat(format!(
                "distance_min {} exceeds distance_max {}",
                self.distance_min, self.distance_max
            )));
        }
        if self.d_time <= 0.0 || self.d_distance <= 0.0 {
            return Err(FiberError::InvalidFormat(
                "sample spacing must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Header-level description of one stream in a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub file_format: String,
    pub file_version: String,
    /// Index of the stream within its file
    #[serde(default)]
    pub stream: usize,
    #[serde(flatten)]
    pub attrs: PatchAttrs,
}

impl FileSummary {
    /// Build a summary, failing unless the attributes are complete
    pub fn new(
        path: impl Into<PathBuf>,
        file_format: impl Into<String>,
        file_version: impl Into<String>,
        stream: usize,
        attrs: PatchAttrs,
    ) -> Result<Self> {
        attrs.validate()?;
        Ok(Self {
            path: path.into(),
            file_format: file_format.into(),
            file_version: file_version.into(),
            stream,
            attrs,
        })
    }

    pub fn time_min(&self) -> f64 {
        self.attrs.time_min
    }

    pub fn time_max(&self) -> f64 {
        self.attrs.time_max
    }

    pub fn distance_min(&self) -> f64 {
        self.attrs.distance_min
    }

    pub fn distance_max(&self) -> f64 {
        self.attrs.distance_max
    }

    pub fn data_units(&self) -> &str {
        &self.attrs.data_units
    }
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = seconds_to_datetime(self.attrs.time_min)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| self.attrs.time_min.to_string());
        write!(
            f,
            "{} [{} {}#{}] {} ({}) from {} for {:.3} {}, distance {}..{} {}",
            self.path.display(),
            self.file_format,
            self.file_version,
            self.stream,
            self.attrs.data_type,
            self.attrs.data_units,
            start,
            self.attrs.time_max - self.attrs.time_min,
            self.attrs.time_units,
            self.attrs.distance_min,
            self.attrs.distance_max,
            self.attrs.distance_units,
        )
    }
}
