//! Coordinate windows for reads and selections

use crate::error::{FiberError, Result};
use crate::types::{AxisDescriptor, CoordRange, Dimension};
use ndarray::ArrayView1;
use std::ops::Range;

/// Optional time and distance limits applied while reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadWindow {
    pub time: Option<CoordRange>,
    pub distance: Option<CoordRange>,
}

impl ReadWindow {
    /// A window covering the full extent of every stream
    pub fn full() -> Self {
        Self::default()
    }

    /// Limit the time axis to the closed interval `[min, max]`
    pub fn with_time(mut self, min: f64, max: f64) -> Self {
        self.time = Some(CoordRange::new(min, max));
        self
    }

    /// Limit the distance axis to the closed interval `[min, max]`
    pub fn with_distance(mut self, min: f64, max: f64) -> Self {
        self.distance = Some(CoordRange::new(min, max));
        self
    }

    /// Range requested for `dim`, if any
    pub fn range(&self, dim: Dimension) -> Option<CoordRange> {
        match dim {
            Dimension::Time => self.time,
            Dimension::Distance => self.distance,
            Dimension::Frequency => None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.time.is_none() && self.distance.is_none()
    }
}

/// Indices of the increasing `coords` that fall inside `range` (inclusive)
pub fn index_window(coords: ArrayView1<'_, f64>, range: &CoordRange) -> Option<Range<usize>> {
    let start = coords.iter().position(|&c| c >= range.min)?;
    let end = coords.iter().rposition(|&c| c <= range.max)? + 1;
    (start < end).then_some(start..end)
}

/// Same selection as [`index_window`], computed from the axis sampling
///
/// Only a handful of coordinates around each limit are evaluated, so the
/// cost does not depend on the axis length.
pub fn axis_index_window(axis: &AxisDescriptor, range: &CoordRange) -> Option<Range<usize>> {
    let n = axis.num_samples;
    let mut start = nearest_index(axis, range.min);
    while start > 0 && axis.index_to_coord(start - 1) >= range.min {
        start -= 1;
    }
    while start < n && axis.index_to_coord(start) < range.min {
        start += 1;
    }

    let mut end = nearest_index(axis, range.max);
    while end < n && axis.index_to_coord(end) <= range.max {
        end += 1;
    }
    while end > 0 && axis.index_to_coord(end - 1) > range.max {
        end -= 1;
    }
    (start < end).then_some(start..end)
}

/// Index closest to `value`, clamped to `0..=num_samples`
fn nearest_index(axis: &AxisDescriptor, value: f64) -> usize {
    let pos = ((value - axis.start) / axis.step).round();
    if pos.is_nan() || pos <= 0.0 {
        0
    } else if pos >= axis.num_samples as f64 {
        axis.num_samples
    } else {
        pos as usize
    }
}

fn check_range(dim: Dimension, range: &CoordRange) -> Result<()> {
    if range.is_valid() {
        return Ok(());
    }
    Err(FiberError::OutOfRange(format!(
        "{} range {} is not an ordered interval",
        dim, range
    )))
}

fn no_overlap(dim: Dimension, range: &CoordRange, extent: String) -> FiberError {
    FiberError::OutOfRange(format!(
        "{} range {} does not intersect {}",
        dim, range, extent
    ))
}

/// Resolve an optional range on `dim` into sample indices
///
/// `None` selects the whole axis. A range that keeps no sample is an error.
pub fn resolve_window(
    dim: Dimension,
    coords: ArrayView1<'_, f64>,
    range: Option<CoordRange>,
) -> Result<Range<usize>> {
    let Some(range) = range else {
        return Ok(0..coords.len());
    };
    check_range(dim, &range)?;
    index_window(coords, &range).ok_or_else(|| {
        let extent = match (coords.first(), coords.last()) {
            (Some(first), Some(last)) => format!("[{}, {}]", first, last),
            _ => "an empty axis".to_string(),
        };
        no_overlap(dim, &range, extent)
    })
}

/// [`resolve_window`] for an evenly sampled axis that is never materialized
pub fn resolve_axis_window(
    dim: Dimension,
    axis: &AxisDescriptor,
    range: Option<CoordRange>,
) -> Result<Range<usize>> {
    let Some(range) = range else {
        return Ok(0..axis.num_samples);
    };
    check_range(dim, &range)?;
    axis_index_window(axis, &range).ok_or_else(|| {
        let extent = format!("[{}, {}]", axis.start, axis.coord_max());
        no_overlap(dim, &range, extent)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn test_index_window_inclusive() {
        let coords = Array1::from(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(index_window(coords.view(), &CoordRange::new(1.0, 3.0)), Some(1..4));
        assert_eq!(index_window(coords.view(), &CoordRange::new(0.5, 3.5)), Some(1..4));
        assert_eq!(index_window(coords.view(), &CoordRange::new(-9.0, 99.0)), Some(0..5));
        assert_eq!(index_window(coords.view(), &CoordRange::new(4.0, 4.0)), Some(4..5));
        assert_eq!(index_window(coords.view(), &CoordRange::new(1.2, 1.8)), None);
        assert_eq!(index_window(coords.view(), &CoordRange::new(5.0, 6.0)), None);
    }

    #[test]
    fn test_resolve_window() {
        let coords = Array1::from(vec![10.0, 20.0, 30.0]);
        assert_eq!(resolve_window(Dimension::Time, coords.view(), None).unwrap(), 0..3);
        let err = resolve_window(
            Dimension::Distance,
            coords.view(),
            Some(CoordRange::new(40.0, 50.0)),
        )
        .unwrap_err();
        assert!(matches!(err, FiberError::OutOfRange(_)));
        let err = resolve_window(
            Dimension::Time,
            coords.view(),
            Some(CoordRange::new(30.0, 10.0)),
        )
        .unwrap_err();
        assert!(matches!(err, FiberError::OutOfRange(_)));
    }

    #[test]
    fn test_axis_window_matches_coordinate_search() {
        let axis = AxisDescriptor::new(500, 12.0, 0.01, "s");
        let coords = axis.coords();
        let ranges = [
            CoordRange::new(coords[10], coords[40]),
            CoordRange::new(12.05, 12.2),
            CoordRange::new(12.001, 12.009),
            CoordRange::new(-1.0, 12.0),
            CoordRange::new(f64::NEG_INFINITY, f64::INFINITY),
            CoordRange::new(coords[499], 1e300),
            CoordRange::new(17.0, 18.0),
            CoordRange::new(0.0, 11.99),
        ];
        for range in &ranges {
            assert_eq!(
                axis_index_window(&axis, range),
                index_window(coords.view(), range),
                "{}",
                range
            );
        }
    }

    #[test]
    fn test_axis_window_on_huge_axis() {
        let axis = AxisDescriptor::new(usize::MAX, 0.0, 1.0, "s");
        let range = resolve_axis_window(Dimension::Time, &axis, Some(CoordRange::new(5.0, 9.5)));
        assert_eq!(range.unwrap(), 5..10);
        let err = resolve_axis_window(Dimension::Time, &axis, Some(CoordRange::new(-9.0, -1.0)))
            .unwrap_err();
        assert!(matches!(err, FiberError::OutOfRange(_)));
    }

    #[test]
    fn test_read_window_builder() {
        let window = ReadWindow::full().with_time(1.0, 2.0);
        assert!(!window.is_full());
        assert_eq!(window.range(Dimension::Time), Some(CoordRange::new(1.0, 2.0)));
        assert_eq!(window.range(Dimension::Distance), None);
    }
}
