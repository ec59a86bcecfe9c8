//! Conversion of particle velocity to strain rate

use super::findiff::FinDiff;
use crate::error::{FiberError, Result};
use crate::metadata::{PatchAttrs, STRAIN_RATE, VELOCITY};
use crate::patch::Patch;
use crate::types::Dimension;
use log::debug;
use ndarray::{s, Axis};

/// Parameters of [`velocity_to_strain_rate_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrainRateOptions {
    /// Gauge length as a multiple of the channel spacing
    pub gauge_multiple: usize,
    /// Accuracy order of the finite-difference operator
    pub order: usize,
    /// Finite-difference operator when true, plain differences otherwise
    pub finite_diff: bool,
}

impl Default for StrainRateOptions {
    fn default() -> Self {
        Self {
            gauge_multiple: 1,
            order: 1,
            finite_diff: true,
        }
    }
}

impl StrainRateOptions {
    pub fn with_gauge_multiple(mut self, gauge_multiple: usize) -> Self {
        self.gauge_multiple = gauge_multiple;
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_finite_diff(mut self, finite_diff: bool) -> Self {
        self.finite_diff = finite_diff;
        self
    }
}

/// Convert a velocity patch to strain rate by differentiating along distance
///
/// The patch must have `time` and `distance` dimensions and
/// `data_type == "velocity"`. With `finite_diff` the derivative operator keeps
/// every channel (only `gauge_multiple == 1` is supported). Without it,
/// channels `gauge_multiple` apart are differenced and the distance axis
/// shrinks by `gauge_multiple`, each output channel sitting at the midpoint of
/// its two inputs. Either way the result is a new patch with
/// `data_type == "strain_rate"` and a `gauge_length`.
pub fn velocity_to_strain_rate(
    patch: &Patch,
    gauge_multiple: usize,
    order: usize,
    finite_diff: bool,
) -> Result<Patch> {
    velocity_to_strain_rate_with(
        patch,
        &StrainRateOptions {
            gauge_multiple,
            order,
            finite_diff,
        },
    )
}

/// [`velocity_to_strain_rate`] driven by an options value
pub fn velocity_to_strain_rate_with(patch: &Patch, options: &StrainRateOptions) -> Result<Patch> {
    if !patch.has_dim(Dimension::Time) {
        return Err(FiberError::Precondition(
            "patch has no 'time' dimension".to_string(),
        ));
    }
    let axis = patch.axis_of(Dimension::Distance).ok_or_else(|| {
        FiberError::Precondition("patch has no 'distance' dimension".to_string())
    })?;
    let attrs = patch.attrs();
    if attrs.data_type != VELOCITY {
        return Err(FiberError::Precondition(format!(
            "data_type must be '{}', got '{}'",
            VELOCITY, attrs.data_type
        )));
    }
    if options.gauge_multiple == 0 || options.order == 0 {
        return Err(FiberError::UnsupportedParameter(format!(
            "gauge_multiple ({}) and order ({}) must be positive",
            options.gauge_multiple, options.order
        )));
    }
    if !(attrs.d_distance.is_finite() && attrs.d_distance > 0.0) {
        return Err(FiberError::Precondition(format!(
            "d_distance {} must be a positive number",
            attrs.d_distance
        )));
    }

    debug!(
        "strain rate: gauge_multiple {}, order {}, finite_diff {}, distance axis {}",
        options.gauge_multiple, options.order, options.finite_diff, axis
    );
    if options.finite_diff {
        finite_difference(patch, axis, options)
    } else {
        discrete_difference(patch, axis, options.gauge_multiple)
    }
}

fn finite_difference(patch: &Patch, axis: usize, options: &StrainRateOptions) -> Result<Patch> {
    if options.gauge_multiple != 1 {
        return Err(FiberError::UnsupportedParameter(format!(
            "finite-difference mode only supports gauge_multiple 1, got {}",
            options.gauge_multiple
        )));
    }
    let attrs = patch.attrs();
    let operator = FinDiff::with_accuracy(axis, attrs.d_distance, 1, options.order)?;
    let channels = patch.data().len_of(Axis(axis));
    if channels < operator.min_len() {
        return Err(FiberError::Precondition(format!(
            "{} distance samples are too few for order {} (need {})",
            channels,
            options.order,
            operator.min_len()
        )));
    }

    let data = operator.apply(patch.data())?;
    Patch::new(
        data,
        *patch.dims(),
        patch.coords().clone(),
        strain_rate_attrs(attrs, 1),
    )
}

fn discrete_difference(patch: &Patch, axis: usize, gauge_multiple: usize) -> Result<Patch> {
    let data = patch.data();
    let channels = data.len_of(Axis(axis));
    if channels <= gauge_multiple {
        return Err(FiberError::Precondition(format!(
            "{} distance samples are too few for gauge_multiple {}",
            channels, gauge_multiple
        )));
    }
    let g = gauge_multiple;
    let n = channels;

    let diff = match axis {
        0 => &data.slice(s![g.., ..]) - &data.slice(s![..n - g, ..]),
        1 => &data.slice(s![.., g..]) - &data.slice(s![.., ..n - g]),
        other => {
            return Err(FiberError::UnsupportedParameter(format!(
                "distance must be array axis 0 or 1, found axis {}",
                other
            )))
        }
    };
    let attrs = patch.attrs();
    let strain = diff / (attrs.d_distance * g as f64);

    let mut coords = patch.coords().clone();
    let distance = coords.get(&Dimension::Distance).ok_or_else(|| {
        FiberError::Precondition("patch has no distance coordinates".to_string())
    })?;
    let midpoints = (&distance.slice(s![g..]) + &distance.slice(s![..n - g])) / 2.0;
    coords.insert(Dimension::Distance, midpoints);

    Patch::new(strain, *patch.dims(), coords, strain_rate_attrs(attrs, g))
}

fn strain_rate_attrs(attrs: &PatchAttrs, gauge_multiple: usize) -> PatchAttrs {
    let mut out = attrs.clone();
    out.data_type = STRAIN_RATE.to_string();
    out.gauge_length = Some(attrs.d_distance * gauge_multiple as f64);
    out.data_units = divide_units(&attrs.data_units, &attrs.distance_units);
    out
}

/// Units of `numerator / denominator`, cancelling a shared leading unit
///
/// `"m/s"` over `"m"` gives `"1/s"`.
pub fn divide_units(numerator: &str, denominator: &str) -> String {
    if denominator.is_empty() {
        return numerator.to_string();
    }
    if numerator.is_empty() {
        return format!("1/{}", denominator);
    }
    if numerator == denominator {
        return "1".to_string();
    }
    match numerator.strip_prefix(denominator) {
        Some(rest) if rest.starts_with('/') => format!("1{}", rest),
        _ => format!("{}/{}", numerator, denominator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::tests::make_patch;

    #[test]
    fn test_divide_units() {
        assert_eq!(divide_units("m/s", "m"), "1/s");
        assert_eq!(divide_units("rad", "m"), "rad/m");
        assert_eq!(divide_units("m", "m"), "1");
        assert_eq!(divide_units("", "m"), "1/m");
        assert_eq!(divide_units("mm/s", "m"), "mm/s/m");
    }

    #[test]
    fn test_options_builder() {
        let options = StrainRateOptions::default()
            .with_gauge_multiple(3)
            .with_order(2)
            .with_finite_diff(false);
        assert_eq!(options.gauge_multiple, 3);
        assert_eq!(options.order, 2);
        assert!(!options.finite_diff);
    }

    #[test]
    fn test_discrete_on_distance_rows() {
        // make_patch: distance on axis 0, value = 10 * channel + sample
        let patch = make_patch(6, 4);
        let out = velocity_to_strain_rate(&patch, 2, 1, false).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert!(out.data().iter().all(|&v| (v - 10.0).abs() < 1e-12));
        let distance = out.coord(Dimension::Distance).unwrap();
        assert_eq!(distance.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.attrs().distance_min, 1.0);
        assert_eq!(out.attrs().gauge_length, Some(2.0));
        assert_eq!(out.attrs().data_type, STRAIN_RATE);
        assert_eq!(out.attrs().data_units, "1/s");
    }

    #[test]
    fn test_finite_diff_keeps_coords() {
        let patch = make_patch(5, 3);
        let out = velocity_to_strain_rate(&patch, 1, 2, true).unwrap();
        assert_eq!(out.coords(), patch.coords());
        assert!(out.data().iter().all(|&v| (v - 10.0).abs() < 1e-9));
        assert_eq!(out.attrs().gauge_length, Some(1.0));
    }

    #[test]
    fn test_gauge_multiple_rejected_in_finite_diff_mode() {
        let patch = make_patch(5, 3);
        let err = velocity_to_strain_rate(&patch, 2, 1, true).unwrap_err();
        assert!(matches!(err, FiberError::UnsupportedParameter(_)));
    }

    #[test]
    fn test_gauge_longer_than_fiber() {
        let patch = make_patch(3, 3);
        let err = velocity_to_strain_rate(&patch, 3, 1, false).unwrap_err();
        assert!(matches!(err, FiberError::Precondition(_)));
    }
}
