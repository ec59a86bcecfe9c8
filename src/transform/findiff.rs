//! Finite-difference derivative operators on 2-D arrays

use crate::error::{FiberError, Result};
use ndarray::{Array2, ArrayView1, Axis, Zip};
use num_traits::Float;

fn cast<F: Float>(n: usize) -> F {
    F::from(n).unwrap_or_else(F::nan)
}

/// Fornberg weights for the `derivative`-th derivative at `x0` over `nodes`
///
/// The nodes need not be evenly spaced or sorted, only distinct.
pub fn fornberg_weights<F: Float>(derivative: usize, x0: F, nodes: &[F]) -> Vec<F> {
    let n_nodes = nodes.len();
    if n_nodes == 0 {
        return Vec::new();
    }
    // c[n][nu][m]: weight of node nu using the first n + 1 nodes, derivative m
    let mut c = vec![vec![vec![F::zero(); derivative + 1]; n_nodes]; n_nodes];
    c[0][0][0] = F::one();
    let mut c1 = F::one();

    for n in 1..n_nodes {
        let mut c2 = F::one();
        let top = n.min(derivative);
        for nu in 0..n {
            let c3 = nodes[n] - nodes[nu];
            c2 = c2 * c3;
            for m in 0..=top {
                let lower = if m > 0 {
                    cast::<F>(m) * c[n - 1][nu][m - 1]
                } else {
                    F::zero()
                };
                c[n][nu][m] = ((nodes[n] - x0) * c[n - 1][nu][m] - lower) / c3;
            }
        }
        for m in 0..=top {
            let lower = if m > 0 {
                cast::<F>(m) * c[n - 1][n - 1][m - 1]
            } else {
                F::zero()
            };
            c[n][n][m] = c1 / c2 * (lower - (nodes[n - 1] - x0) * c[n - 1][n - 1][m]);
        }
        c1 = c2;
    }

    (0..n_nodes).map(|nu| c[n_nodes - 1][nu][derivative]).collect()
}

/// Integer offsets and their weights on a unit grid
#[derive(Debug, Clone, PartialEq)]
pub struct Stencil {
    pub offsets: Vec<isize>,
    pub weights: Vec<f64>,
}

impl Stencil {
    /// Stencil over `offsets` for the given derivative at offset zero
    pub fn new(derivative: usize, offsets: Vec<isize>) -> Self {
        let nodes: Vec<f64> = offsets.iter().map(|&o| o as f64).collect();
        let weights = fornberg_weights(derivative, 0.0, &nodes);
        Self { offsets, weights }
    }

    fn apply(&self, lane: &ArrayView1<'_, f64>, index: usize) -> f64 {
        self.offsets
            .iter()
            .zip(&self.weights)
            .map(|(&offset, &weight)| weight * lane[(index as isize + offset) as usize])
            .sum()
    }
}

/// Derivative operator along one array axis
///
/// Interior points use a centered stencil; the edges fall back to forward
/// and backward stencils of `derivative + accuracy` points.
#[derive(Debug, Clone)]
pub struct FinDiff {
    axis: usize,
    step: f64,
    derivative: usize,
    accuracy: usize,
    central: Stencil,
    forward: Stencil,
    backward: Stencil,
}

impl FinDiff {
    /// `derivative`-th derivative along `axis` with sample spacing `step`
    pub fn new(axis: usize, step: f64, derivative: usize) -> Result<Self> {
        Self::with_accuracy(axis, step, derivative, 2)
    }

    /// Same as [`FinDiff::new`] with an explicit accuracy order
    pub fn with_accuracy(
        axis: usize,
        step: f64,
        derivative: usize,
        accuracy: usize,
    ) -> Result<Self> {
        if derivative == 0 || accuracy == 0 {
            return Err(FiberError::UnsupportedParameter(format!(
                "derivative ({}) and accuracy ({}) must be positive",
                derivative, accuracy
            )));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(FiberError::UnsupportedParameter(format!(
                "step {} must be a positive number",
                step
            )));
        }

        let even_accuracy = accuracy + accuracy % 2;
        let central_points = 2 * ((derivative + 1) / 2) - 1 + even_accuracy;
        let half = (central_points / 2) as isize;
        let side_points = (derivative + accuracy) as isize;

        Ok(Self {
            axis,
            step,
            derivative,
            accuracy,
            central: Stencil::new(derivative, (-half..=half).collect()),
            forward: Stencil::new(derivative, (0..side_points).collect()),
            backward: Stencil::new(derivative, (1 - side_points..=0).collect()),
        })
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn accuracy(&self) -> usize {
        self.accuracy
    }

    /// Smallest axis length the operator can differentiate
    pub fn min_len(&self) -> usize {
        let half = self.half();
        (2 * half + 1).max(half + self.forward.offsets.len() - 1)
    }

    fn half(&self) -> usize {
        self.central.offsets.len() / 2
    }

    /// Apply the operator, returning an array of the same shape
    pub fn apply(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if self.axis > 1 {
            return Err(FiberError::InvalidDimensions(format!(
                "axis {} does not exist on a 2-D array",
                self.axis
            )));
        }
        let len = data.len_of(Axis(self.axis));
        if len < self.min_len() {
            return Err(FiberError::InvalidDimensions(format!(
                "{} samples along axis {} are too few for a derivative of order {} \
                 with accuracy {} (need {})",
                len,
                self.axis,
                self.derivative,
                self.accuracy,
                self.min_len()
            )));
        }

        let half = self.half();
        let scale = self.step.powi(self.derivative as i32);
        let mut out = Array2::zeros(data.raw_dim());

        Zip::from(out.lanes_mut(Axis(self.axis)))
            .and(data.lanes(Axis(self.axis)))
            .for_each(|mut target, lane| {
                for i in 0..len {
                    let stencil = if i < half {
                        &self.forward
                    } else if i + half >= len {
                        &self.backward
                    } else {
                        &self.central
                    };
                    target[i] = stencil.apply(&lane, i) / scale;
                }
            });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_fornberg_known_weights() {
        assert_close(&fornberg_weights(1, 0.0, &[-1.0, 0.0, 1.0]), &[-0.5, 0.0, 0.5]);
        assert_close(&fornberg_weights(2, 0.0, &[-1.0, 0.0, 1.0]), &[1.0, -2.0, 1.0]);
        assert_close(&fornberg_weights(1, 0.0, &[0.0, 1.0]), &[-1.0, 1.0]);
        assert_close(
            &fornberg_weights(1, 0.0, &[0.0, 1.0, 2.0]),
            &[-1.5, 2.0, -0.5],
        );
        assert_close(
            &fornberg_weights(1, 0.0, &[-2.0, -1.0, 0.0, 1.0, 2.0]),
            &[1.0 / 12.0, -2.0 / 3.0, 0.0, 2.0 / 3.0, -1.0 / 12.0],
        );
    }

    #[test]
    fn test_stencil_sizes() {
        let op = FinDiff::with_accuracy(0, 1.0, 1, 1).unwrap();
        assert_eq!(op.central.offsets, vec![-1, 0, 1]);
        assert_eq!(op.forward.offsets, vec![0, 1]);
        assert_eq!(op.backward.offsets, vec![-1, 0]);
        assert_eq!(op.min_len(), 3);

        let op = FinDiff::with_accuracy(0, 1.0, 1, 4).unwrap();
        assert_eq!(op.central.offsets.len(), 5);
        assert_eq!(op.forward.offsets.len(), 5);
        assert_eq!(op.min_len(), 6);
    }

    #[test]
    fn test_linear_derivative_is_exact() {
        let x = Array1::from_iter((0..8).map(|i| i as f64 * 0.5));
        let row = x.mapv(|v| 3.0 * v + 1.0);
        let data = ndarray::stack![Axis(0), row, row.mapv(|v| 2.0 * v)];
        let out = FinDiff::new(1, 0.5, 1).unwrap().apply(&data).unwrap();
        assert_close(out.row(0).as_slice().unwrap(), &[3.0; 8]);
        assert_close(out.row(1).as_slice().unwrap(), &[6.0; 8]);
    }

    #[test]
    fn test_quadratic_along_axis_zero() {
        let data = Array2::from_shape_fn((6, 2), |(i, _)| (i as f64).powi(2));
        let out = FinDiff::with_accuracy(0, 1.0, 1, 2).unwrap().apply(&data).unwrap();
        let expected: Vec<f64> = (0..6).map(|i| 2.0 * i as f64).collect();
        assert_close(&out.column(0).to_vec(), &expected);
        assert_close(&out.column(1).to_vec(), &expected);
    }

    #[test]
    fn test_rejects_short_axis_and_bad_params() {
        let data = Array2::zeros((2, 10));
        assert!(FinDiff::new(0, 1.0, 1).unwrap().apply(&data).is_err());
        assert!(FinDiff::new(2, 1.0, 1).unwrap().apply(&data).is_err());
        assert!(FinDiff::new(0, 0.0, 1).is_err());
        assert!(FinDiff::with_accuracy(0, 1.0, 1, 0).is_err());
    }
}
