//! Stream data layout - how a 2-D sample block is laid out on disk

use crate::error::{FiberError, Result};
use crate::types::{AxisDescriptor, Dimension, SampleType};
use crate::window::{resolve_axis_window, ReadWindow};
use std::ops::Range;

/// Layout of one stream: axis order, axis sampling and sample encoding
///
/// Samples are stored row-major: `dims[0]` indexes rows and `dims[1]`
/// indexes the samples inside a row.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLayout {
    pub dims: [Dimension; 2],
    /// Axis descriptors aligned with `dims`
    pub axes: [AxisDescriptor; 2],
    pub sample_type: SampleType,
}

/// Sample index ranges selected on each axis of a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutWindow {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl LayoutWindow {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }
}

impl StreamLayout {
    /// Create a new stream layout
    pub fn new(
        dims: [Dimension; 2],
        axes: [AxisDescriptor; 2],
        sample_type: SampleType,
    ) -> Result<Self> {
        if dims[0] == dims[1] {
            return Err(FiberError::InvalidDimensions(format!(
                "dimension '{}' appears twice",
                dims[0]
            )));
        }
        for (dim, axis) in dims.iter().zip(axes.iter()) {
            if !axis.is_valid() {
                return Err(FiberError::InvalidFormat(format!(
                    "{} axis needs at least one sample and a positive step (count {}, step {})",
                    dim, axis.num_samples, axis.step
                )));
            }
        }
        let layout = Self {
            dims,
            axes,
            sample_type,
        };
        layout.total_size_bytes()?;
        Ok(layout)
    }

    /// Position of `dim` in the row-major order
    pub fn position(&self, dim: Dimension) -> Option<usize> {
        self.dims.iter().position(|&d| d == dim)
    }

    /// Axis descriptor for `dim`
    pub fn axis(&self, dim: Dimension) -> Option<&AxisDescriptor> {
        self.position(dim).map(|i| &self.axes[i])
    }

    /// Number of samples in each dimension
    pub fn shape(&self) -> (usize, usize) {
        (self.axes[0].num_samples, self.axes[1].num_samples)
    }

    /// Bytes in a single row
    pub fn row_size_bytes(&self) -> Result<usize> {
        self.axes[1]
            .num_samples
            .checked_mul(self.sample_type.size_in_bytes())
            .ok_or_else(|| self.too_large())
    }

    /// Total size of the sample block in bytes (uncompressed)
    pub fn total_size_bytes(&self) -> Result<usize> {
        self.axes[0]
            .num_samples
            .checked_mul(self.row_size_bytes()?)
            .ok_or_else(|| self.too_large())
    }

    /// Byte offset of a sample relative to the start of the block
    pub fn sample_offset(&self, row: usize, col: usize) -> Result<u64> {
        let offset = row
            .checked_mul(self.row_size_bytes()?)
            .and_then(|o| o.checked_add(col.checked_mul(self.sample_type.size_in_bytes())?))
            .ok_or_else(|| self.too_large())?;
        Ok(offset as u64)
    }

    fn too_large(&self) -> FiberError {
        FiberError::InvalidFormat(format!(
            "layout {} does not fit in memory",
            self.summary()
        ))
    }

    /// Translate coordinate limits into row and column index ranges
    pub fn window(&self, window: &ReadWindow) -> Result<LayoutWindow> {
        let rows = resolve_axis_window(self.dims[0], &self.axes[0], window.range(self.dims[0]))?;
        let cols = resolve_axis_window(self.dims[1], &self.axes[1], window.range(self.dims[1]))?;
        Ok(LayoutWindow { rows, cols })
    }

    /// Get a summary string of the layout
    pub fn summary(&self) -> String {
        format!(
            "({} x {}) = ({} x {}) {}",
            self.dims[0],
            self.dims[1],
            self.axes[0].num_samples,
            self.axes[1].num_samples,
            self.sample_type,
        )
    }
}
