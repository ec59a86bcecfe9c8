//! In-memory patches of DAS samples and the spools that hold them

use crate::error::{FiberError, Result};
use crate::layout::{LayoutWindow, StreamLayout};
use crate::metadata::PatchAttrs;
use crate::types::Dimension;
use crate::utils::min_max;
use crate::window::{resolve_window, ReadWindow};
use ndarray::{s, Array1, Array2};
use std::collections::BTreeMap;
use std::ops::Index;

/// Coordinate arrays keyed by dimension
pub type Coords = BTreeMap<Dimension, Array1<f64>>;

/// A block of samples with coordinates and metadata
///
/// A patch is immutable once built. Its `time_*` and `distance_*` bounds are
/// always the extremes of the matching coordinate arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    data: Array2<f64>,
    dims: [Dimension; 2],
    coords: Coords,
    attrs: PatchAttrs,
}

impl Patch {
    /// Create a patch, checking coordinates against the array shape
    pub fn new(
        data: Array2<f64>,
        dims: [Dimension; 2],
        coords: Coords,
        mut attrs: PatchAttrs,
    ) -> Result<Self> {
        if dims[0] == dims[1] {
            return Err(FiberError::InvalidDimensions(format!(
                "dimension '{}' appears twice",
                dims[0]
            )));
        }
        if coords.len() != 2 {
            return Err(FiberError::InvalidDimensions(format!(
                "expected coordinates for {} and {}, got {} arrays",
                dims[0],
                dims[1],
                coords.len()
            )));
        }
        for (axis, dim) in dims.iter().enumerate() {
            let coord = coords.get(dim).ok_or_else(|| {
                FiberError::InvalidDimensions(format!("no coordinates for '{}'", dim))
            })?;
            let size = data.shape()[axis];
            if coord.len() != size {
                return Err(FiberError::InvalidDimensions(format!(
                    "'{}' has {} coordinates but axis {} has {} samples",
                    dim,
                    coord.len(),
                    axis,
                    size
                )));
            }
            if size == 0 {
                return Err(FiberError::InvalidDimensions(format!(
                    "'{}' axis is empty",
                    dim
                )));
            }
        }

        if let Some((lo, hi)) = coords
            .get(&Dimension::Time)
            .and_then(|c| min_max(c.iter().copied()))
        {
            attrs.time_min = lo;
            attrs.time_max = hi;
        }
        if let Some((lo, hi)) = coords
            .get(&Dimension::Distance)
            .and_then(|c| min_max(c.iter().copied()))
        {
            attrs.distance_min = lo;
            attrs.distance_max = hi;
        }

        Ok(Self {
            data,
            dims,
            coords,
            attrs,
        })
    }

    /// Build a patch from the windowed block of a stream
    ///
    /// `data` must already be cut to `window`; sampling intervals and units
    /// come from the layout axes.
    pub fn from_layout(
        layout: &StreamLayout,
        window: &LayoutWindow,
        data: Array2<f64>,
        mut attrs: PatchAttrs,
    ) -> Result<Self> {
        let ranges = [window.rows.clone(), window.cols.clone()];
        let mut coords = Coords::new();
        for ((dim, axis), range) in layout.dims.iter().zip(layout.axes.iter()).zip(ranges) {
            coords.insert(*dim, range.map(|i| axis.index_to_coord(i)).collect());
            let units = (!axis.units.is_empty()).then(|| axis.units.clone());
            match dim {
                Dimension::Time => {
                    attrs.d_time = axis.step;
                    if let Some(units) = units {
                        attrs.time_units = units;
                    }
                }
                Dimension::Distance => {
                    attrs.d_distance = axis.step;
                    if let Some(units) = units {
                        attrs.distance_units = units;
                    }
                }
                Dimension::Frequency => {}
            }
        }
        Self::new(data, layout.dims, coords, attrs)
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn dims(&self) -> &[Dimension; 2] {
        &self.dims
    }

    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    /// Coordinate array for `dim`
    pub fn coord(&self, dim: Dimension) -> Option<&Array1<f64>> {
        self.coords.get(&dim)
    }

    pub fn attrs(&self) -> &PatchAttrs {
        &self.attrs
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Array axis holding `dim`
    pub fn axis_of(&self, dim: Dimension) -> Option<usize> {
        self.dims.iter().position(|&d| d == dim)
    }

    pub fn has_dim(&self, dim: Dimension) -> bool {
        self.axis_of(dim).is_some()
    }

    /// Cut the patch to the closed coordinate intervals in `window`
    ///
    /// Uses the same inclusive rule as the file readers. Fails with
    /// `OutOfRange` when a requested interval keeps no sample.
    pub fn select(&self, window: &ReadWindow) -> Result<Patch> {
        let mut ranges = Vec::with_capacity(2);
        let mut coords = Coords::new();
        for dim in self.dims {
            let coord = &self.coords[&dim];
            let range = resolve_window(dim, coord.view(), window.range(dim))?;
            coords.insert(dim, coord.slice(s![range.clone()]).to_owned());
            ranges.push(range);
        }
        let data = self
            .data
            .slice(s![ranges[0].clone(), ranges[1].clone()])
            .to_owned();
        Patch::new(data, self.dims, coords, self.attrs.clone())
    }

    /// Split into data, dims, coordinates and attributes
    pub fn into_parts(self) -> (Array2<f64>, [Dimension; 2], Coords, PatchAttrs) {
        (self.data, self.dims, self.coords, self.attrs)
    }
}

/// Ordered patches produced by a single read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spool {
    patches: Vec<Patch>,
}

impl Spool {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self { patches }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Patch> {
        self.patches.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }

    pub fn into_vec(self) -> Vec<Patch> {
        self.patches
    }
}

impl Index<usize> for Spool {
    type Output = Patch;

    fn index(&self, index: usize) -> &Patch {
        &self.patches[index]
    }
}

impl From<Vec<Patch>> for Spool {
    fn from(patches: Vec<Patch>) -> Self {
        Self::new(patches)
    }
}

impl From<Patch> for Spool {
    fn from(patch: Patch) -> Self {
        Self::new(vec![patch])
    }
}

impl FromIterator<Patch> for Spool {
    fn from_iter<I: IntoIterator<Item = Patch>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Spool {
    type Item = Patch;
    type IntoIter = std::vec::IntoIter<Patch>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.into_iter()
    }
}

impl<'a> IntoIterator for &'a Spool {
    type Item = &'a Patch;
    type IntoIter = std::slice::Iter<'a, Patch>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}
