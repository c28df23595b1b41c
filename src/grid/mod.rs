//! The search box and the per-atom-type receptor grid maps.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atom::XsType;

/// Errors raised when constructing a search box.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("box granularity must be positive, got {0}")]
    InvalidGranularity(f64),

    #[error("box size must be positive in every dimension, got {0:?}")]
    InvalidSize(Vector3<f64>),
}

/// The rectangular search region, discretized into cubic cells.
///
/// The box is half open: a coordinate is inside iff
/// `corner0[d] <= c[d] < corner1[d]` for every dimension. Corners are snapped
/// outward so that `corner1 = corner0 + num_grids * granularity` exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBox {
    pub corner0: Vector3<f64>,
    pub corner1: Vector3<f64>,
    pub granularity: f64,
    pub granularity_inverse: f64,
    pub num_grids: [usize; 3],
}

impl SearchBox {
    /// Builds a box centered on `center` covering at least `size` in every
    /// dimension.
    pub fn new(
        center: Vector3<f64>,
        size: Vector3<f64>,
        granularity: f64,
    ) -> Result<Self, GridError> {
        if !(granularity > 0.0) {
            return Err(GridError::InvalidGranularity(granularity));
        }
        if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) {
            return Err(GridError::InvalidSize(size));
        }
        let mut num_grids = [0usize; 3];
        let mut corner0 = Vector3::zeros();
        let mut corner1 = Vector3::zeros();
        for d in 0..3 {
            num_grids[d] = (size[d] / granularity).ceil() as usize;
            let span = num_grids[d] as f64 * granularity;
            corner0[d] = center[d] - 0.5 * span;
            corner1[d] = corner0[d] + span;
        }
        Ok(Self {
            corner0,
            corner1,
            granularity,
            granularity_inverse: 1.0 / granularity,
            num_grids,
        })
    }

    /// Returns true if `coord` lies within the half-open box.
    #[inline]
    pub fn within(&self, coord: &Vector3<f64>) -> bool {
        (0..3).all(|d| self.corner0[d] <= coord[d] && coord[d] < self.corner1[d])
    }

    /// The integer index of the cell containing `coord`, which must be within
    /// the box.
    #[inline]
    pub fn grid_index(&self, coord: &Vector3<f64>) -> [usize; 3] {
        debug_assert!(self.within(coord));
        let mut index = [0usize; 3];
        for d in 0..3 {
            index[d] = ((coord[d] - self.corner0[d]) * self.granularity_inverse).floor() as usize;
        }
        index
    }

    /// World coordinate of the grid corner with integer index `(x, y, z)`.
    #[inline]
    pub fn corner_coord(&self, x: usize, y: usize, z: usize) -> Vector3<f64> {
        self.corner0
            + Vector3::new(
                x as f64 * self.granularity,
                y as f64 * self.granularity,
                z as f64 * self.granularity,
            )
    }
}

/// A scalar field sampled at the grid corners of a [`SearchBox`], so each
/// dimension holds `num_grids + 1` samples. X is the fastest dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridMap {
    dims: [usize; 3],
    data: Vec<f64>,
}

impl GridMap {
    /// A map of zeros over the corners of `b`.
    pub fn zeroed(b: &SearchBox) -> Self {
        let dims = [
            b.num_grids[0] + 1,
            b.num_grids[1] + 1,
            b.num_grids[2] + 1,
        ];
        Self {
            dims,
            data: vec![0.0; dims[0] * dims[1] * dims[2]],
        }
    }

    /// A map whose value at every grid corner is `f(corner coordinate)`.
    pub fn from_fn<F: Fn(&Vector3<f64>) -> f64>(b: &SearchBox, f: F) -> Self {
        let mut map = Self::zeroed(b);
        for z in 0..map.dims[2] {
            for y in 0..map.dims[1] {
                for x in 0..map.dims[0] {
                    let coord = b.corner_coord(x, y, z);
                    let i = map.flat_index(x, y, z);
                    map.data[i] = f(&coord);
                }
            }
        }
        map
    }

    /// True for a default-constructed placeholder with no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn flat_index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.dims[0] && y < self.dims[1] && z < self.dims[2]);
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    /// Sample at integer corner index `(x, y, z)`.
    #[inline]
    pub fn at(&self, x: usize, y: usize, z: usize) -> f64 {
        self.data[self.flat_index(x, y, z)]
    }
}

/// One grid map per XScore atom type. Types the ligand does not contain stay
/// empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMaps {
    maps: Vec<GridMap>,
}

impl GridMaps {
    /// A container of empty placeholder maps.
    pub fn new() -> Self {
        Self {
            maps: vec![GridMap::default(); XsType::COUNT],
        }
    }

    /// Zero-valued maps for each type in `types` over the corners of `b`.
    pub fn zeroed(b: &SearchBox, types: &[XsType]) -> Self {
        let mut maps = Self::new();
        for &t in types {
            maps.insert(t, GridMap::zeroed(b));
        }
        maps
    }

    pub fn insert(&mut self, t: XsType, map: GridMap) {
        self.maps[t.as_index()] = map;
    }

    /// The map for atom type `t`, which must have been populated.
    #[inline]
    pub fn map(&self, t: XsType) -> &GridMap {
        let map = &self.maps[t.as_index()];
        debug_assert!(!map.is_empty(), "grid map for {t:?} was never populated");
        map
    }

    /// Whether the map for `t` has been populated.
    pub fn contains(&self, t: XsType) -> bool {
        !self.maps[t.as_index()].is_empty()
    }
}

impl Default for GridMaps {
    fn default() -> Self {
        Self::new()
    }
}
