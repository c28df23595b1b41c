//! Math primitives shared by the kinematics and the optimizer: quaternion
//! helpers and the packed triangular symmetric matrix used by BFGS.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Tolerance within which a quaternion is still considered unit-length.
pub const QUATERNION_NORM_TOLERANCE: f64 = 1e-2;

/// Index into a packed upper-triangular symmetric matrix, requiring `x <= y`.
#[inline]
pub fn triangular_index(x: usize, y: usize) -> usize {
    debug_assert!(x <= y);
    (y * (y + 1) >> 1) + x
}

/// Permissive variant of [`triangular_index`] that orders its arguments.
#[inline]
pub fn triangular_index_permissive(x: usize, y: usize) -> usize {
    if x <= y {
        triangular_index(x, y)
    } else {
        triangular_index(y, x)
    }
}

/// Returns true if `q` lies on the unit sphere within the engine tolerance.
#[inline]
pub fn quaternion_is_normalized(q: &UnitQuaternion<f64>) -> bool {
    (q.as_ref().norm_squared() - 1.0).abs() < QUATERNION_NORM_TOLERANCE
}

/// Rotation by `angle` radians around a unit-length `axis`.
///
/// The axis must already be normalized; rotor axes carry this invariant from
/// ligand construction onwards.
#[inline]
pub fn axis_angle_to_quaternion(axis: &Vector3<f64>, angle: f64) -> UnitQuaternion<f64> {
    debug_assert!((axis.norm_squared() - 1.0).abs() < QUATERNION_NORM_TOLERANCE);
    let h = 0.5 * angle;
    let s = h.sin();
    UnitQuaternion::new_unchecked(Quaternion::new(h.cos(), s * axis.x, s * axis.y, s * axis.z))
}

/// Rotation whose axis is `v / |v|` and whose angle is `|v|` radians.
///
/// A zero vector maps to the identity rotation.
#[inline]
pub fn rotation_vector_to_quaternion(v: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*v)
}

/// A symmetric matrix stored as a packed upper triangle of `n(n+1)/2` entries.
///
/// Reads go through the permissive indexer and accept either argument order;
/// writes go through the restrictive indexer and require `i <= j`.
#[derive(Debug, Clone)]
pub struct TriangularMatrix {
    n: usize,
    data: Vec<f64>,
}

impl TriangularMatrix {
    /// Creates an `n` by `n` symmetric matrix filled with `value`.
    pub fn new(n: usize, value: f64) -> Self {
        Self {
            n,
            data: vec![value; n * (n + 1) / 2],
        }
    }

    /// Creates the `n` by `n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, 0.0);
        for i in 0..n {
            m.data[triangular_index(i, i)] = 1.0;
        }
        m
    }

    /// Resets the matrix to the identity in place.
    pub fn reset_identity(&mut self) {
        self.data.fill(0.0);
        for i in 0..self.n {
            self.data[triangular_index(i, i)] = 1.0;
        }
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[triangular_index_permissive(i, j)]
    }

    /// Mutable access to entry `(i, j)` with `i <= j`.
    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        &mut self.data[triangular_index(i, j)]
    }
}
