//! Docked poses and the bounded, cluster-deduplicated pool that collects
//! them across Monte Carlo tasks.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One docked conformation in world coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pose {
    /// Total free energy (inter-molecular plus intra-ligand).
    pub e: f64,
    /// Inter-molecular free energy alone.
    pub f: f64,
    pub heavy_atoms: Vec<Vector3<f64>>,
    pub hydrogens: Vec<Vector3<f64>>,
}

/// Sum of squared heavy-atom displacements between two poses of the same
/// ligand.
fn square_error(a: &Pose, b: &Pose) -> f64 {
    debug_assert_eq!(a.heavy_atoms.len(), b.heavy_atoms.len());
    a.heavy_atoms
        .iter()
        .zip(&b.heavy_atoms)
        .map(|(p, q)| (p - q).norm_squared())
        .sum()
}

/// A fixed-capacity pool of poses, sorted by ascending energy and
/// deduplicated by heavy-atom displacement.
///
/// After any sequence of insertions no two kept poses are within
/// `required_square_error` of each other; of two clustered poses the one
/// with lower energy survives.
#[derive(Debug)]
pub struct PosePool {
    capacity: usize,
    required_square_error: f64,
    poses: Vec<Pose>,
}

impl PosePool {
    pub fn new(capacity: usize, required_square_error: f64) -> Self {
        Self {
            capacity,
            required_square_error,
            poses: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Whether the pool still accepts poses that do not beat the current
    /// best energy.
    pub fn has_room(&self) -> bool {
        self.poses.len() < self.capacity
    }

    pub fn best_energy(&self) -> Option<f64> {
        self.poses.first().map(|p| p.e)
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn into_poses(self) -> Vec<Pose> {
        self.poses
    }

    /// Offers a pose to the pool.
    ///
    /// The pose is absorbed (dropped) when it lies within
    /// `required_square_error` of a kept pose with lower or equal energy.
    /// Otherwise it is inserted at its sorted position, evicting any kept
    /// higher-energy poses of the same cluster, and the pool is truncated to
    /// capacity.
    pub fn push(&mut self, pose: Pose) {
        if self
            .poses
            .iter()
            .any(|s| s.e <= pose.e && square_error(s, &pose) < self.required_square_error)
        {
            return;
        }
        self.poses
            .retain(|s| s.e <= pose.e || square_error(s, &pose) >= self.required_square_error);
        let at = self.poses.partition_point(|s| s.e <= pose.e);
        self.poses.insert(at, pose);
        self.poses.truncate(self.capacity);
    }
}
