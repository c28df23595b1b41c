//! Pose variables and their energy gradient.

use nalgebra::{UnitQuaternion, Vector3};
use std::ops::{Index, IndexMut};

/// A ligand pose: the root position, the root orientation, and one angle per
/// active torsion. Torsion angles are unrestricted; the trigonometry of the
/// axis-angle composition absorbs wrap-around.
#[derive(Debug, Clone)]
pub struct Conformation {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub torsions: Vec<f64>,
}

impl Conformation {
    pub fn new(num_active_torsions: usize) -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            torsions: vec![0.0; num_active_torsions],
        }
    }

    /// Copies `other` into `self` without reallocating the torsion buffer.
    pub fn copy_from(&mut self, other: &Conformation) {
        self.position = other.position;
        self.orientation = other.orientation;
        self.torsions.copy_from_slice(&other.torsions);
    }
}

/// The gradient of the energy with respect to the pose variables: a force on
/// the position, an axial torque on the orientation, and one torque
/// projection per active torsion.
///
/// The flat index layout is `[0..3] = position`, `[3..6] = orientation`,
/// `[6..] = torsions`, so the optimizer can treat the gradient as a plain
/// vector of length `6 + num_active_torsions`.
#[derive(Debug, Clone)]
pub struct Change {
    pub position: Vector3<f64>,
    pub orientation: Vector3<f64>,
    pub torsions: Vec<f64>,
}

impl Change {
    pub fn new(num_active_torsions: usize) -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: Vector3::zeros(),
            torsions: vec![0.0; num_active_torsions],
        }
    }

    /// Total number of variables.
    pub fn len(&self) -> usize {
        6 + self.torsions.len()
    }

    /// Copies `other` into `self` without reallocating the torsion buffer.
    pub fn copy_from(&mut self, other: &Change) {
        self.position = other.position;
        self.orientation = other.orientation;
        self.torsions.copy_from_slice(&other.torsions);
    }
}

impl Index<usize> for Change {
    type Output = f64;

    #[inline]
    fn index(&self, i: usize) -> &f64 {
        match i {
            0..=2 => &self.position[i],
            3..=5 => &self.orientation[i - 3],
            _ => &self.torsions[i - 6],
        }
    }
}

impl IndexMut<usize> for Change {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        match i {
            0..=2 => &mut self.position[i],
            3..=5 => &mut self.orientation[i - 3],
            _ => &mut self.torsions[i - 6],
        }
    }
}
