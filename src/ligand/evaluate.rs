//! Conformation evaluation: forward kinematics, grid-map and pairwise
//! energies, and the analytic gradient over the pose variables.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{Ligand, ParseError};
use crate::conformation::{Change, Conformation};
use crate::grid::{GridMaps, SearchBox};
use crate::math::{axis_angle_to_quaternion, quaternion_is_normalized};
use crate::pose::Pose;
use crate::scoring::{ScoringFunction, CUTOFF_SQR};

/// Per-task scratch buffers reused across evaluator calls.
#[derive(Debug)]
pub struct Scratch {
    origin: Vec<Vector3<f64>>,
    orient_q: Vec<UnitQuaternion<f64>>,
    orient_m: Vec<Rotation3<f64>>,
    axis: Vec<Vector3<f64>>,
    force: Vec<Vector3<f64>>,
    torque: Vec<Vector3<f64>>,
    coords: Vec<Vector3<f64>>,
    derivatives: Vec<Vector3<f64>>,
    energies: Vec<f64>,
}

impl Scratch {
    pub fn new(ligand: &Ligand) -> Self {
        let nf = ligand.num_frames();
        let na = ligand.num_heavy_atoms();
        Self {
            origin: vec![Vector3::zeros(); nf],
            orient_q: vec![UnitQuaternion::identity(); nf],
            orient_m: vec![Rotation3::identity(); nf],
            axis: vec![Vector3::zeros(); nf],
            force: vec![Vector3::zeros(); nf],
            torque: vec![Vector3::zeros(); nf],
            coords: vec![Vector3::zeros(); na],
            derivatives: vec![Vector3::zeros(); na],
            energies: vec![0.0; na],
        }
    }

    /// Heavy-atom world coordinates of the last accepted evaluation.
    pub fn coordinates(&self) -> &[Vector3<f64>] {
        &self.coords
    }

    /// Per-frame orientations of the last accepted evaluation.
    pub fn orientations(&self) -> &[UnitQuaternion<f64>] {
        &self.orient_q
    }
}

impl Ligand {
    /// Evaluates a conformation against the scoring function and the grid
    /// maps, writing the gradient into `g`.
    ///
    /// Returns `None` when the pose is infeasible: the position or any heavy
    /// atom leaves the box, or the total energy reaches `e_upper_bound`.
    /// Otherwise returns `(e_total, e_inter)`.
    pub fn evaluate(
        &self,
        conf: &Conformation,
        sf: &ScoringFunction,
        b: &SearchBox,
        maps: &GridMaps,
        e_upper_bound: f64,
        s: &mut Scratch,
        g: &mut Change,
    ) -> Option<(f64, f64)> {
        if !b.within(&conf.position) {
            return None;
        }

        let num_frames = self.frames.len();

        // Forward kinematics, root first.
        let root = &self.frames[0];
        s.origin[0] = conf.position;
        s.orient_q[0] = conf.orientation;
        s.orient_m[0] = conf.orientation.to_rotation_matrix();
        for i in root.ha_begin..root.ha_end {
            s.coords[i] = s.origin[0] + s.orient_m[0] * self.heavy_atoms[i].coord;
            if !b.within(&s.coords[i]) {
                return None;
            }
        }

        let mut t = 0usize;
        for k in 1..num_frames {
            let f = &self.frames[k];
            s.origin[k] =
                s.origin[f.parent] + s.orient_m[f.parent] * f.parent_rotor_y_to_current_rotor_y;
            if !b.within(&s.origin[k]) {
                return None;
            }

            // An inactive frame contributes a single heavy atom at its origin.
            if !f.active {
                debug_assert!(f.ha_begin + 1 == f.ha_end && f.ha_begin == f.rotor_y_idx);
                s.coords[f.rotor_y_idx] = s.origin[k];
                continue;
            }

            s.axis[k] = s.orient_m[f.parent] * f.parent_rotor_x_to_current_rotor_y;
            s.orient_q[k] =
                axis_angle_to_quaternion(&s.axis[k], conf.torsions[t]) * s.orient_q[f.parent];
            t += 1;
            debug_assert!(quaternion_is_normalized(&s.orient_q[k]));
            s.orient_m[k] = s.orient_q[k].to_rotation_matrix();

            for i in f.ha_begin..f.ha_end {
                s.coords[i] = s.origin[k] + s.orient_m[k] * self.heavy_atoms[i].coord;
                if !b.within(&s.coords[i]) {
                    return None;
                }
            }
        }

        // Inter-molecular energy from the grid maps, with forward-difference
        // derivatives along each axis.
        let mut e = 0.0;
        for i in 0..self.heavy_atoms.len() {
            let map = maps.map(self.heavy_atoms[i].xs());
            let [x0, y0, z0] = b.grid_index(&s.coords[i]);
            let e000 = map.at(x0, y0, z0);
            let e100 = map.at(x0 + 1, y0, z0);
            let e010 = map.at(x0, y0 + 1, z0);
            let e001 = map.at(x0, y0, z0 + 1);
            s.energies[i] = e000;
            s.derivatives[i] =
                Vector3::new(e100 - e000, e010 - e000, e001 - e000) * b.granularity_inverse;
            e += e000;
        }
        let e_inter = e;

        // Intra-ligand pairwise energy.
        for p in &self.interacting_pairs {
            let r = s.coords[p.i2] - s.coords[p.i1];
            let r2 = r.norm_squared();
            if r2 < CUTOFF_SQR {
                let term = sf.evaluate(p.type_pair_index, r2);
                e += term.e;
                let derivative = term.dor * r;
                s.derivatives[p.i1] -= derivative;
                s.derivatives[p.i2] += derivative;
            }
        }

        if e >= e_upper_bound {
            return None;
        }

        // Aggregate forces and torques from the leaves towards the root. The
        // gradient over the pose is the negative total force, the negative
        // total torque, and per active torsion the torque projected on its
        // rotation axis.
        for k in 0..num_frames {
            s.force[k] = Vector3::zeros();
            s.torque[k] = Vector3::zeros();
        }
        let mut t = self.num_active_torsions;
        for k in (1..num_frames).rev() {
            let f = &self.frames[k];
            for i in f.ha_begin..f.ha_end {
                s.force[k] += s.derivatives[i];
                s.torque[k] += (s.coords[i] - s.origin[k]).cross(&s.derivatives[i]);
            }
            let force_k = s.force[k];
            let torque_k = s.torque[k] + (s.origin[k] - s.origin[f.parent]).cross(&force_k);
            s.force[f.parent] += force_k;
            s.torque[f.parent] += torque_k;
            if !f.active {
                continue;
            }
            t -= 1;
            g.torsions[t] = s.torque[k].dot(&s.axis[k]);
        }
        for i in root.ha_begin..root.ha_end {
            s.force[0] += s.derivatives[i];
            s.torque[0] += (s.coords[i] - s.origin[0]).cross(&s.derivatives[i]);
        }
        g.position = s.force[0];
        g.orientation = s.torque[0];

        Some((e, e_inter))
    }

    /// Runs full forward kinematics, hydrogens included, and packages the
    /// world coordinates of an accepted conformation into a pose.
    pub fn compose_result(&self, e: f64, f_inter: f64, conf: &Conformation) -> Pose {
        let num_frames = self.frames.len();
        let mut origins = vec![Vector3::zeros(); num_frames];
        let mut orientations_q = vec![UnitQuaternion::identity(); num_frames];
        let mut orientations_m = vec![Rotation3::identity(); num_frames];
        let mut heavy_atoms = vec![Vector3::zeros(); self.heavy_atoms.len()];
        let mut hydrogens = vec![Vector3::zeros(); self.hydrogens.len()];

        origins[0] = conf.position;
        orientations_q[0] = conf.orientation;
        orientations_m[0] = conf.orientation.to_rotation_matrix();

        let root = &self.frames[0];
        for i in root.ha_begin..root.ha_end {
            heavy_atoms[i] = origins[0] + orientations_m[0] * self.heavy_atoms[i].coord;
        }
        for i in root.hy_begin..root.hy_end {
            hydrogens[i] = origins[0] + orientations_m[0] * self.hydrogens[i].coord;
        }

        let mut t = 0usize;
        for k in 1..num_frames {
            let f = &self.frames[k];
            origins[k] = origins[f.parent]
                + orientations_m[f.parent] * f.parent_rotor_y_to_current_rotor_y;

            // An inactive frame still carries hydrogens, so its orientation
            // is propagated with a zero torsion angle.
            let angle = if f.active {
                let angle = conf.torsions[t];
                t += 1;
                angle
            } else {
                0.0
            };
            let axis = orientations_m[f.parent] * f.parent_rotor_x_to_current_rotor_y;
            orientations_q[k] = axis_angle_to_quaternion(&axis, angle) * orientations_q[f.parent];
            orientations_m[k] = orientations_q[k].to_rotation_matrix();

            for i in f.ha_begin..f.ha_end {
                heavy_atoms[i] = origins[k] + orientations_m[k] * self.heavy_atoms[i].coord;
            }
            for i in f.hy_begin..f.hy_end {
                hydrogens[i] = origins[k] + orientations_m[k] * self.hydrogens[i].coord;
            }
        }

        Pose {
            e,
            f: f_inter,
            heavy_atoms,
            hydrogens,
        }
    }

    /// Writes up to `num_conformations` poses to a PDBQT file, splicing the
    /// new coordinates into the preserved input lines.
    pub fn write_models(
        &self,
        path: impl AsRef<Path>,
        poses: &[Pose],
        num_conformations: usize,
    ) -> Result<(), ParseError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        for (i, pose) in poses.iter().take(num_conformations).enumerate() {
            writeln!(out, "MODEL     {:>4}", i + 1)?;
            writeln!(
                out,
                "REMARK     FREE ENERGY PREDICTED BY IDOCK:{:8.3} KCAL/MOL",
                pose.e
            )?;
            let mut heavy = 0usize;
            let mut hydrogen = 0usize;
            for line in &self.lines {
                if line.starts_with("ATOM") || line.starts_with("HETATM") {
                    // Column 78 carries the atom-type mnemonic; hydrogens are
                    // consumed from their own coordinate sequence.
                    let coord = if line.as_bytes().get(77) == Some(&b'H') {
                        hydrogen += 1;
                        &pose.hydrogens[hydrogen - 1]
                    } else {
                        heavy += 1;
                        &pose.heavy_atoms[heavy - 1]
                    };
                    writeln!(
                        out,
                        "{}{:8.3}{:8.3}{:8.3}{}",
                        &line[..30],
                        coord.x,
                        coord.y,
                        coord.z,
                        &line[54..]
                    )?;
                } else {
                    writeln!(out, "{line}")?;
                }
            }
            writeln!(out, "ENDMDL")?;
        }
        out.flush()?;
        Ok(())
    }
}
