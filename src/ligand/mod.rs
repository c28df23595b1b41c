//! The ligand kinematic model: a tree of rigid frames joined by rotatable
//! bonds, parsed from a PDBQT file, with the derived intra-ligand topology.

mod evaluate;

pub use evaluate::Scratch;

use log::debug;
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::atom::{AdType, Atom, XsType};
use crate::scoring::ScoringFunction;

/// Errors raised while reading a molecular input file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}:{line}: {message}", .path.display())]
    Line {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl ParseError {
    pub(crate) fn at(path: &Path, line: usize, message: impl Into<String>) -> Self {
        ParseError::Line {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Extracts the trimmed text of the 1-based inclusive column range `[lo, hi]`.
pub(crate) fn column(line: &str, lo: usize, hi: usize) -> &str {
    line.get(lo - 1..hi.min(line.len())).unwrap_or("").trim()
}

/// Parses the column range `[lo, hi]` into `T`, reporting `what` on failure.
pub(crate) fn parse_column<T: FromStr>(
    path: &Path,
    line_number: usize,
    line: &str,
    lo: usize,
    hi: usize,
    what: &str,
) -> Result<T, ParseError> {
    let text = column(line, lo, hi);
    text.parse()
        .map_err(|_| ParseError::at(path, line_number, format!("invalid {what}: {text:?}")))
}

/// Parses an ATOM/HETATM record into an atom and its serial number.
pub(crate) fn parse_atom_record(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<(Atom, usize), ParseError> {
    let type_str = column(line, 78, 79);
    let ad = AdType::from_pdbqt_str(type_str).ok_or_else(|| {
        ParseError::at(
            path,
            line_number,
            format!("atom type {type_str:?} is not supported"),
        )
    })?;
    let x = parse_column(path, line_number, line, 31, 38, "x coordinate")?;
    let y = parse_column(path, line_number, line, 39, 46, "y coordinate")?;
    let z = parse_column(path, line_number, line, 47, 54, "z coordinate")?;
    let serial = parse_column(path, line_number, line, 7, 11, "atom serial number")?;
    Ok((Atom::new(ad, Vector3::new(x, y, z)), serial))
}

/// A rigid-body node of the ligand kinematic tree: the ROOT or one BRANCH.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Index of the parent frame; the root points to itself.
    pub parent: usize,
    /// Heavy-atom index of the parent-side atom of the rotatable bond.
    /// Unused for the root.
    pub rotor_x_idx: usize,
    /// Heavy-atom index of the child-side atom, which is the origin of this
    /// frame. The root assumes its first heavy atom.
    pub rotor_y_idx: usize,
    /// Half-open range into the heavy-atom vector owned by this frame.
    pub ha_begin: usize,
    pub ha_end: usize,
    /// Half-open range into the hydrogen vector owned by this frame.
    pub hy_begin: usize,
    pub hy_end: usize,
    /// False when the torsion is degenerate (a terminal rotor Y carrying only
    /// hydrogens) and is therefore not optimized.
    pub active: bool,
    /// Vector from the parent origin to this frame's origin, in parent-local
    /// coordinates.
    pub parent_rotor_y_to_current_rotor_y: Vector3<f64>,
    /// Unit-length rotor axis direction in parent-local coordinates.
    pub parent_rotor_x_to_current_rotor_y: Vector3<f64>,
}

impl Frame {
    fn new(parent: usize, rotor_x_idx: usize, ha_begin: usize, hy_begin: usize) -> Self {
        Self {
            parent,
            rotor_x_idx,
            rotor_y_idx: 0,
            ha_begin,
            ha_end: 0,
            hy_begin,
            hy_end: 0,
            active: true,
            parent_rotor_y_to_current_rotor_y: Vector3::zeros(),
            parent_rotor_x_to_current_rotor_y: Vector3::zeros(),
        }
    }
}

/// A pair of heavy atoms in different frames, at least four covalent bonds
/// apart, whose interaction contributes to the intra-ligand energy.
#[derive(Debug, Clone, Copy)]
pub struct InteractingPair {
    pub i1: usize,
    pub i2: usize,
    /// Precomputed triangular index of the XScore type pair.
    pub type_pair_index: usize,
}

/// A parsed ligand. Immutable after construction.
///
/// Heavy atoms and hydrogens are partitioned by frame, in frame order, and
/// their coordinates are relative to the origin (rotor Y) of their owning
/// frame.
#[derive(Debug, Clone)]
pub struct Ligand {
    /// Input lines preserved for re-emission with substituted coordinates.
    pub lines: Vec<String>,
    /// ROOT and BRANCH frames; frame 0 is the root and parents precede
    /// children.
    pub frames: Vec<Frame>,
    pub heavy_atoms: Vec<Atom>,
    pub hydrogens: Vec<Atom>,
    /// Non 1-4 interacting pairs.
    pub interacting_pairs: Vec<InteractingPair>,
    pub num_active_torsions: usize,
    /// Penalty factor `1 / (1 + 0.05846 (n_active + 0.5 n_inactive))` used by
    /// downstream rescoring.
    pub flexibility_penalty_factor: f64,
}

impl Ligand {
    /// Parses a ligand from a PDBQT file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(path, BufReader::new(file))
    }

    /// Parses a ligand from any line source; `path` is used for error
    /// reporting only.
    pub fn from_reader<R: BufRead>(path: impl AsRef<Path>, reader: R) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let mut lines: Vec<String> = Vec::new();
        let mut frames = vec![Frame::new(0, 0, 0, 0)];
        let mut heavy_atoms: Vec<Atom> = Vec::new();
        let mut hydrogens: Vec<Atom> = Vec::new();
        let mut serials: Vec<usize> = Vec::new();
        let mut current = 0usize;
        let mut num_active_torsions = 0usize;
        let mut line_number = 0usize;

        for line in reader.lines() {
            let line = line?;
            line_number += 1;
            if line.starts_with("ATOM") || line.starts_with("HETATM") {
                // Atom records always belong to the most recently opened frame.
                debug_assert_eq!(current, frames.len() - 1);
                let (atom, serial) = parse_atom_record(path, line_number, &line)?;
                lines.push(line);
                if atom.is_hydrogen() {
                    // A polar hydrogen turns its bonded hetero atom into a
                    // hydrogen bond donor.
                    if atom.ad == AdType::PolarHydrogen {
                        for i in (frames[current].ha_begin..heavy_atoms.len()).rev() {
                            let b = &mut heavy_atoms[i];
                            if !b.is_hetero() {
                                continue;
                            }
                            if atom.is_neighbor(b) {
                                b.donorize();
                                break;
                            }
                        }
                    }
                    hydrogens.push(atom);
                } else {
                    heavy_atoms.push(atom);
                    serials.push(serial);
                }
            } else if line.starts_with("BRANCH") {
                let x: usize = parse_column(path, line_number, &line, 7, 10, "rotor X serial")?;
                let f = &frames[current];
                let rotor_x_idx = (f.ha_begin..heavy_atoms.len())
                    .find(|&i| serials[i] == x)
                    .ok_or_else(|| {
                        ParseError::at(
                            path,
                            line_number,
                            format!("BRANCH rotor X serial {x} not found in the current frame"),
                        )
                    })?;
                frames.push(Frame::new(
                    current,
                    rotor_x_idx,
                    heavy_atoms.len(),
                    hydrogens.len(),
                ));
                current = frames.len() - 1;
                // The new frame's begin indices close the atom runs of the
                // frame written just before it.
                frames[current - 1].ha_end = heavy_atoms.len();
                frames[current - 1].hy_end = hydrogens.len();
                lines.push(line);
            } else if line.starts_with("ENDBRANCH") {
                if current == 0 {
                    return Err(ParseError::at(path, line_number, "unmatched ENDBRANCH"));
                }
                if frames[current].ha_begin == heavy_atoms.len() {
                    return Err(ParseError::at(
                        path,
                        line_number,
                        "an empty BRANCH was detected, indicating an invalid ligand structure",
                    ));
                }
                let y: usize = parse_column(path, line_number, &line, 14, 17, "rotor Y serial")?;
                let rotor_y_idx = (frames[current].ha_begin..heavy_atoms.len())
                    .find(|&i| serials[i] == y)
                    .ok_or_else(|| {
                        ParseError::at(
                            path,
                            line_number,
                            format!("ENDBRANCH rotor Y serial {y} not found in the current frame"),
                        )
                    })?;
                frames[current].rotor_y_idx = rotor_y_idx;
                // A leaf frame holding nothing but its rotor Y (plus
                // hydrogens, e.g. a hydroxyl) has no effect on scoring.
                if current == frames.len() - 1
                    && frames[current].ha_begin + 1 == heavy_atoms.len()
                {
                    frames[current].active = false;
                } else {
                    num_active_torsions += 1;
                }
                current = frames[current].parent;
                lines.push(line);
            } else if line.starts_with("ROOT")
                || line.starts_with("ENDROOT")
                || line.starts_with("TORSDOF")
            {
                lines.push(line);
            }
            // Other records (REMARK, TER, ...) are dropped.
        }

        if current != 0 {
            return Err(ParseError::at(path, line_number, "unmatched BRANCH"));
        }
        if heavy_atoms.is_empty() {
            return Err(ParseError::at(path, line_number, "no heavy atoms found"));
        }
        let last = frames.len() - 1;
        frames[last].ha_end = heavy_atoms.len();
        frames[last].hy_end = hydrogens.len();

        let num_frames = frames.len();
        let num_torsions = num_frames - 1;
        debug_assert!(num_active_torsions <= num_torsions);
        // Parents always precede their children in the frame vector.
        debug_assert!(frames.iter().enumerate().skip(1).all(|(k, f)| f.parent < k));
        let flexibility_penalty_factor = 1.0
            / (1.0
                + 0.05846
                    * (num_active_torsions as f64
                        + 0.5 * (num_torsions - num_active_torsions) as f64));

        // A carbon covalently bonded to a hetero atom is no longer
        // hydrophobic, both within a frame and across each joint.
        for k in 0..num_frames {
            let f = frames[k].clone();
            for i in f.ha_begin..f.ha_end {
                let a = heavy_atoms[i];
                if !a.is_hetero() {
                    continue;
                }
                for j in f.ha_begin..f.ha_end {
                    let b = &mut heavy_atoms[j];
                    if b.is_hetero() {
                        continue;
                    }
                    if a.is_neighbor(b) {
                        b.dehydrophobicize();
                    }
                }
            }
            if k > 0 {
                let rotor_y = heavy_atoms[f.rotor_y_idx];
                let rotor_x = heavy_atoms[f.rotor_x_idx];
                if rotor_y.is_hetero() && !rotor_x.is_hetero() {
                    heavy_atoms[f.rotor_x_idx].dehydrophobicize();
                }
                if rotor_x.is_hetero() && !rotor_y.is_hetero() {
                    heavy_atoms[f.rotor_y_idx].dehydrophobicize();
                }
            }
        }

        // Rotor geometry. At this point all coordinates are still in the
        // input frame, so world and parent-local coordinates coincide.
        for k in 1..num_frames {
            let parent = frames[k].parent;
            let parent_rotor_y = heavy_atoms[frames[parent].rotor_y_idx].coord;
            let f = &mut frames[k];
            let rotor_y = heavy_atoms[f.rotor_y_idx].coord;
            let rotor_x = heavy_atoms[f.rotor_x_idx].coord;
            f.parent_rotor_y_to_current_rotor_y = rotor_y - parent_rotor_y;
            f.parent_rotor_x_to_current_rotor_y = (rotor_y - rotor_x).normalize();
        }

        // Bond graph: covalent neighbors within each frame plus the joint
        // bond across each frame boundary.
        let num_heavy_atoms = heavy_atoms.len();
        let mut bonds: Vec<Vec<usize>> = vec![Vec::with_capacity(4); num_heavy_atoms];
        for f in &frames {
            for i in f.ha_begin..f.ha_end {
                for j in (i + 1)..f.ha_end {
                    if heavy_atoms[i].is_neighbor(&heavy_atoms[j]) {
                        bonds[i].push(j);
                        bonds[j].push(i);
                    }
                }
            }
        }
        for f in frames.iter().skip(1) {
            bonds[f.rotor_y_idx].push(f.rotor_x_idx);
            bonds[f.rotor_x_idx].push(f.rotor_y_idx);
        }

        // Intra-ligand interacting pairs: heavy atoms in distinct frames more
        // than three bonds apart, excluding the rotor pair across each joint.
        let mut interacting_pairs = Vec::new();
        let mut neighbors: Vec<usize> = Vec::with_capacity(10);
        for k1 in 0..num_frames {
            let f1 = &frames[k1];
            for i in f1.ha_begin..f1.ha_end {
                for &b1 in &bonds[i] {
                    if !neighbors.contains(&b1) {
                        neighbors.push(b1);
                    }
                    for &b2 in &bonds[b1] {
                        if !neighbors.contains(&b2) {
                            neighbors.push(b2);
                        }
                        for &b3 in &bonds[b2] {
                            if !neighbors.contains(&b3) {
                                neighbors.push(b3);
                            }
                        }
                    }
                }
                for f2 in frames.iter().skip(k1 + 1) {
                    for j in f2.ha_begin..f2.ha_end {
                        if (k1 == f2.parent && (j == f2.rotor_y_idx || i == f2.rotor_x_idx))
                            || neighbors.contains(&j)
                        {
                            continue;
                        }
                        interacting_pairs.push(InteractingPair {
                            i1: i,
                            i2: j,
                            type_pair_index: ScoringFunction::pair_index(
                                heavy_atoms[i].xs(),
                                heavy_atoms[j].xs(),
                            ),
                        });
                    }
                }
                neighbors.clear();
            }
        }

        // Re-express every atom relative to the origin of its owning frame.
        for f in &frames {
            let origin = heavy_atoms[f.rotor_y_idx].coord;
            for atom in &mut heavy_atoms[f.ha_begin..f.ha_end] {
                atom.coord -= origin;
            }
            for atom in &mut hydrogens[f.hy_begin..f.hy_end] {
                atom.coord -= origin;
            }
        }

        debug!(
            "parsed ligand {}: {} frames, {} heavy atoms, {} hydrogens, {} active torsions, {} interacting pairs",
            path.display(),
            num_frames,
            num_heavy_atoms,
            hydrogens.len(),
            num_active_torsions,
            interacting_pairs.len()
        );

        Ok(Self {
            lines,
            frames,
            heavy_atoms,
            hydrogens,
            interacting_pairs,
            num_active_torsions,
            flexibility_penalty_factor,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_heavy_atoms(&self) -> usize {
        self.heavy_atoms.len()
    }

    pub fn num_hydrogens(&self) -> usize {
        self.hydrogens.len()
    }

    /// Number of variables optimized per pose.
    pub fn num_variables(&self) -> usize {
        6 + self.num_active_torsions
    }

    /// The distinct XScore types among the heavy atoms, in first-seen order.
    /// These are the grid maps a docking run needs.
    pub fn atom_types(&self) -> Vec<XsType> {
        let mut types = Vec::with_capacity(10);
        for atom in &self.heavy_atoms {
            let t = atom.xs();
            if !types.contains(&t) {
                types.push(t);
            }
        }
        types
    }
}
