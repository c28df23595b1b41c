//! The rigid receptor: parsed atoms and grid-map population for the atom
//! types a ligand needs.

use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::atom::{AdType, Atom, XsType};
use crate::grid::{GridMap, GridMaps, SearchBox};
use crate::ligand::{parse_atom_record, ParseError};
use crate::scoring::{ScoringFunction, CUTOFF_SQR};

/// A receptor parsed from a PDBQT file. Atoms keep world coordinates; only
/// heavy atoms are stored, hydrogens being consumed for donor marking.
#[derive(Debug, Clone)]
pub struct Receptor {
    pub atoms: Vec<Atom>,
}

impl Receptor {
    /// Parses a receptor from a PDBQT file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(path, BufReader::new(file))
    }

    /// Parses a receptor from any line source; `path` is used for error
    /// reporting only.
    pub fn from_reader<R: BufRead>(path: impl AsRef<Path>, reader: R) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let mut atoms: Vec<Atom> = Vec::new();
        // Residues are contiguous in PDBQT, so intra-residue passes only
        // need the index where the current residue started.
        let mut residue = String::new();
        let mut residue_start = 0usize;
        let mut line_number = 0usize;

        for line in reader.lines() {
            let line = line?;
            line_number += 1;
            if !(line.starts_with("ATOM") || line.starts_with("HETATM")) {
                continue;
            }
            let key = line.get(17..27).unwrap_or("");
            if key != residue {
                dehydrophobicize_residue(&mut atoms[residue_start..]);
                residue_start = atoms.len();
                residue.replace_range(.., key);
            }
            let (atom, _serial) = parse_atom_record(path, line_number, &line)?;
            if atom.is_hydrogen() {
                // A polar hydrogen marks its bonded hetero atom as a donor.
                if atom.ad == AdType::PolarHydrogen {
                    for b in atoms[residue_start..].iter_mut().rev() {
                        if !b.is_hetero() {
                            continue;
                        }
                        if atom.is_neighbor(b) {
                            b.donorize();
                            break;
                        }
                    }
                }
            } else {
                atoms.push(atom);
            }
        }
        dehydrophobicize_residue(&mut atoms[residue_start..]);

        Ok(Self { atoms })
    }

    /// Populates grid maps for the given probe atom types over the corners
    /// of `b`: at each corner, the summed pairwise scoring-function energy
    /// between a probe of that type and every receptor atom within the
    /// cutoff.
    pub fn populate_into(
        &self,
        maps: &mut GridMaps,
        b: &SearchBox,
        types: &[XsType],
        sf: &ScoringFunction,
    ) {
        // Atoms farther than the cutoff from the box can never touch a probe.
        let relevant: Vec<&Atom> = self
            .atoms
            .iter()
            .filter(|a| {
                let mut clamped = a.coord;
                for d in 0..3 {
                    clamped[d] = clamped[d].clamp(b.corner0[d], b.corner1[d]);
                }
                (a.coord - clamped).norm_squared() < CUTOFF_SQR
            })
            .collect();

        let populated: Vec<(XsType, GridMap)> = types
            .par_iter()
            .map(|&t| {
                let map = GridMap::from_fn(b, |probe| {
                    relevant
                        .iter()
                        .map(|a| {
                            let r2 = (a.coord - probe).norm_squared();
                            if r2 < CUTOFF_SQR {
                                sf.evaluate(ScoringFunction::pair_index(t, a.xs()), r2).e
                            } else {
                                0.0
                            }
                        })
                        .sum()
                });
                (t, map)
            })
            .collect();
        for (t, map) in populated {
            maps.insert(t, map);
        }
    }

    /// Convenience wrapper building a fresh set of maps.
    pub fn populate_maps(
        &self,
        b: &SearchBox,
        types: &[XsType],
        sf: &ScoringFunction,
    ) -> GridMaps {
        let mut maps = GridMaps::new();
        self.populate_into(&mut maps, b, types, sf);
        maps
    }
}

/// Demotes carbons covalently bonded to a hetero atom within one residue.
fn dehydrophobicize_residue(atoms: &mut [Atom]) {
    for i in 0..atoms.len() {
        if !atoms[i].is_hetero() {
            continue;
        }
        let a = atoms[i];
        for b in atoms.iter_mut() {
            if !b.is_hetero() && a.is_neighbor(b) {
                b.dehydrophobicize();
            }
        }
    }
}
