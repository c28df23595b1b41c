//! Atom model: AutoDock atom types, derived XScore types, and the covalent
//! neighbor predicate used to build the ligand bond graph.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// AutoDock4 atom types supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdType {
    Hydrogen,         // H
    PolarHydrogen,    // HD
    Carbon,           // C
    AromaticCarbon,   // A
    Nitrogen,         // N
    NitrogenAcceptor, // NA
    Oxygen,           // O
    OxygenAcceptor,   // OA
    Sulfur,           // S
    SulfurAcceptor,   // SA
    Selenium,         // Se
    Phosphorus,       // P
    Fluorine,         // F
    Chlorine,         // Cl
    Bromine,          // Br
    Iodine,           // I
    Zinc,             // Zn
    Iron,             // Fe
    Magnesium,        // Mg
    Calcium,          // Ca
    Manganese,        // Mn
    Copper,           // Cu
}

impl AdType {
    /// Parses the atom-type mnemonic found in columns 78-79 of an ATOM or
    /// HETATM record. Returns `None` for unsupported types.
    pub fn from_pdbqt_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "H" => Some(AdType::Hydrogen),
            "HD" => Some(AdType::PolarHydrogen),
            "C" => Some(AdType::Carbon),
            "A" => Some(AdType::AromaticCarbon),
            "N" => Some(AdType::Nitrogen),
            "NA" => Some(AdType::NitrogenAcceptor),
            "O" => Some(AdType::Oxygen),
            "OA" => Some(AdType::OxygenAcceptor),
            "S" => Some(AdType::Sulfur),
            "SA" => Some(AdType::SulfurAcceptor),
            "SE" => Some(AdType::Selenium),
            "P" => Some(AdType::Phosphorus),
            "F" => Some(AdType::Fluorine),
            "CL" => Some(AdType::Chlorine),
            "BR" => Some(AdType::Bromine),
            "I" => Some(AdType::Iodine),
            "ZN" => Some(AdType::Zinc),
            "FE" => Some(AdType::Iron),
            "MG" => Some(AdType::Magnesium),
            "CA" => Some(AdType::Calcium),
            "MN" => Some(AdType::Manganese),
            "CU" => Some(AdType::Copper),
            _ => None,
        }
    }

    /// Covalent radius in Angstroms, pre-scaled by 1.1 so that two atoms are
    /// bonded whenever their distance is below the sum of these radii.
    pub fn covalent_radius(&self) -> f64 {
        match self {
            AdType::Hydrogen | AdType::PolarHydrogen => 0.407,
            AdType::Carbon | AdType::AromaticCarbon => 0.847,
            AdType::Nitrogen | AdType::NitrogenAcceptor => 0.825,
            AdType::Oxygen | AdType::OxygenAcceptor => 0.803,
            AdType::Sulfur | AdType::SulfurAcceptor => 1.122,
            AdType::Selenium => 1.276,
            AdType::Phosphorus => 1.166,
            AdType::Fluorine => 0.781,
            AdType::Chlorine => 1.089,
            AdType::Bromine => 1.254,
            AdType::Iodine => 1.463,
            AdType::Zinc => 1.441,
            AdType::Iron => 1.375,
            AdType::Magnesium => 1.430,
            AdType::Calcium => 1.914,
            AdType::Manganese => 1.529,
            AdType::Copper => 1.518,
        }
    }

    /// Returns true for the two hydrogen types.
    pub fn is_hydrogen(&self) -> bool {
        matches!(self, AdType::Hydrogen | AdType::PolarHydrogen)
    }

    /// Returns true for heavy atoms other than carbon.
    pub fn is_hetero(&self) -> bool {
        !matches!(
            self,
            AdType::Hydrogen | AdType::PolarHydrogen | AdType::Carbon | AdType::AromaticCarbon
        )
    }
}

/// XScore atom types. These index the scoring function's triangular type-pair
/// table and select the receptor grid map a heavy atom reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum XsType {
    CarbonHydrophobic,
    CarbonPolar,
    NitrogenPolar,
    NitrogenDonor,
    NitrogenAcceptor,
    NitrogenDonorAcceptor,
    OxygenPolar,
    OxygenDonor,
    OxygenAcceptor,
    OxygenDonorAcceptor,
    Sulfur,
    Phosphorus,
    Fluorine,
    Chlorine,
    Bromine,
    Iodine,
    MetalDonor,
}

impl XsType {
    /// Number of XScore atom types.
    pub const COUNT: usize = 17;

    #[inline]
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Van der Waals radius in Angstroms, used as the zero of the pairwise
    /// surface distance in the scoring function.
    pub fn vdw_radius(&self) -> f64 {
        match self {
            XsType::CarbonHydrophobic | XsType::CarbonPolar => 1.9,
            XsType::NitrogenPolar
            | XsType::NitrogenDonor
            | XsType::NitrogenAcceptor
            | XsType::NitrogenDonorAcceptor => 1.8,
            XsType::OxygenPolar
            | XsType::OxygenDonor
            | XsType::OxygenAcceptor
            | XsType::OxygenDonorAcceptor => 1.7,
            XsType::Sulfur => 2.0,
            XsType::Phosphorus => 2.1,
            XsType::Fluorine => 1.5,
            XsType::Chlorine => 1.8,
            XsType::Bromine => 2.0,
            XsType::Iodine => 2.2,
            XsType::MetalDonor => 1.2,
        }
    }

    pub fn is_hydrophobic(&self) -> bool {
        matches!(
            self,
            XsType::CarbonHydrophobic
                | XsType::Fluorine
                | XsType::Chlorine
                | XsType::Bromine
                | XsType::Iodine
        )
    }

    pub fn is_donor(&self) -> bool {
        matches!(
            self,
            XsType::NitrogenDonor
                | XsType::NitrogenDonorAcceptor
                | XsType::OxygenDonor
                | XsType::OxygenDonorAcceptor
                | XsType::MetalDonor
        )
    }

    pub fn is_acceptor(&self) -> bool {
        matches!(
            self,
            XsType::NitrogenAcceptor
                | XsType::NitrogenDonorAcceptor
                | XsType::OxygenAcceptor
                | XsType::OxygenDonorAcceptor
        )
    }

    /// All types, in index order.
    pub fn all() -> [XsType; Self::COUNT] {
        [
            XsType::CarbonHydrophobic,
            XsType::CarbonPolar,
            XsType::NitrogenPolar,
            XsType::NitrogenDonor,
            XsType::NitrogenAcceptor,
            XsType::NitrogenDonorAcceptor,
            XsType::OxygenPolar,
            XsType::OxygenDonor,
            XsType::OxygenAcceptor,
            XsType::OxygenDonorAcceptor,
            XsType::Sulfur,
            XsType::Phosphorus,
            XsType::Fluorine,
            XsType::Chlorine,
            XsType::Bromine,
            XsType::Iodine,
            XsType::MetalDonor,
        ]
    }
}

/// An atom of the ligand or the receptor.
///
/// Inside a constructed ligand the coordinate is relative to the origin of
/// the owning frame; receptor atoms keep world coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Atom {
    pub ad: AdType,
    pub coord: Vector3<f64>,
    /// Set when a polar hydrogen is covalently bonded to this hetero atom.
    pub is_donor: bool,
    /// Carbons start hydrophobic and are demoted when bonded to a hetero atom.
    pub is_hydrophobic: bool,
}

impl Atom {
    pub fn new(ad: AdType, coord: Vector3<f64>) -> Self {
        Self {
            ad,
            coord,
            is_donor: false,
            is_hydrophobic: matches!(ad, AdType::Carbon | AdType::AromaticCarbon),
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.ad.is_hydrogen()
    }

    pub fn is_hetero(&self) -> bool {
        self.ad.is_hetero()
    }

    /// Marks this atom as a hydrogen bond donor.
    pub fn donorize(&mut self) {
        self.is_donor = true;
    }

    /// Clears the hydrophobic flag of a carbon bonded to a hetero atom.
    pub fn dehydrophobicize(&mut self) {
        self.is_hydrophobic = false;
    }

    /// The XScore type derived from the AutoDock type and the mutable flags.
    pub fn xs(&self) -> XsType {
        match self.ad {
            AdType::Carbon | AdType::AromaticCarbon => {
                if self.is_hydrophobic {
                    XsType::CarbonHydrophobic
                } else {
                    XsType::CarbonPolar
                }
            }
            AdType::Nitrogen => {
                if self.is_donor {
                    XsType::NitrogenDonor
                } else {
                    XsType::NitrogenPolar
                }
            }
            AdType::NitrogenAcceptor => {
                if self.is_donor {
                    XsType::NitrogenDonorAcceptor
                } else {
                    XsType::NitrogenAcceptor
                }
            }
            AdType::Oxygen => {
                if self.is_donor {
                    XsType::OxygenDonor
                } else {
                    XsType::OxygenPolar
                }
            }
            AdType::OxygenAcceptor => {
                if self.is_donor {
                    XsType::OxygenDonorAcceptor
                } else {
                    XsType::OxygenAcceptor
                }
            }
            AdType::Sulfur | AdType::SulfurAcceptor | AdType::Selenium => XsType::Sulfur,
            AdType::Phosphorus => XsType::Phosphorus,
            AdType::Fluorine => XsType::Fluorine,
            AdType::Chlorine => XsType::Chlorine,
            AdType::Bromine => XsType::Bromine,
            AdType::Iodine => XsType::Iodine,
            AdType::Zinc
            | AdType::Iron
            | AdType::Magnesium
            | AdType::Calcium
            | AdType::Manganese
            | AdType::Copper => XsType::MetalDonor,
            AdType::Hydrogen | AdType::PolarHydrogen => {
                unreachable!("hydrogens have no XScore type")
            }
        }
    }

    /// Two atoms are covalently bonded when their squared distance is below
    /// the squared sum of their covalent radii.
    pub fn is_neighbor(&self, other: &Atom) -> bool {
        let r = self.ad.covalent_radius() + other.ad.covalent_radius();
        (self.coord - other.coord).norm_squared() < r * r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ad_type() {
        assert_eq!(AdType::from_pdbqt_str("C"), Some(AdType::Carbon));
        assert_eq!(AdType::from_pdbqt_str("HD"), Some(AdType::PolarHydrogen));
        assert_eq!(AdType::from_pdbqt_str("NA"), Some(AdType::NitrogenAcceptor));
        assert_eq!(AdType::from_pdbqt_str(" Cl"), Some(AdType::Chlorine));
        assert_eq!(AdType::from_pdbqt_str("Zn"), Some(AdType::Zinc));
        assert_eq!(AdType::from_pdbqt_str("X"), None);
        assert_eq!(AdType::from_pdbqt_str(""), None);
    }

    #[test]
    fn test_hydrogen_and_hetero_predicates() {
        assert!(AdType::PolarHydrogen.is_hydrogen());
        assert!(!AdType::Carbon.is_hydrogen());
        assert!(AdType::OxygenAcceptor.is_hetero());
        assert!(!AdType::AromaticCarbon.is_hetero());
        assert!(!AdType::Hydrogen.is_hetero());
    }

    #[test]
    fn test_xs_derivation_with_flags() {
        let mut n = Atom::new(AdType::NitrogenAcceptor, Vector3::zeros());
        assert_eq!(n.xs(), XsType::NitrogenAcceptor);
        n.donorize();
        assert_eq!(n.xs(), XsType::NitrogenDonorAcceptor);

        let mut c = Atom::new(AdType::Carbon, Vector3::zeros());
        assert_eq!(c.xs(), XsType::CarbonHydrophobic);
        c.dehydrophobicize();
        assert_eq!(c.xs(), XsType::CarbonPolar);

        let zn = Atom::new(AdType::Zinc, Vector3::zeros());
        assert_eq!(zn.xs(), XsType::MetalDonor);
    }

    #[test]
    fn test_xs_type_indices_are_dense() {
        for (i, t) in XsType::all().iter().enumerate() {
            assert_eq!(t.as_index(), i);
        }
    }

    #[test]
    fn test_neighbor_predicate() {
        // A typical C-C bond length is 1.54 A, well below 2 * 0.847.
        let a = Atom::new(AdType::Carbon, Vector3::new(0.0, 0.0, 0.0));
        let b = Atom::new(AdType::Carbon, Vector3::new(1.54, 0.0, 0.0));
        let c = Atom::new(AdType::Carbon, Vector3::new(2.5, 0.0, 0.0));
        assert!(a.is_neighbor(&b));
        assert!(!a.is_neighbor(&c));

        // N-H at 1.01 A.
        let n = Atom::new(AdType::Nitrogen, Vector3::zeros());
        let h = Atom::new(AdType::PolarHydrogen, Vector3::new(0.0, 1.01, 0.0));
        assert!(n.is_neighbor(&h));
    }
}
