//! The pairwise scoring function over XScore atom-type pairs.
//!
//! The functional form is the Vina sum of two attractive gaussians, a
//! quadratic repulsion, a hydrophobic ramp and a hydrogen-bond ramp, all in
//! the surface distance `d = r - (vdw_i + vdw_j)`. Per-pair constants are
//! precomputed into a symmetric triangular table so that evaluation takes a
//! pair index rather than a pair of types.

use crate::atom::XsType;
use crate::math::triangular_index_permissive;

/// Squared distance cutoff in square Angstroms beyond which pairwise
/// interactions vanish.
pub const CUTOFF_SQR: f64 = 64.0;

/// Number of XScore atom-type pairs in the symmetric triangular table.
pub const NUM_TYPE_PAIRS: usize = XsType::COUNT * (XsType::COUNT + 1) / 2;

const WEIGHT_GAUSS1: f64 = -0.035579;
const WEIGHT_GAUSS2: f64 = -0.005156;
const WEIGHT_REPULSION: f64 = 0.840245;
const WEIGHT_HYDROPHOBIC: f64 = -0.035069;
const WEIGHT_HBOND: f64 = -0.587439;

/// Value of the scoring function at a squared distance: the energy `e` and
/// the derivative factor `dor = (de/dr) / r`, scaled so that `dor * (r2 - r1)`
/// is the gradient of `e` with respect to the position of atom 2.
#[derive(Debug, Clone, Copy)]
pub struct ScoringTerm {
    pub e: f64,
    pub dor: f64,
}

#[derive(Debug, Clone)]
struct PairParams {
    /// Sum of the van der Waals radii of the two types.
    radius_sum: f64,
    /// Both types are hydrophobic.
    hydrophobic: bool,
    /// One type is a donor and the other an acceptor.
    hbond: bool,
}

/// The scoring function, ready for indexed evaluation.
#[derive(Debug, Clone)]
pub struct ScoringFunction {
    pairs: Vec<PairParams>,
}

impl ScoringFunction {
    pub fn new() -> Self {
        let types = XsType::all();
        let mut pairs = vec![
            PairParams {
                radius_sum: 0.0,
                hydrophobic: false,
                hbond: false,
            };
            NUM_TYPE_PAIRS
        ];
        for (i, &t1) in types.iter().enumerate() {
            for &t2 in &types[i..] {
                pairs[Self::pair_index(t1, t2)] = PairParams {
                    radius_sum: t1.vdw_radius() + t2.vdw_radius(),
                    hydrophobic: t1.is_hydrophobic() && t2.is_hydrophobic(),
                    hbond: (t1.is_donor() && t2.is_acceptor())
                        || (t1.is_acceptor() && t2.is_donor()),
                };
            }
        }
        Self { pairs }
    }

    /// The triangular index of an unordered type pair.
    #[inline]
    pub fn pair_index(t1: XsType, t2: XsType) -> usize {
        triangular_index_permissive(t1.as_index(), t2.as_index())
    }

    /// Evaluates the energy and its derivative factor at squared distance
    /// `r2`, which must be below [`CUTOFF_SQR`].
    pub fn evaluate(&self, type_pair_index: usize, r2: f64) -> ScoringTerm {
        debug_assert!(r2 < CUTOFF_SQR);
        let p = &self.pairs[type_pair_index];
        let r = r2.sqrt();
        let d = r - p.radius_sum;

        let g1 = (-4.0 * d * d).exp();
        let mut e = WEIGHT_GAUSS1 * g1;
        let mut de_dd = WEIGHT_GAUSS1 * g1 * (-8.0 * d);

        let v = 0.5 * (d - 3.0);
        let g2 = (-v * v).exp();
        e += WEIGHT_GAUSS2 * g2;
        de_dd += WEIGHT_GAUSS2 * g2 * (-v);

        if d < 0.0 {
            e += WEIGHT_REPULSION * d * d;
            de_dd += WEIGHT_REPULSION * 2.0 * d;
        }

        if p.hydrophobic && d < 1.5 {
            if d <= 0.5 {
                e += WEIGHT_HYDROPHOBIC;
            } else {
                e += WEIGHT_HYDROPHOBIC * (1.5 - d);
                de_dd -= WEIGHT_HYDROPHOBIC;
            }
        }

        if p.hbond && d < 0.0 {
            if d <= -0.7 {
                e += WEIGHT_HBOND;
            } else {
                e += WEIGHT_HBOND * (d / -0.7);
                de_dd += WEIGHT_HBOND * (-1.0 / 0.7);
            }
        }

        ScoringTerm { e, dor: de_dd / r }
    }
}

impl Default for ScoringFunction {
    fn default() -> Self {
        Self::new()
    }
}
