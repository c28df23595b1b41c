//! griddock: a molecular docking engine for rigid receptors and flexible ligands.
//!
//! Given a receptor, a rectangular search box and a ligand whose rotatable
//! bonds form a tree of rigid frames, the engine runs independent Monte Carlo
//! searches with BFGS local refinement and collects a clustered pool of
//! low-energy binding poses. Inter-molecular energies come from precomputed
//! per-atom-type grid maps; intra-ligand energies from a pairwise scoring
//! function over XScore atom types.

pub mod atom;
pub mod conformation;
pub mod grid;
pub mod ligand;
pub mod math;
pub mod optimization;
pub mod pose;
pub mod receptor;
pub mod scoring;

pub use atom::{AdType, Atom, XsType};
pub use conformation::{Change, Conformation};
pub use grid::{GridMap, GridMaps, SearchBox};
pub use ligand::{Ligand, ParseError, Scratch};
pub use optimization::{dock, monte_carlo_task, DockParams};
pub use pose::{Pose, PosePool};
pub use receptor::Receptor;
pub use scoring::{ScoringFunction, CUTOFF_SQR};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
