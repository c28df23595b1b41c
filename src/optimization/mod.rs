//! The stochastic global search: independent Monte Carlo tasks scheduled on
//! a worker pool, merging poses into one shared result pool.

pub mod monte_carlo;

pub use monte_carlo::monte_carlo_task;

use rayon::prelude::*;
use std::sync::Mutex;

use crate::grid::{GridMaps, SearchBox};
use crate::ligand::Ligand;
use crate::pose::{Pose, PosePool};
use crate::scoring::ScoringFunction;

/// Settings for a docking run.
#[derive(Debug, Clone)]
pub struct DockParams {
    /// Number of independent Monte Carlo tasks.
    pub num_tasks: usize,
    /// Base seed; task `t` runs with `seed + t`, so a run is reproducible.
    pub seed: u64,
    /// Capacity of the shared pose pool.
    pub pool_capacity: usize,
}

impl Default for DockParams {
    fn default() -> Self {
        Self {
            num_tasks: 64,
            seed: 0,
            pool_capacity: 20,
        }
    }
}

/// Docks a ligand: runs the Monte Carlo tasks in parallel and returns the
/// pooled poses sorted by ascending energy.
///
/// The ligand, scoring function, box and maps are shared read-only across
/// tasks; only pool insertion synchronizes.
pub fn dock(
    lig: &Ligand,
    sf: &ScoringFunction,
    b: &SearchBox,
    maps: &GridMaps,
    params: &DockParams,
) -> Vec<Pose> {
    let pool = Mutex::new(PosePool::new(
        params.pool_capacity,
        lig.num_heavy_atoms() as f64,
    ));
    (0..params.num_tasks).into_par_iter().for_each(|t| {
        monte_carlo_task(
            &pool,
            lig,
            params.seed.wrapping_add(t as u64),
            sf,
            b,
            maps,
        );
    });
    pool.into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .into_poses()
}
