//! One independent Monte Carlo search task: mutate the pose, descend with
//! BFGS using the evaluator's analytic gradient, accept by Metropolis, and
//! offer accepted poses to the shared pool.

use log::debug;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::PI;
use std::sync::Mutex;

use crate::conformation::{Change, Conformation};
use crate::grid::{GridMaps, SearchBox};
use crate::ligand::{Ligand, Scratch};
use crate::math::{rotation_vector_to_quaternion, TriangularMatrix};
use crate::pose::PosePool;
use crate::scoring::ScoringFunction;

/// Line-search trials per BFGS step.
const NUM_ALPHAS: usize = 5;
/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;
/// Wolfe curvature constant.
const WOLFE_C2: f64 = 0.9;
/// Random starts attempted before the task gives up.
const MAX_INITIAL_TRIALS: usize = 1000;

/// A uniformly random rotation, drawn by normalizing four standard normal
/// samples.
fn random_orientation(rng: &mut StdRng) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    ))
}

/// Runs one Monte Carlo task. Deterministic for a fixed seed and inputs.
///
/// The task contributes nothing if no valid initial conformation is found;
/// no failure escapes.
pub fn monte_carlo_task(
    results: &Mutex<PosePool>,
    lig: &Ligand,
    seed: u64,
    sf: &ScoringFunction,
    b: &SearchBox,
    maps: &GridMaps,
) {
    let num_active_torsions = lig.num_active_torsions;
    let num_mc_iterations = 100 * lig.num_heavy_atoms();
    let num_entities = 2 + num_active_torsions;
    let num_variables = 6 + num_active_torsions;
    let e_upper_bound = (4 * lig.num_heavy_atoms()) as f64;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut scratch = Scratch::new(lig);

    // Generate an initial random conformation c0 and evaluate it.
    let mut c0 = Conformation::new(num_active_torsions);
    let mut g0 = Change::new(num_active_torsions);
    let mut initial = None;
    for _ in 0..MAX_INITIAL_TRIALS {
        c0.position = Vector3::new(
            rng.gen_range(b.corner0.x..b.corner1.x),
            rng.gen_range(b.corner0.y..b.corner1.y),
            rng.gen_range(b.corner0.z..b.corner1.z),
        );
        c0.orientation = random_orientation(&mut rng);
        for torsion in c0.torsions.iter_mut() {
            *torsion = rng.gen_range(-PI..PI);
        }
        if let Some(ef) = lig.evaluate(&c0, sf, b, maps, e_upper_bound, &mut scratch, &mut g0) {
            initial = Some(ef);
            break;
        }
    }
    let Some((mut e0, _)) = initial else {
        debug!("seed {seed}: no valid initial conformation in {MAX_INITIAL_TRIALS} trials");
        return;
    };
    let mut best_e = e0;

    let mut c1 = Conformation::new(num_active_torsions);
    let mut c2 = Conformation::new(num_active_torsions);
    let mut g1 = Change::new(num_active_torsions);
    let mut g2 = Change::new(num_active_torsions);
    // BFGS state: descent direction, secant vectors, and the inverse Hessian
    // approximation in packed triangular form.
    let mut p = Change::new(num_active_torsions);
    let mut y = Change::new(num_active_torsions);
    let mut mhy = Change::new(num_active_torsions);
    let mut h = TriangularMatrix::identity(num_variables);

    for _ in 0..num_mc_iterations {
        // Mutate c0 into c1 until the evaluator accepts the pose.
        let (mut e1, mut f1) = loop {
            c1.copy_from(&c0);
            let entity = rng.gen_range(0..num_entities);
            if entity < num_active_torsions {
                c1.torsions[entity] = rng.gen_range(-PI..PI);
            } else if entity == num_active_torsions {
                c1.position += Vector3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                );
            } else {
                let v = 0.01
                    * Vector3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    );
                c1.orientation = rotation_vector_to_quaternion(&v) * c1.orientation;
                c1.orientation.renormalize();
            }
            if let Some(ef) = lig.evaluate(&c1, sf, b, maps, e_upper_bound, &mut scratch, &mut g1)
            {
                break ef;
            }
        };

        // BFGS descent from the mutated conformation. The loop ends when the
        // line search cannot find an acceptable step.
        h.reset_identity();
        loop {
            // p = -h * g1, and pg1 = p . g1 <= 0.
            for i in 0..num_variables {
                let mut sum = 0.0;
                for j in 0..num_variables {
                    sum += h.get(i, j) * g1[j];
                }
                p[i] = -sum;
            }
            let mut pg1 = 0.0;
            for i in 0..num_variables {
                pg1 += p[i] * g1[i];
            }

            // Backtracking line search under the Armijo bound, accepting the
            // first step that also satisfies the Wolfe curvature condition.
            let mut alpha = 1.0;
            let mut step = None;
            for _ in 0..NUM_ALPHAS {
                alpha *= 0.1;
                c2.position = c1.position + alpha * Vector3::new(p[0], p[1], p[2]);
                c2.orientation = rotation_vector_to_quaternion(
                    &(alpha * Vector3::new(p[3], p[4], p[5])),
                ) * c1.orientation;
                c2.orientation.renormalize();
                for i in 0..num_active_torsions {
                    c2.torsions[i] = c1.torsions[i] + alpha * p.torsions[i];
                }
                if let Some((e2, f2)) = lig.evaluate(
                    &c2,
                    sf,
                    b,
                    maps,
                    e1 + ARMIJO_C1 * alpha * pg1,
                    &mut scratch,
                    &mut g2,
                ) {
                    let mut pg2 = 0.0;
                    for i in 0..num_variables {
                        pg2 += p[i] * g2[i];
                    }
                    if pg2 >= WOLFE_C2 * pg1 {
                        step = Some((e2, f2));
                        break;
                    }
                }
            }
            let Some((e2, f2)) = step else { break };

            // BFGS secant update of the inverse Hessian.
            for i in 0..num_variables {
                y[i] = g2[i] - g1[i];
            }
            for i in 0..num_variables {
                let mut sum = 0.0;
                for j in 0..num_variables {
                    sum += h.get(i, j) * y[j];
                }
                mhy[i] = -sum;
            }
            let mut yhy = 0.0;
            let mut yp = 0.0;
            for i in 0..num_variables {
                yhy -= y[i] * mhy[i];
                yp += y[i] * p[i];
            }
            let ryp = 1.0 / yp;
            let pco = ryp * (ryp * yhy + alpha);
            for i in 0..num_variables {
                for j in i..num_variables {
                    *h.get_mut(i, j) += ryp * (mhy[i] * p[j] + mhy[j] * p[i]) + pco * p[i] * p[j];
                }
            }

            c1.copy_from(&c2);
            e1 = e2;
            f1 = f2;
            g1.copy_from(&g2);
        }

        // Metropolis acceptance.
        let delta = e0 - e1;
        if delta > 0.0 || rng.gen::<f64>() < delta.exp() {
            {
                let mut pool = results.lock().unwrap_or_else(|e| e.into_inner());
                if e1 < best_e || pool.has_room() {
                    pool.push(lig.compose_result(e1, f1, &c1));
                }
            }
            if e1 < best_e {
                best_e = e1;
            }
            c0.copy_from(&c1);
            e0 = e1;
        }
    }
}
