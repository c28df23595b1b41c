//! Integration tests for the griddock docking engine: parsing scenarios,
//! evaluator properties, search determinism and output formatting.

use approx::assert_relative_eq;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::{FRAC_PI_2, PI};
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use griddock::{
    dock, monte_carlo_task, Change, Conformation, DockParams, GridMap, GridMaps, Ligand,
    ParseError, Pose, PosePool, Scratch, ScoringFunction, SearchBox, XsType, CUTOFF_SQR,
};

fn atom_line(record: &str, serial: usize, name: &str, x: f64, y: f64, z: f64, ad: &str) -> String {
    format!(
        "{:<6}{:>5} {:<4} {:<3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}    {:>6.3} {:<2}",
        record, serial, name, "LIG", "A", 1, x, y, z, 1.0, 0.0, 0.0, ad
    )
}

fn parse(text: &str) -> Result<Ligand, ParseError> {
    Ligand::from_reader(Path::new("test.pdbqt"), Cursor::new(text.to_string()))
}

/// A single carbon atom, root only.
fn rigid_ligand() -> Ligand {
    let text = format!(
        "ROOT\n{}\nENDROOT\nTORSDOF 0\n",
        atom_line("ATOM", 1, "C1", 0.0, 0.0, 0.0, "C")
    );
    parse(&text).expect("rigid ligand parses")
}

/// Two carbons in the root, 1.5 A apart.
fn two_atom_ligand() -> Ligand {
    let text = format!(
        "ROOT\n{}\n{}\nENDROOT\nTORSDOF 0\n",
        atom_line("ATOM", 1, "C1", 0.0, 0.0, 0.0, "C"),
        atom_line("ATOM", 2, "C2", 1.5, 0.0, 0.0, "C"),
    );
    parse(&text).expect("two-atom ligand parses")
}

/// Root C1 plus one branch whose rotor axis is the +x axis and whose second
/// atom sits at local (0, 1, 0) from the branch origin.
fn two_frame_ligand() -> Ligand {
    let text = format!(
        "ROOT\n{}\nENDROOT\nBRANCH   1    2\n{}\n{}\nENDBRANCH   1   2\nTORSDOF 1\n",
        atom_line("ATOM", 1, "C1", 0.0, 0.0, 0.0, "C"),
        atom_line("ATOM", 2, "C2", 1.5, 0.0, 0.0, "C"),
        atom_line("ATOM", 3, "C3", 1.5, 1.0, 0.0, "C"),
    );
    parse(&text).expect("two-frame ligand parses")
}

/// A pentane-like zig-zag chain split over three frames. Exactly one pair of
/// heavy atoms (the chain ends) is four bonds apart.
fn zigzag_ligand() -> Ligand {
    let text = format!(
        "ROOT\n{}\nENDROOT\nBRANCH   1    2\n{}\n{}\nBRANCH   3    4\n{}\n{}\nENDBRANCH   3   4\nENDBRANCH   1   2\nTORSDOF 2\n",
        atom_line("ATOM", 1, "C1", 0.0, 0.0, 0.0, "C"),
        atom_line("ATOM", 2, "C2", 1.2, 0.9, 0.0, "C"),
        atom_line("ATOM", 3, "C3", 2.4, 0.0, 0.0, "C"),
        atom_line("ATOM", 4, "C4", 3.6, 0.9, 0.0, "C"),
        atom_line("ATOM", 5, "C5", 4.8, 0.0, 0.0, "C"),
    );
    parse(&text).expect("zig-zag ligand parses")
}

fn centered_box(size: f64, granularity: f64) -> SearchBox {
    SearchBox::new(
        Vector3::zeros(),
        Vector3::new(size, size, size),
        granularity,
    )
    .expect("valid box")
}

fn zero_maps(lig: &Ligand, b: &SearchBox) -> GridMaps {
    GridMaps::zeroed(b, &lig.atom_types())
}

fn random_orientation(rng: &mut StdRng) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(
        rng.gen::<f64>() - 0.5,
        rng.gen::<f64>() - 0.5,
        rng.gen::<f64>() - 0.5,
        rng.gen::<f64>() - 0.5,
    ))
}

fn random_conformation(lig: &Ligand, rng: &mut StdRng) -> Conformation {
    let mut conf = Conformation::new(lig.num_active_torsions);
    conf.position = Vector3::new(
        rng.gen_range(-2.0..2.0),
        rng.gen_range(-2.0..2.0),
        rng.gen_range(-2.0..2.0),
    );
    conf.orientation = random_orientation(rng);
    for t in conf.torsions.iter_mut() {
        *t = rng.gen_range(-PI..PI);
    }
    conf
}

// Scenario S1: a rigid one-atom ligand over all-zero grid maps has zero
// energy and gradient, and a search task emits a pose inside the box.
#[test]
fn test_rigid_ligand_in_zero_field() {
    let lig = rigid_ligand();
    let b = centered_box(10.0, 1.0);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();
    let mut scratch = Scratch::new(&lig);
    let mut g = Change::new(0);

    let mut conf = Conformation::new(0);
    conf.position = Vector3::new(0.3, 0.4, 0.5);
    let (e, f) = lig
        .evaluate(&conf, &sf, &b, &maps, 1e9, &mut scratch, &mut g)
        .expect("pose inside the box evaluates");
    assert_eq!(e, 0.0);
    assert_eq!(f, 0.0);
    assert_eq!(g.position, Vector3::zeros());
    assert_eq!(g.orientation, Vector3::zeros());

    let pool = Mutex::new(PosePool::new(1, lig.num_heavy_atoms() as f64));
    monte_carlo_task(&pool, &lig, 42, &sf, &b, &maps);
    let pool = pool.into_inner().expect("pool lock is clean");
    assert_eq!(pool.len(), 1);
    let pose = &pool.poses()[0];
    assert_eq!(pose.e, 0.0);
    assert!(b.within(&pose.heavy_atoms[0]));
}

// Scenario S2: a quarter-turn torsion around the x axis carries the child
// atom from local (0, 1, 0) to world origin + (0, 0, 1).
#[test]
fn test_torsion_rotates_child_atom() {
    let lig = two_frame_ligand();
    assert_eq!(lig.num_active_torsions, 1);
    assert_relative_eq!(
        lig.frames[1].parent_rotor_x_to_current_rotor_y,
        Vector3::new(1.0, 0.0, 0.0),
        epsilon = 1e-12
    );
    // The child atom is stored relative to the branch origin.
    assert_relative_eq!(
        lig.heavy_atoms[2].coord,
        Vector3::new(0.0, 1.0, 0.0),
        epsilon = 1e-12
    );

    let mut conf = Conformation::new(1);
    conf.torsions[0] = FRAC_PI_2;
    let pose = lig.compose_result(0.0, 0.0, &conf);
    let child_origin = pose.heavy_atoms[1];
    assert_relative_eq!(child_origin, Vector3::new(1.5, 0.0, 0.0), epsilon = 1e-12);
    assert_relative_eq!(
        pose.heavy_atoms[2],
        child_origin + Vector3::new(0.0, 0.0, 1.0),
        epsilon = 1e-9
    );
}

// Scenario S3: a polar hydrogen marks its bonded nitrogen as a donor; other
// hetero atoms stay plain.
#[test]
fn test_polar_hydrogen_marks_only_bonded_nitrogen() {
    let text = format!(
        "ROOT\n{}\n{}\n{}\n{}\nENDROOT\nTORSDOF 0\n",
        atom_line("ATOM", 1, "N1", 0.0, 0.0, 0.0, "N"),
        atom_line("ATOM", 2, "C1", 1.45, 0.0, 0.0, "C"),
        atom_line("ATOM", 3, "O1", 5.0, 0.0, 0.0, "OA"),
        atom_line("ATOM", 4, "H1", 0.0, 1.01, 0.0, "HD"),
    );
    let lig = parse(&text).expect("donor ligand parses");
    assert!(lig.heavy_atoms[0].is_donor);
    assert_eq!(lig.heavy_atoms[0].xs(), XsType::NitrogenDonor);
    assert!(!lig.heavy_atoms[2].is_donor);
    assert_eq!(lig.heavy_atoms[2].xs(), XsType::OxygenAcceptor);
}

// Scenario S4: an empty BRANCH is a parse error.
#[test]
fn test_empty_branch_is_a_parse_error() {
    let text = format!(
        "ROOT\n{}\nENDROOT\nBRANCH   1    2\nENDBRANCH   1    2\nTORSDOF 1\n",
        atom_line("ATOM", 1, "C1", 0.0, 0.0, 0.0, "C"),
    );
    match parse(&text) {
        Err(ParseError::Line { line, message, .. }) => {
            assert_eq!(line, 5);
            assert!(message.contains("empty BRANCH"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

// Scenario S5: poses leaving the box are rejected, not scored.
#[test]
fn test_out_of_box_poses_are_rejected() {
    let lig = two_atom_ligand();
    let b = centered_box(10.0, 1.0);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();
    let mut scratch = Scratch::new(&lig);
    let mut g = Change::new(0);

    // Root position outside.
    let mut conf = Conformation::new(0);
    conf.position = Vector3::new(7.0, 0.0, 0.0);
    assert!(lig
        .evaluate(&conf, &sf, &b, &maps, 1e9, &mut scratch, &mut g)
        .is_none());

    // Root position inside, but the second atom pokes out at +x.
    conf.position = Vector3::new(4.0, 0.0, 0.0);
    assert!(lig
        .evaluate(&conf, &sf, &b, &maps, 1e9, &mut scratch, &mut g)
        .is_none());

    conf.position = Vector3::new(0.0, 0.0, 0.0);
    assert!(lig
        .evaluate(&conf, &sf, &b, &maps, 1e9, &mut scratch, &mut g)
        .is_some());
}

// Scenario S6: of two poses with identical heavy atoms the pool keeps the
// lower-energy one, in either arrival order.
#[test]
fn test_pool_keeps_lower_energy_of_identical_poses() {
    let lig = rigid_ligand();
    let mut conf = Conformation::new(0);
    conf.position = Vector3::new(1.0, 2.0, 3.0);
    let better = lig.compose_result(-4.0, -4.0, &conf);
    let worse = lig.compose_result(-2.0, -2.0, &conf);

    for order in [[&better, &worse], [&worse, &better]] {
        let mut pool = PosePool::new(8, lig.num_heavy_atoms() as f64);
        for p in order {
            pool.push(p.clone());
        }
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.best_energy(), Some(-4.0));
    }
}

// Property 1: forward kinematics keeps every frame orientation on the unit
// sphere.
#[test]
fn test_orientations_stay_normalized() {
    let lig = zigzag_ligand();
    let b = centered_box(40.0, 1.0);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();
    let mut scratch = Scratch::new(&lig);
    let mut g = Change::new(lig.num_active_torsions);
    let mut rng = StdRng::seed_from_u64(11);

    let mut checked = 0;
    for _ in 0..50 {
        let conf = random_conformation(&lig, &mut rng);
        if lig
            .evaluate(&conf, &sf, &b, &maps, f64::INFINITY, &mut scratch, &mut g)
            .is_some()
        {
            for q in scratch.orientations() {
                assert!((q.as_ref().norm_squared() - 1.0).abs() < 1e-2);
            }
            checked += 1;
        }
    }
    assert!(checked > 0, "no random pose was feasible");
}

// Property 2: rotor axes are unit length in parent-local coordinates.
#[test]
fn test_rotor_axes_are_unit_length() {
    let lig = zigzag_ligand();
    for f in lig.frames.iter().skip(1) {
        assert!((f.parent_rotor_x_to_current_rotor_y.norm() - 1.0).abs() < 1e-6);
    }
}

// Property 3: interacting pairs are stored with i1 < i2 and exclude
// everything within three bond hops. In the five-carbon chain only the two
// chain ends qualify.
#[test]
fn test_interacting_pairs_exclude_1_4_and_closer() {
    let lig = zigzag_ligand();
    assert_eq!(lig.num_active_torsions, 2);
    assert_eq!(lig.interacting_pairs.len(), 1);
    let pair = lig.interacting_pairs[0];
    assert_eq!((pair.i1, pair.i2), (0, 4));
    assert!(pair.i1 < pair.i2);
}

// Property 4: the reported energy is exactly reproducible from the published
// coordinates, in the same floating-point order.
#[test]
fn test_energy_recomputes_exactly_from_coordinates() {
    let lig = zigzag_ligand();
    let b = centered_box(40.0, 1.0);
    let sf = ScoringFunction::new();
    let mut maps = GridMaps::new();
    maps.insert(
        XsType::CarbonHydrophobic,
        GridMap::from_fn(&b, |c| 0.05 * c.x + 0.02 * c.y - 0.03 * c.z),
    );
    let mut scratch = Scratch::new(&lig);
    let mut g = Change::new(lig.num_active_torsions);
    let mut rng = StdRng::seed_from_u64(23);

    let mut checked = 0;
    for _ in 0..20 {
        let conf = random_conformation(&lig, &mut rng);
        let Some((e, f)) =
            lig.evaluate(&conf, &sf, &b, &maps, f64::INFINITY, &mut scratch, &mut g)
        else {
            continue;
        };
        let coords = scratch.coordinates();
        let mut recomputed = 0.0;
        for (i, atom) in lig.heavy_atoms.iter().enumerate() {
            let [x, y, z] = b.grid_index(&coords[i]);
            recomputed += maps.map(atom.xs()).at(x, y, z);
        }
        let recomputed_inter = recomputed;
        for p in &lig.interacting_pairs {
            let r2 = (coords[p.i2] - coords[p.i1]).norm_squared();
            if r2 < CUTOFF_SQR {
                recomputed += sf.evaluate(p.type_pair_index, r2).e;
            }
        }
        assert_eq!(e, recomputed);
        assert_eq!(f, recomputed_inter);
        checked += 1;
    }
    assert!(checked > 0, "no random pose was feasible");
}

// Property 5: the analytic gradient agrees with central finite differences
// over every pose variable.
#[test]
fn test_gradient_matches_finite_differences() {
    let lig = zigzag_ligand();
    let b = centered_box(40.0, 1.0);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();
    let mut scratch = Scratch::new(&lig);
    let mut g = Change::new(lig.num_active_torsions);
    let mut g_unused = Change::new(lig.num_active_torsions);
    let mut rng = StdRng::seed_from_u64(37);
    let h = 1e-5;

    let energy_of = |conf: &Conformation, scratch: &mut Scratch, g: &mut Change| -> f64 {
        lig.evaluate(conf, &sf, &b, &maps, f64::INFINITY, scratch, g)
            .expect("pose inside the large box evaluates")
            .0
    };

    let mut checked = 0;
    while checked < 5 {
        let conf = random_conformation(&lig, &mut rng);
        energy_of(&conf, &mut scratch, &mut g);
        let analytic = g.clone();

        for d in 0..3 {
            let mut plus = conf.clone();
            let mut minus = conf.clone();
            plus.position[d] += h;
            minus.position[d] -= h;
            let fd = (energy_of(&plus, &mut scratch, &mut g_unused)
                - energy_of(&minus, &mut scratch, &mut g_unused))
                / (2.0 * h);
            assert_relative_eq!(analytic.position[d], fd, max_relative = 1e-3, epsilon = 1e-6);
        }
        for d in 0..3 {
            let mut axis = Vector3::zeros();
            axis[d] = h;
            let mut plus = conf.clone();
            let mut minus = conf.clone();
            plus.orientation = UnitQuaternion::from_scaled_axis(axis) * conf.orientation;
            minus.orientation = UnitQuaternion::from_scaled_axis(-axis) * conf.orientation;
            let fd = (energy_of(&plus, &mut scratch, &mut g_unused)
                - energy_of(&minus, &mut scratch, &mut g_unused))
                / (2.0 * h);
            assert_relative_eq!(
                analytic.orientation[d],
                fd,
                max_relative = 1e-3,
                epsilon = 1e-6
            );
        }
        for t in 0..lig.num_active_torsions {
            let mut plus = conf.clone();
            let mut minus = conf.clone();
            plus.torsions[t] += h;
            minus.torsions[t] -= h;
            let fd = (energy_of(&plus, &mut scratch, &mut g_unused)
                - energy_of(&minus, &mut scratch, &mut g_unused))
                / (2.0 * h);
            assert_relative_eq!(analytic.torsions[t], fd, max_relative = 1e-3, epsilon = 1e-6);
        }
        checked += 1;
    }
}

// Property 6: a task is deterministic for a fixed seed.
#[test]
fn test_monte_carlo_task_is_deterministic() {
    let lig = zigzag_ligand();
    let b = centered_box(20.0, 0.5);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();

    let run = || {
        let pool = Mutex::new(PosePool::new(8, lig.num_heavy_atoms() as f64));
        monte_carlo_task(&pool, &lig, 7, &sf, &b, &maps);
        pool.into_inner().expect("pool lock is clean").into_poses()
    };
    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.e, b.e);
        assert_eq!(a.f, b.f);
        assert_eq!(a.heavy_atoms, b.heavy_atoms);
        assert_eq!(a.hydrogens, b.hydrogens);
    }
}

// Property 7: the pool stays sorted and cluster-separated under arbitrary
// insertion sequences.
#[test]
fn test_pool_invariants_under_random_insertions() {
    let mut rng = StdRng::seed_from_u64(5);
    let capacity = 6;
    let rse = 1.0;
    let mut pool = PosePool::new(capacity, rse);
    for _ in 0..200 {
        let pose = Pose {
            e: rng.gen_range(-10.0..10.0),
            f: 0.0,
            heavy_atoms: vec![Vector3::new(rng.gen_range(-3.0..3.0), 0.0, 0.0)],
            hydrogens: Vec::new(),
        };
        pool.push(pose);
        let poses = pool.poses();
        assert!(poses.len() <= capacity);
        for w in poses.windows(2) {
            assert!(w[0].e <= w[1].e);
        }
        for (i, a) in poses.iter().enumerate() {
            for other in &poses[i + 1..] {
                let sq = (a.heavy_atoms[0] - other.heavy_atoms[0]).norm_squared();
                assert!(sq >= rse, "clustered poses {sq} apart survived together");
            }
        }
    }
}

// A parallel docking run returns poses sorted ascending with every atom
// inside the box.
#[test]
fn test_dock_returns_sorted_feasible_poses() {
    let lig = zigzag_ligand();
    let b = centered_box(20.0, 0.5);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();
    let params = DockParams {
        num_tasks: 4,
        seed: 1,
        pool_capacity: 8,
    };
    let poses = dock(&lig, &sf, &b, &maps, &params);
    assert!(!poses.is_empty());
    for w in poses.windows(2) {
        assert!(w[0].e <= w[1].e);
    }
    for pose in &poses {
        for coord in &pose.heavy_atoms {
            assert!(b.within(coord));
        }
    }
}

// A task that never finds a feasible start contributes nothing and does not
// fail.
#[test]
fn test_infeasible_task_contributes_nothing() {
    let lig = zigzag_ligand();
    // The chain spans 4.8 A and can never fit a 1 A box.
    let b = centered_box(1.0, 0.5);
    let maps = zero_maps(&lig, &b);
    let sf = ScoringFunction::new();
    let pool = Mutex::new(PosePool::new(8, lig.num_heavy_atoms() as f64));
    monte_carlo_task(&pool, &lig, 3, &sf, &b, &maps);
    assert!(pool.into_inner().expect("pool lock is clean").is_empty());
}

// Output: MODEL framing, the REMARK energy line, spliced coordinates, and
// verbatim preservation of the remaining columns.
#[test]
fn test_write_models_splices_coordinates() {
    let text = format!(
        "ROOT\n{}\n{}\nENDROOT\nTORSDOF 0\n",
        atom_line("ATOM", 1, "C1", 0.0, 0.0, 0.0, "C"),
        atom_line("ATOM", 2, "H1", 0.0, 1.01, 0.0, "HD"),
    );
    let lig = parse(&text).expect("ligand with hydrogen parses");
    let mut conf = Conformation::new(0);
    conf.position = Vector3::new(1.234, -2.5, 3.0);
    let pose = lig.compose_result(-5.4321, -5.0, &conf);

    let dir = tempfile::tempdir().expect("temp dir");
    let out_path = dir.path().join("out.pdbqt");
    lig.write_models(&out_path, &[pose], 9)
        .expect("write succeeds");

    let written = std::fs::read_to_string(&out_path).expect("output readable");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "MODEL        1");
    assert_eq!(
        lines[1],
        "REMARK     FREE ENERGY PREDICTED BY IDOCK:  -5.432 KCAL/MOL"
    );
    assert_eq!(lines[2], "ROOT");
    // The carbon lands at the conformation position.
    let carbon = lines[3];
    assert_eq!(&carbon[30..38], "   1.234");
    assert_eq!(&carbon[38..46], "  -2.500");
    assert_eq!(&carbon[46..54], "   3.000");
    // Leading and trailing columns are preserved verbatim.
    assert!(carbon.starts_with("ATOM      1 C1"));
    assert!(carbon.trim_end().ends_with(" C"));
    // The hydrogen consumes its own coordinate sequence.
    let hydrogen = lines[4];
    assert_eq!(&hydrogen[38..46], "  -1.490");
    assert_eq!(lines[5], "ENDROOT");
    assert_eq!(lines[6], "TORSDOF 0");
    assert_eq!(lines[7], "ENDMDL");
}
