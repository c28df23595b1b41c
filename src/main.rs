//! Command-line docking driver.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use nalgebra::Vector3;
use std::path::PathBuf;

use griddock::{dock, DockParams, GridMaps, Ligand, Receptor, ScoringFunction, SearchBox};

#[derive(Parser, Debug)]
#[clap(
    name = "griddock",
    version = griddock::VERSION,
    about = "Docks flexible ligands against a rigid receptor using grid maps"
)]
struct Args {
    /// Receptor in PDBQT format
    #[clap(long)]
    receptor: PathBuf,

    /// Ligands in PDBQT format
    #[clap(long, required = true, num_args = 1..)]
    ligand: Vec<PathBuf>,

    /// Output file; defaults to <ligand stem>_out.pdbqt next to each ligand
    #[clap(long, short)]
    out: Option<PathBuf>,

    /// Output directory used when docking multiple ligands
    #[clap(long)]
    dir: Option<PathBuf>,

    /// Center of the search box, as x,y,z in Angstroms
    #[clap(
        long,
        required = true,
        value_delimiter = ',',
        num_args = 3,
        allow_hyphen_values = true
    )]
    center: Vec<f64>,

    /// Size of the search box, as x,y,z in Angstroms
    #[clap(long, required = true, value_delimiter = ',', num_args = 3)]
    size: Vec<f64>,

    /// Grid granularity in Angstroms
    #[clap(long, default_value_t = 0.15625)]
    granularity: f64,

    /// Number of independent Monte Carlo tasks per ligand
    #[clap(long, default_value_t = 64)]
    tasks: usize,

    /// Number of binding conformations to write per ligand
    #[clap(long, default_value_t = 9)]
    conformations: usize,

    /// Seed for the random number generators
    #[clap(long, default_value_t = 2016)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let center = Vector3::new(args.center[0], args.center[1], args.center[2]);
    let size = Vector3::new(args.size[0], args.size[1], args.size[2]);
    let b = SearchBox::new(center, size, args.granularity).context("invalid search box")?;
    info!(
        "search box [{:.3} {:.3} {:.3}] to [{:.3} {:.3} {:.3}], {}x{}x{} cells",
        b.corner0.x,
        b.corner0.y,
        b.corner0.z,
        b.corner1.x,
        b.corner1.y,
        b.corner1.z,
        b.num_grids[0],
        b.num_grids[1],
        b.num_grids[2]
    );

    let sf = ScoringFunction::new();

    info!("loading receptor {}", args.receptor.display());
    let receptor = Receptor::from_path(&args.receptor)
        .with_context(|| format!("failed to parse receptor {}", args.receptor.display()))?;
    info!("receptor has {} heavy atoms", receptor.atoms.len());

    let params = DockParams {
        num_tasks: args.tasks,
        seed: args.seed,
        pool_capacity: DockParams::default().pool_capacity.max(args.conformations),
    };

    // Grid maps accumulate across ligands; each ligand only pays for the
    // atom types no earlier ligand has requested.
    let mut maps = GridMaps::new();
    let mut num_docked = 0usize;

    for ligand_path in &args.ligand {
        info!("loading ligand {}", ligand_path.display());
        let lig = match Ligand::from_path(ligand_path) {
            Ok(lig) => lig,
            Err(e) => {
                error!("skipping {}: {e}", ligand_path.display());
                continue;
            }
        };

        let missing: Vec<_> = lig
            .atom_types()
            .into_iter()
            .filter(|&t| !maps.contains(t))
            .collect();
        if !missing.is_empty() {
            info!("populating {} grid map(s)", missing.len());
            receptor.populate_into(&mut maps, &b, &missing, &sf);
        }

        info!(
            "docking {} ({} heavy atoms, {} active torsions) with {} tasks",
            ligand_path.display(),
            lig.num_heavy_atoms(),
            lig.num_active_torsions,
            params.num_tasks
        );
        let poses = dock(&lig, &sf, &b, &maps, &params);
        if poses.is_empty() {
            warn!("{}: no binding conformation found", ligand_path.display());
            continue;
        }

        let out_path = match (&args.out, &args.dir) {
            (Some(out), _) => out.clone(),
            (None, Some(dir)) => {
                let stem = ligand_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "ligand".to_string());
                dir.join(format!("{stem}_out.pdbqt"))
            }
            (None, None) => {
                let stem = ligand_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "ligand".to_string());
                ligand_path.with_file_name(format!("{stem}_out.pdbqt"))
            }
        };

        let written = poses.len().min(args.conformations);
        lig.write_models(&out_path, &poses, args.conformations)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        let affinities: Vec<String> = poses
            .iter()
            .take(written)
            .map(|p| format!("{:.3}", p.e))
            .collect();
        info!(
            "{}: wrote {} conformation(s) to {}, free energies [{}] kcal/mol",
            ligand_path.display(),
            written,
            out_path.display(),
            affinities.join(", ")
        );
        num_docked += 1;
    }

    if num_docked == 0 {
        bail!("no ligand was docked successfully");
    }
    Ok(())
}
