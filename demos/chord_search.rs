//! Search for galvanized steel plates that ring a chord.
//!
//! Queues random candidates for a five-note chord and the same chord a
//! whole tone higher, roughs them at coarse grade, refines the best of
//! each target at fine grade, and writes the winners as DXF.
//!
//! Needs the CalculiX `cgx` and `ccx` executables on the path.
//!
//! Usage:
//!   cargo run --example chord_search --release -- [config.toml]

use std::error::Error;
use std::time::Instant;

use bellshape::export::{DXF_OUTLINE_LEN, write_dxf};
use bellshape::optimization::materials::sheet_material;
use bellshape::optimization::{
    BatchController, CandidateParams, InitialShape, Target, compute_cents_errors,
};
use bellshape::{AppConfig, CalculixSolver, Eigensolver, Grade, Method};

const FIT_TOLERANCE: f64 = 0.5;
const CANDIDATES_PER_TARGET: usize = 4;

fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("bellshape.toml"));
    let config = AppConfig::load_or_default(&config_path);

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║     Bell chord search                                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝\n");

    let solver = CalculixSolver::new(config.solver.clone());
    if let Err(e) = solver.check() {
        eprintln!("CalculiX is not available: {}", e);
        return Ok(());
    }

    let material = sheet_material("galvanized_steel", 8).ok_or("unknown material")?;
    let chord = Target::new(vec![220.0, 275.0, 365.2, 385.0, 512.6])?;
    let targets = [chord.clone(), chord.transposed(2)];

    println!("Material:  {} ({} mm)", material.name, material.thickness);
    println!("Targets:");
    for target in &targets {
        println!("  {}", target);
    }
    println!();

    let params = CandidateParams {
        material,
        grade: Grade::Coarse,
        method: Method::Simplex,
        settings: config.optimizer.clone(),
        shape: InitialShape::default(),
    };

    let mut controller = BatchController::new(solver, config.batch.clone())?;
    println!("Workers:   {}\n", controller.workers());
    for target in &targets {
        controller.make_candidates(target, &params, CANDIDATES_PER_TARGET)?;
    }

    let start = Instant::now();
    controller.process_candidates(FIT_TOLERANCE)?;
    println!(
        "Roughing done in {:.1?}: {} roughed, {} finished",
        start.elapsed(),
        controller.roughed().candidate_count(),
        controller.finished().candidate_count()
    );

    if !controller.roughed().is_empty() {
        let start = Instant::now();
        controller.refine_candidates()?;
        println!("Refinement done in {:.1?}", start.elapsed());
    }
    println!();

    for (i, target) in targets.iter().enumerate() {
        let Some(bell) = controller.finalist(target) else {
            println!("{}: no finalist", target);
            continue;
        };
        println!("{} -> {} ({:?})", target, bell.name(), bell.grade());
        match (bell.best_fit(), bell.best_fq()) {
            (Some(fit), Some(fq)) => {
                println!("  fitness: {:.4}", fit);
                let cents = compute_cents_errors(fq, target.frequencies());
                for ((f, t), c) in fq.iter().zip(target.frequencies()).zip(&cents) {
                    println!("  {:8.1} Hz (target {:8.1} Hz, {:+6.1} cents)", f, t, c);
                }
            }
            _ => println!("  no valid evaluation"),
        }

        let points = bell.optpts().unwrap_or(bell.c0());
        let shape = params.settings.curve.realize(points, DXF_OUTLINE_LEN)?;
        let path = format!("bell_{}.dxf", i);
        write_dxf(&shape.outline, &path)?;
        println!("  outline written to {}\n", path);
    }

    Ok(())
}
