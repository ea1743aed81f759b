use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use ehub_model::{solve, BuildOptions, SolverOptions};
use tracing::info;

use super::build::construct;

pub fn handle(
    case: &Path,
    model: &BuildOptions,
    solver: &SolverOptions,
    out: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();
    let hub = construct(case, model)?;
    let solution = solve(&hub, solver)
        .with_context(|| format!("solving {} with {}", case.display(), solver.backend))?;
    let summary = solution.summary(&hub);
    info!(
        "solved {} in {:.2?}: objective {:.4}",
        case.display(),
        start.elapsed(),
        summary.objective
    );

    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &summary)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => {
            serde_json::to_writer_pretty(io::stdout(), &summary)
                .map_err(|err| anyhow::anyhow!("serializing solution to JSON: {err}"))?;
            println!();
        }
    }
    Ok(())
}
