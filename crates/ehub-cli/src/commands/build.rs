use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use ehub_cli::OutputFormat;
use ehub_model::{BuildOptions, EnergyHub, ModelStats};
use tabwriter::TabWriter;

use super::load_case;

pub fn handle(case: &Path, format: OutputFormat, options: &BuildOptions) -> Result<()> {
    let stats = build(case, options)?;
    match format {
        OutputFormat::Table => print_table(&stats),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &stats)
                .map_err(|err| anyhow::anyhow!("serializing model stats to JSON: {err}"))?;
            println!();
            Ok(())
        }
    }
}

pub(crate) fn construct(case: &Path, options: &BuildOptions) -> Result<EnergyHub> {
    let data = load_case(case)?;
    let mut hub = EnergyHub::new(data, options.clone());
    hub.construct_model()
        .with_context(|| format!("constructing model for {}", case.display()))?;
    hub.construct_balances()
        .with_context(|| format!("constructing balances for {}", case.display()))?;
    Ok(hub)
}

fn build(case: &Path, options: &BuildOptions) -> Result<ModelStats> {
    Ok(construct(case, options)?.stats())
}

fn print_table(stats: &ModelStats) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout()).padding(2);
    writeln!(writer, "BLOCK\tPARAMETERS\tVARIABLES\tINTEGER\tCONSTRAINTS\tDISJUNCTIONS")?;
    for block in &stats.blocks {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            block.entity,
            block.stats.parameters,
            block.stats.variables,
            block.stats.integer_variables,
            block.stats.constraints,
            block.stats.disjunctions,
        )?;
    }
    writeln!(
        writer,
        "total\t{}\t{}\t{}\t{}\t{}",
        stats.totals.parameters,
        stats.totals.variables,
        stats.totals.integer_variables,
        stats.totals.constraints,
        stats.totals.disjunctions,
    )?;
    writer.flush()?;

    println!(
        "{} nodes, {} technologies, {} networks{}",
        stats.nodes,
        stats.technologies,
        stats.networks,
        if stats.needs_relaxation {
            " (disjunctions: big-M relaxation applied at solve time)"
        } else {
            ""
        }
    );
    Ok(())
}
