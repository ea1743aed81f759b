use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};
use ehub_cli::OutputFormat;
use ehub_core::{validate, Diagnostics, Severity};
use tabwriter::TabWriter;
use tracing::info;

use super::load_case;

pub fn handle(case: &Path, format: OutputFormat) -> Result<()> {
    let data = load_case(case)?;
    let diag = validate(&data);
    info!("validated {}: {}", case.display(), diag.summary());

    match format {
        OutputFormat::Table => print_table(&diag)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &diag)
                .map_err(|err| anyhow::anyhow!("serializing diagnostics to JSON: {err}"))?;
            println!();
        }
    }

    if diag.has_errors() {
        bail!("{} has {}", case.display(), diag.summary());
    }
    Ok(())
}

fn print_table(diag: &Diagnostics) -> Result<()> {
    if diag.issues.is_empty() {
        println!("{}", diag.summary());
        return Ok(());
    }
    let mut writer = TabWriter::new(io::stdout()).padding(2);
    writeln!(writer, "SEVERITY\tCATEGORY\tENTITY\tMESSAGE")?;
    for issue in &diag.issues {
        let severity = match issue.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            severity,
            issue.category,
            issue.entity.as_deref().unwrap_or("-"),
            issue.message,
        )?;
    }
    writer.flush()?;
    Ok(())
}
