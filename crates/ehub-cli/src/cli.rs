use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use ehub_model::Backend;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ehub", author, version, about = "Energy-hub model construction", long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides the config file)
    #[arg(long)]
    pub log_level: Option<tracing::Level>,

    /// Configuration file
    #[arg(long, default_value = "ehub.toml", value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a case file for missing or inconsistent data
    Validate {
        /// Case file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Construct the model and report its size
    Build {
        /// Case file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Build CONV1/CONV3 technologies with their common constraints only
        #[arg(long)]
        allow_unimplemented: bool,
    },
    /// Construct and solve the model
    Solve {
        /// Case file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case: PathBuf,
        /// Solver backend (defaults to the config file)
        #[arg(long)]
        backend: Option<Backend>,
        /// Solve the continuous relaxation
        #[arg(long)]
        relax_integrality: bool,
        /// Write the result JSON here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
