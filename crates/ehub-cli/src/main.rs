use anyhow::Result;
use clap::Parser;
use ehub_cli::{load_config, Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn run(cli: &Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    let level = match cli.log_level {
        Some(level) => level,
        None => config.logging.level()?,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Validate { case, format } => commands::validate::handle(case, *format),
        Commands::Build {
            case,
            format,
            allow_unimplemented,
        } => {
            if *allow_unimplemented {
                config.model.allow_unimplemented_archetypes = true;
            }
            commands::build::handle(case, *format, &config.model)
        }
        Commands::Solve {
            case,
            backend,
            relax_integrality,
            out,
        } => {
            if let Some(backend) = backend {
                config.solver.backend = *backend;
            }
            if *relax_integrality {
                config.solver.relax_integrality = true;
            }
            commands::solve::handle(case, &config.model, &config.solver, out.as_deref())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
