use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use li_cli::commands::{analyze, export, merge};
use li_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Diagnostics go to stderr so merged output can be piped
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match command {
        Commands::Merge { source, output } => merge::run(&config, source, output.as_deref())?,
        Commands::Analyze { source } => {
            let stdout = std::io::stdout();
            analyze::run(&mut stdout.lock(), &config, source)?;
        }
        Commands::Export { source, csv, json } => {
            export::run(&config, source, csv.as_deref(), json.as_deref())?;
        }
    }

    Ok(())
}
