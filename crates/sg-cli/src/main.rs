use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sg_cli::commands::query::OutputOptions;
use sg_cli::commands::{close_open, query, run};
use sg_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    // Logs go to stderr so query output on stdout stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    match cli.command {
        Some(Commands::Run) => {
            let db = Arc::new(config.open_database()?);
            let stats = run::run(db)?;
            tracing::debug!(?stats, "tracker exited");
        }
        Some(Commands::Leaderboard {
            guild,
            channel,
            ephemeral,
            json,
        }) => {
            let db = config.open_database()?;
            query::leaderboard(
                &mut stdout,
                db,
                guild,
                channel,
                OutputOptions { ephemeral, json },
                Utc::now(),
            )?;
        }
        Some(Commands::Total {
            guild,
            user,
            channel,
            ephemeral,
            json,
        }) => {
            let db = config.open_database()?;
            query::total(
                &mut stdout,
                db,
                guild,
                user,
                channel,
                OutputOptions { ephemeral, json },
                Utc::now(),
            )?;
        }
        Some(Commands::CloseOpen) => {
            let db = config.open_database()?;
            close_open::run(&mut stdout, db, Utc::now())?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
