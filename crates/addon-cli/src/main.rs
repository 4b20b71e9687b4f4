//! Addon manager CLI
//!
//! Thin binding of the convergence engine's operation contract to a command
//! line: `apply` converges one addon to a target state, `list` shows what is
//! installed.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Apply {
            name,
            release,
            state,
            root,
            user,
            repository_url,
            check,
            jobs,
        } => {
            commands::run_apply(name, &release, &state, root, &user, repository_url, check, jobs)
                .await
        }
        Commands::List { root, user } => commands::run_list(root, &user),
    }
}
