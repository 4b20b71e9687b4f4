//! Command-line definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Converge media-center addon state to a declared desired state.
#[derive(Debug, Parser)]
#[command(name = "addonmgr", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Converge one addon (and its dependencies) to a target state
    Apply {
        /// Addon id as the repository knows it (e.g. plugin.audio.soundcloud)
        #[arg(long)]
        name: String,

        /// Platform release the catalog is fetched for (e.g. leia)
        #[arg(long)]
        release: String,

        /// Target state: present, enabled, disabled or absent
        #[arg(long, default_value = "enabled")]
        state: String,

        /// Addon storage root (defaults to the service account's data directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Service account that ends up owning installed files
        #[arg(long, default_value = "media")]
        user: String,

        /// Repository base URL
        #[arg(long, env = "ADDONMGR_REPOSITORY_URL",
              default_value = addon_repo::DEFAULT_REPOSITORY_URL)]
        repository_url: String,

        /// Print the plan without applying it
        #[arg(long)]
        check: bool,

        /// Maximum parallel package installs
        #[arg(long, default_value_t = 4)]
        jobs: usize,
    },

    /// List installed addons and their enabled state
    List {
        /// Addon storage root (defaults to the service account's data directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Service account whose data directory is inspected
        #[arg(long, default_value = "media")]
        user: String,
    },
}
