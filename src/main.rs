//! Soundgraph - a personal social-graph harvester for a music platform.
//!
//! Crawls the public engagement graph around a seed track (likers,
//! reposters, playlists, label catalogs), caches everything in SQLite,
//! derives multi-layer relationships, and answers graph queries over the
//! result.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod harvest;
pub mod model;
pub mod process;
pub mod source;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("soundgraph=info".parse()?))
        .init();

    cli::run_command(&args)
}
