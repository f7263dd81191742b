//! Command-line interface for soundgraph.
//!
//! Subcommands cover the full pipeline: harvesting a seed track,
//! deriving relationships, building the personal graph, and querying it.

mod commands;

pub use commands::{run_command, Cli, Commands};
