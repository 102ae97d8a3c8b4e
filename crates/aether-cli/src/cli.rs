//! CLI argument definitions.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "aether",
    version,
    about = "Dependency resolution demo over a Kargo.toml-style manifest",
    long_about = "Exercises the Aether dependency resolution engine's collect -> resolve \
                  conflicts -> fetch pipeline against a local project manifest."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect the dependency graph and resolve version conflicts
    Resolve {
        /// Reject any conflict group with more than one resolved version
        #[arg(long)]
        convergent: bool,
    },

    /// Resolve the graph and download every artifact to the local repository
    Fetch {
        /// Re-verify checksums of already-cached artifacts
        #[arg(long)]
        verify: bool,
    },

    /// Print the resolved dependency tree
    Tree {
        /// Show version conflicts collapsed by the conflict resolver
        #[arg(long)]
        duplicates: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
