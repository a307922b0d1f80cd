//! Lattix command-line interface.
//!
//! ## Commands
//!
//! - `lattix solve` - Solve a generated Poisson problem
//! - `lattix load <dir>` - Solve a hierarchy stored in a directory
//! - `lattix generate <dir>` - Write a Poisson hierarchy to a directory

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{SolverArgs, generate, load, solve};

/// Geometric multigrid solver for structured grids
#[derive(Parser)]
#[command(name = "lattix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the Poisson model problem on the unit square
    Solve {
        /// Finest level; level l has (2^l + 1)^2 nodes
        #[arg(short, long, default_value_t = 6)]
        level: u32,

        /// Discretisation: five-point or q1
        #[arg(long, default_value = "q1")]
        stencil: String,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Solve a hierarchy stored in a directory
    Load {
        /// Directory holding poisson_A_<l>.ell, poisson_prol_<l>.ell and poisson_rhs
        dir: PathBuf,

        /// Finest level stored in the directory
        #[arg(short, long)]
        level: u32,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Write a generated Poisson hierarchy to a directory
    #[command(alias = "gen")]
    Generate {
        /// Output directory (created if missing)
        dir: PathBuf,

        /// Finest level
        #[arg(short, long, default_value_t = 6)]
        level: u32,

        /// Discretisation: five-point or q1
        #[arg(long, default_value = "q1")]
        stencil: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Commands::Solve {
            level,
            stencil,
            solver,
        } => solve(level, &stencil, &solver),
        Commands::Load { dir, level, solver } => load(&dir, level, &solver),
        Commands::Generate {
            dir,
            level,
            stencil,
        } => generate(&dir, level, &stencil),
    }
}
