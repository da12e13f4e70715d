use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Clio inference output tooling.
#[derive(Parser)]
#[command(
    name = "clio",
    version,
    about = "Tools over persisted particle-filter and MCMC output"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Summarize the fields of an output file.
    Inspect(InspectArgs),
    /// Dump a field range as CSV on stdout.
    Extract(ExtractArgs),
}

/// Arguments for the `inspect` subcommand.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the NetCDF output file.
    pub input: PathBuf,
}

/// Arguments for the `extract` subcommand.
#[derive(clap::Args)]
pub struct ExtractArgs {
    /// Path to the NetCDF output file.
    pub input: PathBuf,

    /// Field to extract (e.g. "time", "logweight", "x_0").
    #[arg(short, long)]
    pub field: String,

    /// First index to extract.
    #[arg(short, long, default_value_t = 0)]
    pub start: usize,

    /// Number of indices to extract; defaults to the remainder of the
    /// field.
    #[arg(short, long)]
    pub count: Option<usize>,
}
