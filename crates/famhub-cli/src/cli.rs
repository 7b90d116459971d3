use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "famhub",
    about = "FamHub: shared family roles, tasks and shopping with live updates",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hub configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open a family with the default roles and print them
    Seed(SeedArgs),
    /// Create roles from several threads at once and verify the result
    Simulate(SimulateArgs),
    /// Apply a seeded random sequence of role mutations
    Churn(ChurnArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct SeedArgs {
    #[arg(long, default_value = "family")]
    pub family: String,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[arg(long, default_value = "family")]
    pub family: String,
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    #[arg(long, default_value_t = 25)]
    pub per_worker: usize,
}

#[derive(Args)]
pub struct ChurnArgs {
    #[arg(long, default_value = "family")]
    pub family: String,
    #[arg(long, default_value_t = 200)]
    pub ops: usize,
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}
