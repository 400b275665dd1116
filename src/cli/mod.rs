//! Command-line interface for bundleplan
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `plan`: Assemble and print the build plan
//! - `explain`: Show how individual imports are resolved
//! - `init`: Project scaffolding

mod explain;
mod init;
mod plan;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use explain::ExplainCommand;
pub use init::InitCommand;
pub use plan::PlanCommand;

/// bundleplan - build plans for server bundles
#[derive(Parser, Debug)]
#[command(name = "bundleplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to bundleplan.toml config file
    #[arg(short, long, global = true, default_value = "bundleplan.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble the build plan for the project
    Plan(PlanCommand),

    /// Explain how import specifiers are resolved and chunked
    Explain(ExplainCommand),

    /// Initialize a new project
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Plan(cmd) => cmd.execute(&self.config).await,
            Commands::Explain(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the bundleplan banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "bundleplan".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
