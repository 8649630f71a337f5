use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd_allocate;
mod cmd_validate;

#[derive(Parser)]
#[command(name = "rollout-groups", about = "Rollout group allocation and validation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a number of targets evenly into groups
    Allocate {
        /// Number of targets to distribute
        #[arg(long)]
        targets: i64,

        /// Number of groups
        #[arg(long)]
        groups: i64,

        /// Print the counts as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Validate the groups of a plan.toml against a fleet
    Validate {
        /// Path to the plan.toml file
        #[arg(long)]
        plan: PathBuf,

        /// Path to rollout.toml (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fleet JSONL file (overrides `fleet` in the plan)
        #[arg(long)]
        fleet: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Allocate {
            targets,
            groups,
            json,
        } => cmd_allocate::run(targets, groups, json),
        Commands::Validate {
            plan,
            config,
            fleet,
        } => {
            let valid = cmd_validate::run(plan, config, fleet).await?;
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
