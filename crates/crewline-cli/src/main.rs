//! `crewline`: inspect configuration, plan task manifests and preview pipelines.

mod manifest;

use clap::{Parser, Subcommand};
use crewline_agent::strategy_for;
use crewline_core::default_stages;
use crewline_orchestrator::{Orchestrator, OrchestratorConfig};
use manifest::Manifest;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crewline", about = "Crewline: multi-agent task orchestration")]
struct Cli {
    /// Path to config file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "crewline.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,
    /// Load a task manifest and print its execution plan
    Plan {
        /// Path to the TOML task manifest
        manifest: PathBuf,
    },
    /// Print the default pipeline stages
    Pipeline,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = OrchestratorConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Commands::Plan { manifest } => {
            let manifest = Manifest::load(&manifest)?;
            let orchestrator = Orchestrator::new(config);
            orchestrator.initialize();
            let keys = manifest.apply(&orchestrator)?;
            info!(tasks = keys.len(), "Manifest loaded");

            print!(
                "{}",
                manifest::render_plan(&orchestrator.get_execution_plan(), &keys)
            );
        }
        Commands::Pipeline => {
            for (index, stage) in default_stages().iter().enumerate() {
                let gate = if stage.requires_approval && index > 0 {
                    " [approval]"
                } else {
                    ""
                };
                println!(
                    "{}. {} ({}){gate}",
                    index + 1,
                    stage.title,
                    stage.role
                );
                println!("   {}", stage.description);
                println!(
                    "   tools: {}",
                    strategy_for(stage.role).tools.join(", ")
                );
            }
        }
    }

    Ok(())
}
