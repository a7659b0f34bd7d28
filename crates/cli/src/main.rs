//! Container infrastructure CLI
//!
//! Composes the container and instance stacks from configuration and
//! synthesizes them into a cloud assembly.

mod commands;
mod config;
mod output;
mod stacks;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{list, resources, synth};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Container infrastructure CLI
#[derive(Parser)]
#[command(name = "infra")]
#[command(author, version, about = "Compose and synthesize container infrastructure stacks", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./infra.toml when present)
    #[arg(long, env = "INFRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cloud assembly output directory
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Context override, e.g. `vpc_name=shared` (repeatable)
    #[arg(long = "context", short = 'c', value_name = "KEY=VALUE", value_parser = config::parse_key_value)]
    pub context: Vec<(String, String)>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the stacks this binary composes
    List,

    /// Synthesize stacks into the cloud assembly directory
    Synth {
        /// Stacks to synthesize (all when omitted)
        stacks: Vec<String>,

        /// Print composition metrics after synthesis
        #[arg(long)]
        metrics: bool,
    },

    /// List the resources of one stack
    Resources {
        /// Stack name
        stack: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut overrides = cli.context.clone();
    if let Some(out) = &cli.out {
        overrides.push(("out_dir".to_string(), out.display().to_string()));
    }
    let config = config::AppConfig::load(cli.config.as_deref(), &overrides)?;

    init_tracing(cli.log_json || config.log_json);
    debug!(
        out_dir = %config.out_dir.display(),
        context_file = %config.context_file.display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::List => list::list_stacks(&config, cli.format)?,
        Commands::Synth { stacks, metrics } => {
            synth::synth(&config, &stacks, metrics, cli.format)?
        }
        Commands::Resources { stack } => {
            resources::list_resources(&config, &stack, cli.format)?
        }
    }

    Ok(())
}
