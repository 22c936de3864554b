//! ecupatch - Command-line tool for ECU calibration images
//!
//! Applies stage tunes and feature removals to image files, audits the
//! result and lists the configured tables.

mod commands;
mod config;
mod io;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ecupatch_core::PatchEngine;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::PatchArgs;
use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "ecupatch")]
#[command(author, version, about = "ECU calibration image patch tool")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ECUPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// YAML file with region, stage and marker tables
    #[arg(short, long, env = "ECUPATCH_TABLES")]
    tables: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch an image file
    Patch(PatchArgs),

    /// Compare an original image with a tuned one
    Compare {
        /// Original image
        original: PathBuf,

        /// Tuned image
        tuned: PathBuf,
    },

    /// Verify the checksum trailer of an image
    Verify {
        /// Image file
        file: PathBuf,
    },

    /// Identify an image and list tuning options
    Analyze {
        /// Image file
        file: PathBuf,
    },

    /// List the region table
    Regions,

    /// List the stage table
    Stages,
}

fn main() {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins over the defaults
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let no_color = cli.no_color;
    if let Err(e) = run(cli) {
        let ctx = OutputContext::new(OutputFormat::Table, no_color, false);
        ctx.error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.tables.as_deref(), cli.output, cli.no_color)?;

    // Create output context
    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    let engine = PatchEngine::new(merged.engine_config()?);
    tracing::debug!(
        regions = engine.config().regions.len(),
        stages = engine.config().stages.len(),
        tables = ?merged.tables,
        "Engine configured"
    );

    // Execute command
    match &cli.command {
        Commands::Patch(args) => {
            commands::patch(&engine, args, merged.backup_dir.as_deref(), &ctx)?;
        }

        Commands::Compare { original, tuned } => {
            commands::compare(original, tuned, &ctx)?;
        }

        Commands::Verify { file } => {
            commands::verify(file, &ctx)?;
        }

        Commands::Analyze { file } => {
            commands::analyze(file, engine.config(), &ctx)?;
        }

        Commands::Regions => {
            commands::regions(engine.config(), &ctx)?;
        }

        Commands::Stages => {
            commands::stages(engine.config(), &ctx)?;
        }
    }

    Ok(())
}
