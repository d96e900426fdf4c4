//! compctl - command line front-end for the comping libraries
//!
//! Subcommands:
//! - `compctl inspect <file>` - Header and per-track summary
//! - `compctl normalize <input> <output>` - Run the normalization pipeline
//! - `compctl anchors <file>` - Prepare a reference and print its windows
//! - `compctl select <file> --chords ...` - Pick reference windows for a progression

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use compconf::CompingConfig;
use tracing::debug;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "compctl")]
#[command(about = "Inspect, normalize and window MIDI takes for comping")]
#[command(version)]
struct Cli {
    /// Config file, used instead of ./comping.toml
    #[arg(long, global = true, env = "COMPING_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Soloing,
    Salsa,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and a summary of every track
    Inspect {
        file: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Normalize a take and write it as a single-track file
    Normalize { input: PathBuf, output: PathBuf },

    /// Prepare a reference and print its windows and anchors as JSON
    Anchors {
        file: PathBuf,

        #[arg(long, value_enum, default_value = "soloing")]
        mode: Mode,

        /// Window length in eighth notes (default from config)
        #[arg(long)]
        window_eighths: Option<u64>,
    },

    /// Choose soloing windows for a chord progression, as JSON
    Select {
        /// Soloing reference file
        file: PathBuf,

        /// Comma separated chords with lengths in eighths, e.g. "Cmaj7:8,Dm7:8,G7:16"
        #[arg(long)]
        chords: String,

        /// Seed for window selection (default from config, else random)
        #[arg(long)]
        seed: Option<u64>,

        /// Window length in eighth notes (default from config)
        #[arg(long)]
        window_eighths: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = CompingConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    telemetry::init(&config.telemetry.log_level);
    debug!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "loaded configuration"
    );

    match cli.command {
        Commands::Inspect { file, json } => commands::inspect(&file, json)?,
        Commands::Normalize { input, output } => commands::normalize(&config, &input, &output)?,
        Commands::Anchors {
            file,
            mode,
            window_eighths,
        } => commands::anchors(&config, &file, mode, window_eighths)?,
        Commands::Select {
            file,
            chords,
            seed,
            window_eighths,
        } => commands::select(&config, &file, &chords, seed, window_eighths)?,
    }

    Ok(())
}
