//! Playdeck CLI - Headless Playback Controller
//!
//! Features:
//! - Source resolution against a page configuration
//! - Hosted stream list inspection
//! - Scripted playback sessions on a simulated backing player

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod script;

/// Playdeck CLI - Video playback controller toolkit
#[derive(Parser)]
#[command(name = "playdeck")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Resolve, inspect and simulate video playback", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve which source a configuration plays
    Resolve {
        /// Path to a JSON player configuration
        config: PathBuf,

        /// Container formats the simulated runtime can decode
        #[arg(short, long, default_value = "mp4,webm")]
        playable: String,

        /// JSON preference store to read and update
        #[arg(short, long)]
        store: Option<PathBuf>,
    },

    /// Parse a hosted stream list (`id:speed,id:speed,...`)
    Speeds {
        /// Stream list
        streams: String,
    },

    /// Run a scripted session against the simulated backing player
    Simulate {
        /// Path to a JSON player configuration
        config: PathBuf,

        /// Steps separated by ';' (play, pause, toggle, seek N, speed L,
        /// volume V, mute, fullscreen, stall, end, wait MS, or a command path)
        #[arg(long, default_value = "play;wait 1000;seek 30;speed 1.5;wait 500;pause")]
        script: String,

        /// Container formats the simulated runtime can decode
        #[arg(short, long, default_value = "mp4,webm")]
        playable: String,

        /// JSON preference store to read and update
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Media duration in seconds when the source does not report one
        #[arg(short, long, default_value = "300")]
        duration: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    playdeck_core::init();

    match cli.command {
        Commands::Resolve { config, playable, store } => {
            commands::resolve(&config, &playable, store, &cli.format).await?;
        }
        Commands::Speeds { streams } => {
            commands::speeds(&streams, &cli.format)?;
        }
        Commands::Simulate { config, script, playable, store, duration } => {
            commands::simulate(&config, &script, &playable, store, duration, &cli.format).await?;
        }
    }

    Ok(())
}
