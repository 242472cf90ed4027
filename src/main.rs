// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use codescan::{FacingMode, ResultMode, Symbology};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "codescan")]
#[command(about = "Scan QR and Code 39 barcodes from a camera or image files")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Configuration file (default: ~/.config/codescan/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a live camera (or a looped set of images) until a result
    Scan {
        /// V4L2 capture node
        #[arg(short, long)]
        device: Option<String>,

        /// Scan these image files instead of a camera (repeatable)
        #[arg(short, long)]
        image: Vec<PathBuf>,

        /// Formats to scan for, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        formats: Option<Vec<Symbology>>,

        /// stop-once, stop-on-valid or continuous
        #[arg(short, long)]
        mode: Option<ResultMode>,

        /// Expected payload for stop-on-valid
        #[arg(short, long)]
        key: Option<String>,

        /// Software sampling rate (samples per second)
        #[arg(long)]
        fps: Option<u32>,

        /// Preferred camera direction (environment or user)
        #[arg(long, value_parser = parse_facing)]
        facing: Option<FacingMode>,

        /// Print frame dimensions on every tick
        #[arg(long)]
        heartbeat: bool,
    },

    /// Decode a single image file
    Decode {
        /// Image to decode
        image: PathBuf,

        /// Formats to try, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        formats: Option<Vec<Symbology>>,
    },

    /// List supported formats and the backends that read them
    Formats,
}

fn parse_facing(s: &str) -> Result<FacingMode, String> {
    match s.trim().to_lowercase().as_str() {
        "environment" | "back" | "rear" => Ok(FacingMode::Environment),
        "user" | "front" => Ok(FacingMode::User),
        other => Err(format!("unknown facing mode '{}'", other)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=codescan=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            device,
            image,
            formats,
            mode,
            key,
            fps,
            facing,
            heartbeat,
        } => cli::scan(
            config,
            cli::ScanArgs {
                device,
                images: image,
                formats,
                mode,
                key,
                fps,
                facing,
                heartbeat,
            },
        ),
        Commands::Decode { image, formats } => cli::decode(&config, &image, formats),
        Commands::Formats => cli::list_formats(),
    }
}
