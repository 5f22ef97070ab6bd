// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use exam_scanner::{CameraBackendType, ScanPreset};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "exam-scanner")]
#[command(about = "Scan and validate exam QR codes")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Camera backend (v4l2 or still)
    #[arg(long, global = true)]
    backend: Option<CameraBackendType>,

    /// Image file or directory for the still backend
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether camera scanning is possible here
    Check,

    /// List available cameras
    List,

    /// Scan QR codes from a camera
    Scan {
        /// Camera id to use (from 'exam-scanner list')
        #[arg(short, long)]
        camera: Option<String>,

        /// Keep scanning, ignoring repeats within the cooldown
        #[arg(long)]
        continuous: bool,

        /// Check each code as an exam payload
        #[arg(long)]
        validate: bool,

        /// Scan preset (default, fast, precise, mobile)
        #[arg(short, long)]
        preset: Option<ScanPreset>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Name of the scan target, used in logs
        #[arg(long, default_value = "cli")]
        target: String,

        /// Write the scan history to this file or directory when done
        /// (the downloads folder when no path is given)
        #[arg(long, num_args = 0..=1, value_name = "PATH")]
        export: Option<Option<PathBuf>>,
    },

    /// Decode a QR code from an image file
    DecodeFile {
        path: PathBuf,

        /// Check the code as an exam payload
        #[arg(long)]
        validate: bool,
    },

    /// Validate an exam payload given as JSON text
    Validate { payload: String },

    /// Print the JSON payload for an exam QR code
    Generate {
        exam_id: String,

        #[arg(long, default_value = "1")]
        version: u32,

        /// Generate a correction slip payload for this answer sheet id
        #[arg(long, requires = "student")]
        answer: Option<String>,

        /// Student name for a correction slip payload
        #[arg(long, requires = "answer")]
        student: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=exam_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let source = cli::BackendChoice {
        backend: cli.backend,
        source: cli.source,
    };

    match cli.command {
        Commands::Check => cli::check(source),
        Commands::List => cli::list_cameras(source),
        Commands::Scan {
            camera,
            continuous,
            validate,
            preset,
            duration,
            target,
            export,
        } => cli::scan(
            source,
            cli::ScanOptions {
                camera,
                continuous,
                validate,
                preset,
                duration,
                target,
                export,
            },
        ),
        Commands::DecodeFile { path, validate } => cli::decode_file(&path, validate),
        Commands::Validate { payload } => cli::validate(&payload),
        Commands::Generate {
            exam_id,
            version,
            answer,
            student,
        } => cli::generate(&exam_id, version, answer.zip(student)),
    }
}
