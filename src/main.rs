// SPDX-License-Identifier: GPL-3.0-only

use bookscan::backends::camera::{self, CameraBackendType, LensSelection};
use bookscan::config::Config;
use bookscan::constants::{app_info, file_formats};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, warn};

mod cli;

#[derive(Parser)]
#[command(name = "bookscan")]
#[command(about = "Register books by ISBN and identify them by scanning their barcode")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Use an image file as a camera instead of PipeWire; repeat for more
    /// cameras (first = back, second = front)
    #[arg(long, global = true, value_name = "IMAGE")]
    source: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive terminal interface (default)
    Terminal,

    /// List available cameras
    List,

    /// Scan one barcode with a camera and print it
    Scan {
        /// Lens to use: back or front (default from config)
        #[arg(short, long)]
        lens: Option<LensSelection>,
    },

    /// Decode a barcode from an image file
    Decode {
        /// Image file to decode
        image: PathBuf,

        /// Also look for QR codes
        #[arg(short, long)]
        all: bool,

        /// Clockwise rotation that makes the image upright
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        rotation: i32,
    },

    /// Render an ISBN-13 barcode label as PNG
    Label {
        /// ISBN-13 (or its first 12 digits)
        isbn: String,

        /// Output file path (default: ./label_ISBN_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Terminal));

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=bookscan=debug, RUST_LOG=info
    // The terminal interface owns the screen, so it only logs when asked to.
    if !interactive || std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .init();
    }

    let mut config = Config::load();
    if !cli.source.is_empty() {
        debug!(count = cli.source.len(), "Using image files as cameras");
        for path in &cli.source {
            let known = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(file_formats::is_image_extension);
            if !known {
                warn!(path = %path.display(), "Source does not look like an image file");
            }
        }
        config.backend = CameraBackendType::StillImage;
    } else if config.backend == CameraBackendType::StillImage {
        warn!("Still-image backend configured without --source, falling back to PipeWire");
        config.backend = CameraBackendType::PipeWire;
    }
    let backend = camera::get_backend(config.backend, cli.source);

    match cli.command {
        None | Some(Commands::Terminal) => {
            let runtime = tokio::runtime::Runtime::new()?;
            bookscan::terminal::run(&config, backend, runtime.handle())
        }
        Some(Commands::List) => cli::list_cameras(backend),
        Some(Commands::Scan { lens }) => cli::scan(backend, &config, lens),
        Some(Commands::Decode {
            image,
            all,
            rotation,
        }) => cli::decode_image(&image, &config, all, rotation),
        Some(Commands::Label { isbn, output }) => cli::write_label(&isbn, output),
    }
}
