// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use kiosk_scanner::backends::camera::types::Facing;
use kiosk_scanner::scanner::Symbology;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "kiosk-scanner")]
#[command(about = "Camera barcode scanner for self-service recycling kiosks")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/kiosk-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan barcodes and print one JSON line per scan
    Scan {
        /// Exact label of the camera to use
        #[arg(long)]
        camera_label: Option<String>,

        /// Camera facing when no label matches (user or environment)
        #[arg(long)]
        facing: Option<Facing>,

        /// Barcode symbology (e.g. code-128, ean-13, qr-code)
        #[arg(long)]
        symbology: Option<Symbology>,

        /// Read frames from a directory of images instead of a camera
        #[arg(long)]
        source: Option<PathBuf>,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Decode barcodes in image files
    Decode {
        /// Barcode symbology (default: from config)
        #[arg(long)]
        symbology: Option<Symbology>,

        /// Image files
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        write_default: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=kiosk_scanner=debug
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
    let config_path = cli.config;

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Scan {
            camera_label,
            facing,
            symbology,
            source,
            duration,
        } => cli::scan(
            config_path.as_deref(),
            cli::ScanOverrides {
                camera_label,
                facing,
                symbology,
            },
            source,
            duration,
        ),
        Commands::Decode { symbology, images } => {
            cli::decode_images(config_path.as_deref(), symbology, &images)
        }
        Commands::Config { write_default } => cli::show_config(config_path.as_deref(), write_default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_arguments() {
        let cli = Cli::try_parse_from([
            "kiosk-scanner",
            "scan",
            "--facing",
            "environment",
            "--symbology",
            "ean-13",
            "--duration",
            "5",
        ])
        .expect("parse");

        match cli.command {
            Commands::Scan {
                facing,
                symbology,
                duration,
                source,
                ..
            } => {
                assert_eq!(facing, Some(Facing::Environment));
                assert_eq!(symbology, Some(Symbology::Ean13));
                assert_eq!(duration, Some(5));
                assert!(source.is_none());
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn test_decode_requires_images() {
        assert!(Cli::try_parse_from(["kiosk-scanner", "decode"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_symbology() {
        assert!(Cli::try_parse_from(["kiosk-scanner", "scan", "--symbology", "pdf417"]).is_err());
    }
}
