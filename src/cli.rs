// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing available cameras
//! - Running the scanner and printing scans as JSON lines
//! - Decoding image files once
//! - Showing or writing the configuration

use kiosk_scanner::backends::camera::CameraPlatform;
use kiosk_scanner::backends::camera::file_source::{FileSourcePlatform, load_image_as_frame};
use kiosk_scanner::backends::camera::types::Facing;
use kiosk_scanner::backends::camera::v4l2::{V4l2Platform, device_capabilities};
use kiosk_scanner::constants::app_info;
use kiosk_scanner::scanner::decoder::{DecodeEngine, DecoderStrategy, QrFastPath, profile_chain};
use kiosk_scanner::scanner::{FrameSampler, ScannerStatus, Symbology};
use kiosk_scanner::{Scanner, ScannerConfig};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line overrides for the scanner config
pub struct ScanOverrides {
    pub camera_label: Option<String>,
    pub facing: Option<Facing>,
    pub symbology: Option<Symbology>,
}

fn load_config(path: Option<&Path>) -> Result<ScannerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ScannerConfig::load_from(path)?,
        None => ScannerConfig::load()?,
    };
    Ok(config)
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = V4l2Platform::new().enumerate_devices()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let label = if camera.has_label() {
            camera.label.as_str()
        } else {
            "(label unavailable, no permission)"
        };
        println!("  [{}] {}", index, label);
        println!("      Device: {}", camera.id);
        if let Some(info) = &camera.device_info
            && !info.driver.is_empty()
        {
            println!("      Driver: {}", info.driver);
        }
        if let Some(facing) = camera.facing {
            println!("      Facing: {}", facing);
        }

        let hints = device_capabilities(camera).supported_hints();
        if !hints.is_empty() {
            let names: Vec<_> = hints.iter().map(|h| h.name()).collect();
            println!("      Continuous: {}", names.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Run the scanner until Ctrl+C, the duration elapses or the camera fails
pub fn scan(
    config_path: Option<&Path>,
    overrides: ScanOverrides,
    source: Option<PathBuf>,
    duration: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    if let Some(label) = overrides.camera_label {
        config.camera_label = Some(label);
    }
    if let Some(facing) = overrides.facing {
        config.facing = facing;
    }
    if let Some(symbology) = overrides.symbology {
        config.symbology = symbology;
    }

    let platform: Arc<dyn CameraPlatform> = match source {
        Some(dir) => Arc::new(FileSourcePlatform::new(dir)),
        None => Arc::new(V4l2Platform::new()),
    };

    info!(version = app_info::version(), symbology = %config.symbology, "Starting scan");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let scanner = Scanner::new(config, platform, |event| {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("Failed to serialize scan: {}", e),
            }
        });

        if let Err(e) = scanner.start().await {
            eprintln!(
                "{}",
                scanner.error_message().unwrap_or_else(|| e.to_string())
            );
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }

        eprintln!("Scanning... (press Ctrl+C to stop)");

        let mut status = scanner.subscribe_status();
        let deadline = async {
            match duration {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = deadline => {}
            _ = status.wait_for(|s| s.status == ScannerStatus::Error) => {
                eprintln!("{}", scanner.error_message().unwrap_or_default());
            }
        }

        let stats = scanner.stats();
        eprintln!(
            "Sampled {} frames, emitted {} scans, suppressed {} duplicates",
            stats.frames_sampled, stats.scans_emitted, stats.duplicates_suppressed
        );
        scanner.stop();
        Ok(())
    })
}

/// Decode the first barcode in each image file
pub fn decode_images(
    config_path: Option<&Path>,
    symbology: Option<Symbology>,
    images: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let symbology = symbology.unwrap_or(config.symbology);
    let strategy = DecoderStrategy::resolve(
        Some(Arc::new(QrFastPath::new())),
        symbology,
        config.native_fast_path,
    );
    let engine = DecodeEngine::new(
        symbology,
        strategy,
        profile_chain(config.fallback_profiles, config.fixed_threshold),
    );
    let mut sampler = FrameSampler::new(config.max_frame_dimension);

    for path in images {
        let line = match load_image_as_frame(path) {
            Ok(frame) => match sampler.sample(Some(&frame)).and_then(|r| engine.decode(&r)) {
                Some(symbol) => json!({
                    "file": path.display().to_string(),
                    "value": symbol.text,
                    "symbology": symbol.symbology,
                    "decoder": symbol.path,
                }),
                None => json!({ "file": path.display().to_string(), "value": null }),
            },
            Err(e) => json!({ "file": path.display().to_string(), "error": e.to_string() }),
        };
        println!("{}", line);
    }

    Ok(())
}

/// Print the effective configuration, or write the defaults
pub fn show_config(
    config_path: Option<&Path>,
    write_default: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .or_else(ScannerConfig::default_path);

    if write_default {
        let path = path.ok_or("No config directory available")?;
        ScannerConfig::default().save_to(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(config_path)?;
    println!("# kiosk-scanner {}", app_info::version());
    if let Some(path) = &path {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
