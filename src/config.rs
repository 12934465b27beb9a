// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::Facing;
use crate::constants::scanning;
use crate::errors::{ScannerError, ScannerResult};
use crate::scanner::decoder::Symbology;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user config dir
const CONFIG_DIR_NAME: &str = "kiosk-scanner";
const CONFIG_FILE_NAME: &str = "config.json";

/// Deployment configuration for a scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Camera facing requested when no labelled device matches
    pub facing: Facing,
    /// Label of the kiosk's physical camera, matched exactly
    pub camera_label: Option<String>,
    /// Barcode symbology printed on deposited items
    pub symbology: Symbology,
    /// Minimum time between two emissions of the same value
    pub debounce_ms: u64,
    /// Minimum time between the starts of two decode attempts
    pub decode_interval_ms: u64,
    /// Longest raster side handed to the decoders
    pub max_frame_dimension: u32,
    /// Try the fallback tuning profiles when the primary one finds nothing
    pub fallback_profiles: bool,
    /// Threshold for the fixed-threshold profile
    pub fixed_threshold: u8,
    /// Use the platform's native detector when it supports the symbology
    pub native_fast_path: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            facing: Facing::User,
            camera_label: None,
            symbology: Symbology::Code128,
            debounce_ms: scanning::DEFAULT_DEBOUNCE_MS,
            decode_interval_ms: scanning::DEFAULT_DECODE_INTERVAL_MS,
            max_frame_dimension: scanning::MAX_FRAME_DIMENSION,
            fallback_profiles: true,
            fixed_threshold: scanning::DEFAULT_FIXED_THRESHOLD,
            native_fast_path: true,
        }
    }
}

impl ScannerConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn decode_interval(&self) -> Duration {
        Duration::from_millis(self.decode_interval_ms)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the config from the default location, falling back to defaults
    pub fn load() -> ScannerResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the config from `path`
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load_from(path: &Path) -> ScannerResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ScannerError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Self = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> ScannerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScannerError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| ScannerError::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }
}
