// SPDX-License-Identifier: GPL-3.0-only

//! Kiosk Scanner - camera barcode scanning for self-service recycling kiosks
//!
//! The crate owns a live camera stream, samples frames on a cadence, decodes
//! one barcode symbology per frame with a native fast path and a software
//! fallback, and emits each scanned value once per debounce window.
//!
//! # Architecture
//!
//! - [`backends`]: camera platforms (V4L2, file-backed virtual camera)
//! - [`scanner`]: acquisition, sampling, decoding, debounce and the state machine
//! - [`config`]: deployment configuration
//! - [`errors`]: error types
//!
//! # Example
//!
//! ```ignore
//! let scanner = Scanner::new(ScannerConfig::load()?, default_platform(), |event| {
//!     println!("{}", event.value);
//! });
//! scanner.start().await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod scanner;

// Re-export commonly used types
pub use backends::camera::{CameraPlatform, VideoTrack, default_platform};
pub use config::ScannerConfig;
pub use errors::{CameraError, ScannerError, ScannerResult};
pub use scanner::{ScanEvent, Scanner, ScannerStatus, StatusSnapshot, Symbology};
