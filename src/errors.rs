// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner
//!
//! Only acquisition-level failures ever leave the scanner. Per-frame decode
//! failures are absorbed by the decode loop and never reach the caller.

use std::fmt;
use std::io;

/// Result type alias using ScannerError
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Result type alias for camera backend operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Main scanner error type
#[derive(Debug, Clone)]
pub enum ScannerError {
    /// Camera acquisition or negotiation failed
    Camera(CameraError),
    /// Operation not valid in the current scanner status
    InvalidState(String),
    /// Configuration file could not be read or parsed
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user or the operating system denied access to the camera
    PermissionDenied(String),
    /// No camera device could be found
    NoCameraAvailable,
    /// Camera is busy or in use by another process
    Busy,
    /// The device refused every stream configuration we asked for
    NegotiationFailed(String),
    /// The platform refused an advanced (quality) setting
    ConstraintRejected(String),
    /// Listing camera devices failed
    EnumerationFailed(String),
    /// The live track ended underneath us
    Disconnected,
    /// Backend error that fits none of the above
    Backend(String),
}

/// Errors raised by a single decode attempt
///
/// These never cross the scanner boundary; the engine treats them as
/// "no symbol in this frame".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder itself failed (checksum, format, internal error)
    Decoder(String),
    /// The raster frame was unusable (zero size, short buffer)
    InvalidFrame(String),
}

impl CameraError {
    /// Human-readable cause suitable for showing on the kiosk screen
    pub fn user_message(&self) -> String {
        match self {
            CameraError::PermissionDenied(_) => {
                "Camera access was denied. Allow camera access and try again.".to_string()
            }
            CameraError::NoCameraAvailable => "No camera is connected to this kiosk.".to_string(),
            CameraError::Busy => "The camera is being used by another application.".to_string(),
            CameraError::Disconnected => "The camera was disconnected.".to_string(),
            other => format!("The camera could not be started: {}", other),
        }
    }
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::Camera(e) => write!(f, "Camera error: {}", e),
            ScannerError::InvalidState(msg) => write!(f, "Invalid scanner state: {}", msg),
            ScannerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScannerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::NoCameraAvailable => write!(f, "No camera available"),
            CameraError::Busy => write!(f, "Camera is busy"),
            CameraError::NegotiationFailed(msg) => write!(f, "Stream negotiation failed: {}", msg),
            CameraError::ConstraintRejected(msg) => write!(f, "Constraint rejected: {}", msg),
            CameraError::EnumerationFailed(msg) => write!(f, "Device enumeration failed: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Decoder(msg) => write!(f, "Decoder error: {}", msg),
            DecodeError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
        }
    }
}

impl std::error::Error for ScannerError {}
impl std::error::Error for CameraError {}
impl std::error::Error for DecodeError {}

impl From<CameraError> for ScannerError {
    fn from(err: CameraError) -> Self {
        ScannerError::Camera(err)
    }
}

impl From<String> for ScannerError {
    fn from(msg: String) -> Self {
        ScannerError::Other(msg)
    }
}

impl From<&str> for ScannerError {
    fn from(msg: &str) -> Self {
        ScannerError::Other(msg.to_string())
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(err: serde_json::Error) -> Self {
        ScannerError::Config(err.to_string())
    }
}

// Device nodes report permission and busy conditions through errno
impl From<io::Error> for CameraError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(err.to_string()),
            io::ErrorKind::NotFound => CameraError::NoCameraAvailable,
            _ if err.raw_os_error() == Some(libc::EBUSY) => CameraError::Busy,
            _ => CameraError::Backend(err.to_string()),
        }
    }
}
