// SPDX-License-Identifier: GPL-3.0-only

//! Observable scanner status

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerStatus {
    #[default]
    Idle,
    Requesting,
    Scanning,
    Error,
}

impl ScannerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerStatus::Idle => "idle",
            ScannerStatus::Requesting => "requesting",
            ScannerStatus::Scanning => "scanning",
            ScannerStatus::Error => "error",
        }
    }

    /// Whether `start()` must be a no-op in this state
    pub fn is_active(&self) -> bool {
        matches!(self, ScannerStatus::Requesting | ScannerStatus::Scanning)
    }

    /// Whether `switch_camera()` is allowed in this state
    pub fn can_switch_camera(&self) -> bool {
        matches!(self, ScannerStatus::Scanning | ScannerStatus::Error)
    }
}

impl fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the message shown while in `Error`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: ScannerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatusSnapshot {
    pub fn new(status: ScannerStatus) -> Self {
        Self {
            status,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ScannerStatus::Error,
            error_message: Some(message.into()),
        }
    }
}
