// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=KIOSK_SCANNER_VERSION");

    // Kiosk image builds stamp the version explicitly
    let version = std::env::var("KIOSK_SCANNER_VERSION").unwrap_or_else(|_| stamped_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Package version with the short commit hash, when built from a checkout
fn stamped_version() -> String {
    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    match short_commit() {
        Some(hash) => format!("{}-{}", package, hash),
        None => package,
    }
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|hash| !hash.is_empty())
}
