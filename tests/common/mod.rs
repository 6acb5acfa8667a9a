#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use assert_cmd::Command;
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fresh home directory for config and lease files.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

/// The shell in script mode, reading commands from stdin.
pub fn script_cmd(home: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("nightswap_cli").expect("binary built");
    cmd.env("NIGHTSWAP_CLI_SCRIPT", "1")
        .env("NIGHTSWAP_HOME", home)
        .env_remove("RUST_LOG");
    cmd
}

/// Feb 10..16 2026 alternating Alex, Sarah: Alex holds the 10th, 12th, 14th.
pub const OPEN_LOFT: &str = "lease Loft 2026-02-10 2026-02-16 50 Alex Sarah\n";
