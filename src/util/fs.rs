//! Filesystem utilities.

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};

/// Check whether `path` names a regular file.
pub fn is_regular(path: &str) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}

/// Write a string to a new file; fails if the file already exists.
pub fn write_new(path: &str, contents: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to create: {path}"))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write to: {path}"))
}

/// Write a string to a file, replacing any existing contents.
pub fn write_string(path: &str, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write to: {path}"))
}

/// The user's home directory, if one is configured.
pub fn home_dir() -> Option<String> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_string_lossy().into_owned())
}
