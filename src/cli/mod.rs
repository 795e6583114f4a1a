//! CLI command implementations

pub mod allow;
pub mod exec;
pub mod export;
pub mod init;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

use dirvana::Engine;
use dirvana::paths::{Paths, Settings};

/// Open the stores at their configured locations
pub fn open_engine() -> Result<Engine> {
    let paths = Paths::from_env();
    Engine::open(&paths, Settings::from_env())
        .with_context(|| format!("Failed to open dirvana state in {}", paths.root().display()))
}

/// Canonical form of `dir`, or of the current directory
pub fn resolve_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match dir {
        Some(d) => d,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Directory not found: {}", dir.display()))
}
