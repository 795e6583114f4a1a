//! Allow, revoke and list commands

use std::path::PathBuf;

use anyhow::Result;

use super::{open_engine, resolve_dir};

/// Trust a directory's config
pub fn allow_command(dir: Option<PathBuf>) -> Result<()> {
    let dir = resolve_dir(dir)?;
    let mut engine = open_engine()?;

    if engine.loader().find_config_file(&dir).is_none() {
        eprintln!("Note: {} has no .dirvana config yet", dir.display());
    }

    engine.allow(&dir)?;
    println!("✓ Authorized {}", dir.display());
    Ok(())
}

/// Stop trusting a directory's config
pub fn revoke_command(dir: Option<PathBuf>) -> Result<()> {
    let dir = resolve_dir(dir)?;
    let mut engine = open_engine()?;

    if engine.revoke(&dir)? {
        println!("✓ Revoked {}", dir.display());
        println!("  Open shells unset its definitions at the next prompt.");
    } else {
        println!("{} was not authorized", dir.display());
    }
    Ok(())
}

/// List trusted directories
pub fn list_command() -> Result<()> {
    let engine = open_engine()?;
    let dirs = engine.auth().list();

    if dirs.is_empty() {
        println!("No authorized directories.");
        println!("Tip: run `dirvana allow` inside a project with a .dirvana.yml.");
        return Ok(());
    }

    println!("Authorized directories ({}):\n", dirs.len());
    for dir in dirs {
        let marker = if dir.exists() { " " } else { "?" };
        println!("  {} {}", marker, dir.display());
    }
    Ok(())
}
