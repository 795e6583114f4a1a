//! Status and clean command implementations

use std::path::PathBuf;

use anyhow::Result;

use dirvana::config::{hash_file, hierarchy_hash};

use super::{open_engine, resolve_dir};

/// Show which configs are active for a directory
pub fn status_command(dir: Option<PathBuf>) -> Result<()> {
    let dir = resolve_dir(dir)?;
    let engine = open_engine()?;
    let chain = engine.active_chain(&dir);

    println!("Directory: {}", dir.display());
    match engine.loader().find_config_file(&dir) {
        Some(file) => {
            let state = if engine.auth().is_allowed(&dir) {
                "authorized"
            } else {
                "NOT authorized"
            };
            println!("Config:    {} ({})", file.display(), state);
        }
        None => println!("Config:    none (inherits only)"),
    }
    if let Some(global) = engine.loader().global_path() {
        println!("Global:    {}", global.display());
    }
    println!();

    if chain.is_empty() {
        println!("No active configuration.");
    } else {
        println!("Active chain ({}):", chain.links.len());
        for link in &chain.links {
            println!("  ✓ {}", link.file.display());
        }
    }
    if !chain.skipped.is_empty() {
        println!("\nSkipped (not authorized):");
        for skipped in &chain.skipped {
            println!("  ✗ {}", skipped.display());
        }
        println!("\nTip: run `dirvana allow <dir>` to trust a directory.");
    }

    if let Some(entry) = engine.cache().get(&dir) {
        let fresh = match hierarchy_hash(chain.files().as_slice()) {
            Ok(hash) => {
                let global = engine
                    .loader()
                    .global_path()
                    .filter(|p| p.is_file())
                    .and_then(|p| hash_file(p).ok());
                entry.is_hierarchy_valid(&hash, global.as_deref())
            }
            Err(_) => false,
        };
        println!(
            "\nCache: {} (written {})",
            if fresh { "fresh" } else { "stale" },
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    } else {
        println!("\nCache: empty");
    }

    Ok(())
}

/// Clear cached results
pub fn clean_command(dir: Option<PathBuf>, all: bool) -> Result<()> {
    let engine = open_engine()?;

    if all {
        engine.cache().clear()?;
        println!("✓ Cleared the whole cache");
        return Ok(());
    }

    let dir = resolve_dir(dir)?;
    let removed = engine.cache().delete_with_subdirs(&dir)?;
    println!("✓ Removed {} cache entries under {}", removed, dir.display());
    Ok(())
}
