//! Export command implementation

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;

use dirvana::render::PREV_DIR_ENV;
use dirvana::shell::{Approver, AutoApprove, Decline, SystemRunner, TerminalApprover};
use dirvana::{ExportRequest, Shell};

use super::{open_engine, resolve_dir};

/// Print cleanup and definitions for the current directory
pub fn export_command(shell: Shell, prev: Option<PathBuf>, yes: bool) -> Result<()> {
    let current = resolve_dir(None)?;
    let previous = prev
        .or_else(|| std::env::var_os(PREV_DIR_ENV).filter(|v| !v.is_empty()).map(PathBuf::from))
        // A deleted previous directory still needs its names unset
        .map(|p| p.canonicalize().unwrap_or(p));

    let approver: Box<dyn Approver> = if yes {
        Box::new(AutoApprove)
    } else if std::io::stderr().is_terminal() {
        Box::new(TerminalApprover)
    } else {
        Box::new(Decline)
    };

    let mut engine = open_engine()?;
    let export = engine.export(
        &ExportRequest {
            current: &current,
            previous: previous.as_deref(),
            shell,
        },
        approver.as_ref(),
        &SystemRunner,
    )?;

    if let Some(hint) = &export.hint {
        eprintln!("{}", hint);
    }
    print!("{}", export.script);
    Ok(())
}
