//! Exec command: run an alias after checking its condition

use std::process::Command;

use anyhow::{Context, Result, bail};

use dirvana::condition::{BuiltinEvaluator, ConditionContext, Resolution, resolve_alias};

use super::{open_engine, resolve_dir};

/// Run alias or function `name` with `args`; returns the exit code
pub fn exec_command(name: &str, args: &[String]) -> Result<i32> {
    let cwd = resolve_dir(None)?;
    let engine = open_engine()?;
    let merged = engine.merged_for(&cwd)?;

    let script = if let Some(spec) = merged.aliases.get(name) {
        let ctx = ConditionContext::from_process(&cwd);
        match resolve_alias(spec, &BuiltinEvaluator, &ctx)? {
            Resolution::Run(command) => command,
            Resolution::Blocked(explanation) => {
                eprintln!("dirvana: condition for '{}' not met:", name);
                eprint!("{}", explanation);
                return Ok(1);
            }
        }
    } else if let Some(body) = merged.functions.get(name) {
        format!("{}() {{\n{}\n}}\n{}", name, body.trim_end(), name)
    } else {
        bail!("No alias or function '{}' is active in {}", name, cwd.display());
    };

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{} \"$@\"", script))
        .arg(name)
        .args(args)
        .current_dir(&cwd)
        .status()
        .with_context(|| format!("Failed to run '{}'", name))?;

    Ok(status.code().unwrap_or(1))
}
