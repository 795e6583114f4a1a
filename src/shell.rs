//! Evaluation of `sh` env variables
//!
//! Commands only run after the authorization store confirms the exact
//! command set was approved for the directory. Each command is bounded by
//! a timeout so a hung command cannot block the prompt forever.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::auth::AuthStore;
use crate::error::ShellApprovalError;

/// Runs a shell command and returns its stdout
pub trait CommandRunner {
    fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<String, String>;
}

/// Runs commands with `sh -c`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<String, String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn sh: {}", e))?;

        // Drain pipes on threads so a chatty command cannot fill them and stall
        let (tx, rx) = mpsc::channel();
        spawn_reader(child.stdout.take(), Pipe::Stdout, tx.clone());
        spawn_reader(child.stderr.take(), Pipe::Stderr, tx);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {}s", timeout.as_secs()));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                Err(e) => return Err(format!("failed to wait for command: {}", e)),
            }
        };

        // A background process started by the command can keep a pipe open
        // after `sh` exits; the deadline bounds that wait too
        let mut out = String::new();
        let mut err = String::new();
        for _ in 0..2 {
            let remaining = deadline
                .saturating_duration_since(Instant::now())
                .max(PIPE_GRACE);
            match rx.recv_timeout(remaining) {
                Ok((Pipe::Stdout, text)) => out = text,
                Ok((Pipe::Stderr, text)) => err = text,
                Err(_) => {
                    return Err(format!(
                        "output still open after {}s (background process?)",
                        timeout.as_secs()
                    ));
                }
            }
        }

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(format!("exit status {}: {}", code, err.trim()));
        }

        // Same as `$(...)`: trailing newlines are stripped
        Ok(out.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Wait for pipe readers that finish just after the process exits
const PIPE_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Read `pipe` to the end on a detached thread and send the text over `tx`
fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>, which: Pipe, tx: Sender<(Pipe, String)>) {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        let _ = tx.send((which, buf));
    });
}

/// Asks the user whether a command set may run
pub trait Approver {
    fn approve(&self, dir: &Path, commands: &BTreeMap<String, String>)
    -> Result<bool, ShellApprovalError>;
}

/// Approves everything (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Approver for AutoApprove {
    fn approve(&self, _dir: &Path, _commands: &BTreeMap<String, String>) -> Result<bool, ShellApprovalError> {
        Ok(true)
    }
}

/// Declines everything; used when no terminal is available
#[derive(Debug, Clone, Copy, Default)]
pub struct Decline;

impl Approver for Decline {
    fn approve(&self, _dir: &Path, _commands: &BTreeMap<String, String>) -> Result<bool, ShellApprovalError> {
        Ok(false)
    }
}

/// Prompts on the controlling terminal; stdout belongs to the shell's `eval`
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalApprover;

impl Approver for TerminalApprover {
    fn approve(&self, dir: &Path, commands: &BTreeMap<String, String>) -> Result<bool, ShellApprovalError> {
        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .map_err(ShellApprovalError::Prompt)?;
        let mut out = &tty;

        writeln!(out, "dirvana: {} wants to run these commands:", dir.display())
            .map_err(ShellApprovalError::Prompt)?;
        for (name, command) in commands {
            writeln!(out, "  {} = $({})", name, command).map_err(ShellApprovalError::Prompt)?;
        }
        write!(out, "Allow? [y/N] ").map_err(ShellApprovalError::Prompt)?;
        out.flush().map_err(ShellApprovalError::Prompt)?;

        let mut answer = String::new();
        BufReader::new(&tty)
            .read_line(&mut answer)
            .map_err(ShellApprovalError::Prompt)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// Make sure `commands` is approved for `dir`, asking the user if needed
pub fn ensure_approved(
    auth: &mut AuthStore,
    dir: &Path,
    commands: &BTreeMap<String, String>,
    approver: &dyn Approver,
) -> Result<(), ShellApprovalError> {
    if !auth.requires_shell_approval(dir, commands) {
        return Ok(());
    }
    if !approver.approve(dir, commands)? {
        return Err(ShellApprovalError::Declined(dir.to_path_buf()));
    }
    auth.approve_shell_commands(dir, commands)?;
    Ok(())
}

/// Run every command; failed commands are skipped with a warning
pub fn evaluate(
    commands: &BTreeMap<String, String>,
    cwd: &Path,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for (name, command) in commands {
        match runner.run(command, cwd, timeout) {
            Ok(value) => {
                debug!("Evaluated {}", name);
                values.insert(name.clone(), value);
            }
            Err(e) => warn!("Skipping env {}: '{}' failed: {}", name, command, e),
        }
    }
    values
}
