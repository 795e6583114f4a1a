//! Conditional aliases
//!
//! An alias may carry a `when` tree. It is only evaluated when the alias is
//! run through `dirvana exec`, never while merging or checking the cache.
//!
//! ```yaml
//! when:
//!   all:
//!     - file: package.json
//!     - any:
//!         - var: CI
//!         - command: docker
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::AliasSpec;
use crate::error::ConditionError;

const ATOMIC_KEYS: &[&str] = &["file", "dir", "var", "command"];
const COMPOSITE_KEYS: &[&str] = &["all", "any", "not"];

/// What a condition is evaluated against
#[derive(Debug, Clone)]
pub struct ConditionContext {
    pub env: HashMap<String, String>,
    pub working_dir: PathBuf,
}

impl ConditionContext {
    pub fn from_process(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            env: std::env::vars().collect(),
            working_dir: working_dir.into(),
        }
    }
}

/// Pass/fail with a per-predicate breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub passed: bool,
    pub explanation: String,
}

/// Evaluates a `when` tree
pub trait ConditionEvaluator {
    fn evaluate(&self, tree: &Value, ctx: &ConditionContext) -> Result<Outcome, ConditionError>;
}

/// Supports `file`, `dir`, `var`, `command`, `all`, `any`, `not`
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEvaluator;

impl ConditionEvaluator for BuiltinEvaluator {
    fn evaluate(&self, tree: &Value, ctx: &ConditionContext) -> Result<Outcome, ConditionError> {
        let condition = Condition::parse(tree)?;
        let mut explanation = String::new();
        let passed = condition.eval(ctx, 0, &mut explanation);
        Ok(Outcome {
            passed,
            explanation,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    File(String),
    Dir(String),
    Var(String),
    Command(String),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    fn parse(value: &Value) -> Result<Self, ConditionError> {
        let Value::Object(map) = value else {
            return Err(ConditionError::Malformed(format!(
                "expected a mapping, got {}",
                value
            )));
        };

        if let Some(unknown) = map
            .keys()
            .find(|k| !ATOMIC_KEYS.contains(&k.as_str()) && !COMPOSITE_KEYS.contains(&k.as_str()))
        {
            return Err(ConditionError::Malformed(format!("unknown key '{}'", unknown)));
        }

        let has_atomic = map.keys().any(|k| ATOMIC_KEYS.contains(&k.as_str()));
        let has_composite = map.keys().any(|k| COMPOSITE_KEYS.contains(&k.as_str()));
        if has_atomic && has_composite {
            return Err(ConditionError::Malformed(
                "cannot mix atomic (file/dir/var/command) and composite (all/any/not) keys at one level"
                    .to_string(),
            ));
        }

        let mut parts = Vec::with_capacity(map.len());
        for (key, val) in map {
            let part = match key.as_str() {
                "file" => Condition::File(string(key, val)?),
                "dir" => Condition::Dir(string(key, val)?),
                "var" => Condition::Var(string(key, val)?),
                "command" => Condition::Command(string(key, val)?),
                "all" => Condition::All(list(key, val)?),
                "any" => Condition::Any(list(key, val)?),
                "not" => Condition::Not(Box::new(Condition::parse(val)?)),
                _ => unreachable!("keys validated above"),
            };
            parts.push(part);
        }

        match parts.len() {
            0 => Err(ConditionError::Malformed("empty condition".to_string())),
            1 => Ok(parts.remove(0)),
            _ => Ok(Condition::All(parts)),
        }
    }

    fn eval(&self, ctx: &ConditionContext, depth: usize, out: &mut String) -> bool {
        let indent = "  ".repeat(depth);
        let (passed, label) = match self {
            Condition::File(p) => (ctx.working_dir.join(p).is_file(), format!("file {}", p)),
            Condition::Dir(p) => (ctx.working_dir.join(p).is_dir(), format!("dir {}", p)),
            Condition::Var(name) => (
                ctx.env.get(name).is_some_and(|v| !v.is_empty()),
                format!("var {}", name),
            ),
            Condition::Command(cmd) => (on_path(cmd, ctx), format!("command {}", cmd)),
            Condition::All(items) | Condition::Any(items) => {
                let is_all = matches!(self, Condition::All(_));
                let mut body = String::new();
                let results: Vec<bool> = items
                    .iter()
                    .map(|c| c.eval(ctx, depth + 1, &mut body))
                    .collect();
                let passed = if is_all {
                    results.iter().all(|r| *r)
                } else {
                    results.iter().any(|r| *r)
                };
                let _ = writeln!(out, "{}{} {}", indent, mark(passed), if is_all { "all" } else { "any" });
                out.push_str(&body);
                return passed;
            }
            Condition::Not(inner) => {
                let mut body = String::new();
                let passed = !inner.eval(ctx, depth + 1, &mut body);
                let _ = writeln!(out, "{}{} not", indent, mark(passed));
                out.push_str(&body);
                return passed;
            }
        };
        let _ = writeln!(out, "{}{} {}", indent, mark(passed), label);
        passed
    }
}

fn mark(passed: bool) -> &'static str {
    if passed { "✓" } else { "✗" }
}

fn string(key: &str, value: &Value) -> Result<String, ConditionError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConditionError::Malformed(format!("'{}' expects a string", key)))
}

fn list(key: &str, value: &Value) -> Result<Vec<Condition>, ConditionError> {
    let items = value
        .as_array()
        .ok_or_else(|| ConditionError::Malformed(format!("'{}' expects a list", key)))?;
    if items.is_empty() {
        return Err(ConditionError::Malformed(format!("'{}' must not be empty", key)));
    }
    items.iter().map(Condition::parse).collect()
}

fn on_path(cmd: &str, ctx: &ConditionContext) -> bool {
    if cmd.contains('/') {
        return ctx.working_dir.join(cmd).is_file();
    }
    let Some(path) = ctx.env.get("PATH") else {
        return false;
    };
    std::env::split_paths(path).any(|dir| is_executable(&dir.join(cmd)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// What running an alias resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Run(String),
    /// Condition failed and there is no fallback
    Blocked(String),
}

/// Pick the command to run for an alias
pub fn resolve_alias(
    spec: &AliasSpec,
    evaluator: &dyn ConditionEvaluator,
    ctx: &ConditionContext,
) -> Result<Resolution, ConditionError> {
    let Some(tree) = &spec.when else {
        return Ok(Resolution::Run(spec.command.clone()));
    };
    let outcome = evaluator.evaluate(tree, ctx)?;
    if outcome.passed {
        return Ok(Resolution::Run(spec.command.clone()));
    }
    match &spec.fallback {
        Some(fallback) => Ok(Resolution::Run(fallback.clone())),
        None => Ok(Resolution::Blocked(outcome.explanation)),
    }
}
