//! Shell code generation
//!
//! Pure functions from merged definitions and cleanup names to script text
//! that the user's shell evaluates.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{AliasSpec, DefinedNames, MergedConfig};

/// Env variable carrying the directory of the previous export
pub const PREV_DIR_ENV: &str = "DIRVANA_PREV_DIR";

/// Supported shells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub fn name(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }
}

/// Everything to define for the current directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    pub aliases: BTreeMap<String, AliasSpec>,
    pub functions: BTreeMap<String, String>,
    pub static_env: BTreeMap<String, String>,
    /// Already evaluated `sh` variables
    pub shell_env: BTreeMap<String, String>,
}

impl Definitions {
    pub fn from_merged(merged: &MergedConfig, shell_env: BTreeMap<String, String>) -> Self {
        Self {
            aliases: merged.aliases.clone(),
            functions: merged.functions.clone(),
            static_env: merged.static_env(),
            shell_env,
        }
    }
}

/// Unset every name in `names`
pub fn render_cleanup(shell: Shell, names: &DefinedNames) -> String {
    let mut out = String::new();
    for name in &names.aliases {
        let _ = match shell {
            Shell::Bash | Shell::Zsh => writeln!(out, "unalias {} 2>/dev/null || true", name),
            Shell::Fish => writeln!(out, "functions -e {}", name),
        };
    }
    for name in &names.functions {
        let _ = match shell {
            Shell::Bash | Shell::Zsh => writeln!(out, "unset -f {} 2>/dev/null || true", name),
            Shell::Fish => writeln!(out, "functions -e {}", name),
        };
    }
    for name in &names.env {
        let _ = match shell {
            Shell::Bash | Shell::Zsh => writeln!(out, "unset {}", name),
            Shell::Fish => writeln!(out, "set -e {}", name),
        };
    }
    out
}

/// Define aliases, functions and env variables
pub fn render(shell: Shell, defs: &Definitions) -> String {
    let mut out = String::new();

    for (name, spec) in &defs.aliases {
        let command = if spec.is_conditional() {
            format!("dirvana exec {}", name)
        } else {
            spec.command.clone()
        };
        let _ = match shell {
            Shell::Bash | Shell::Zsh => writeln!(out, "alias {}={}", name, quote(shell, &command)),
            Shell::Fish => writeln!(out, "alias {} {}", name, quote(shell, &command)),
        };
    }

    for (name, body) in &defs.functions {
        let _ = match shell {
            Shell::Bash | Shell::Zsh => writeln!(out, "{}() {{\n{}\n}}", name, body.trim_end()),
            Shell::Fish => writeln!(out, "function {}\n{}\nend", name, body.trim_end()),
        };
    }

    for (name, value) in defs.static_env.iter().chain(defs.shell_env.iter()) {
        out.push_str(&export_var(shell, name, value));
    }

    out
}

/// Record `dir` as the previous directory for the next export
pub fn render_prev_dir(shell: Shell, dir: &Path) -> String {
    export_var(shell, PREV_DIR_ENV, &dir.to_string_lossy())
}

fn export_var(shell: Shell, name: &str, value: &str) -> String {
    match shell {
        Shell::Bash | Shell::Zsh => format!("export {}={}\n", name, quote(shell, value)),
        Shell::Fish => format!("set -gx {} {}\n", name, quote(shell, value)),
    }
}

/// Single-quote `value` for `shell`
pub fn quote(shell: Shell, value: &str) -> String {
    match shell {
        Shell::Bash | Shell::Zsh => format!("'{}'", value.replace('\'', r"'\''")),
        Shell::Fish => format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'")),
    }
}

/// Prompt hook that runs `dirvana export` before every prompt
pub fn hook(shell: Shell) -> String {
    match shell {
        Shell::Bash => r#"_dirvana_hook() {
  local previous_exit_status=$?
  eval "$(dirvana export --shell bash)"
  return $previous_exit_status
}
if [[ ";${PROMPT_COMMAND[*]:-};" != *";_dirvana_hook;"* ]]; then
  PROMPT_COMMAND="_dirvana_hook${PROMPT_COMMAND:+;$PROMPT_COMMAND}"
fi
"#
        .to_string(),
        Shell::Zsh => r#"_dirvana_hook() {
  eval "$(dirvana export --shell zsh)"
}
autoload -Uz add-zsh-hook
add-zsh-hook precmd _dirvana_hook
"#
        .to_string(),
        Shell::Fish => r#"function __dirvana_hook --on-event fish_prompt
    dirvana export --shell fish | source
end
"#
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defs() -> Definitions {
        let mut d = Definitions::default();
        d.aliases.insert("ll".to_string(), AliasSpec::new("ls -la"));
        let mut up = AliasSpec::new("docker compose up");
        up.when = Some(json!({"file": "compose.yml"}));
        d.aliases.insert("up".to_string(), up);
        d.functions.insert("mkcd".to_string(), "mkdir -p \"$1\" && cd \"$1\"".to_string());
        d.static_env.insert("GREETING".to_string(), "it's me".to_string());
        d.shell_env.insert("SHA".to_string(), "abc123".to_string());
        d
    }

    #[test]
    fn test_bash_definitions() {
        let out = render(Shell::Bash, &defs());
        assert!(out.contains("alias ll='ls -la'\n"));
        assert!(out.contains("alias up='dirvana exec up'\n"));
        assert!(out.contains("mkcd() {\nmkdir -p \"$1\" && cd \"$1\"\n}\n"));
        assert!(out.contains("export GREETING='it'\\''s me'\n"));
        assert!(out.contains("export SHA='abc123'\n"));
    }

    #[test]
    fn test_fish_definitions_and_cleanup() {
        let out = render(Shell::Fish, &defs());
        assert!(out.contains("alias ll 'ls -la'\n"));
        assert!(out.contains("set -gx GREETING 'it\\'s me'\n"));
        assert!(out.contains("function mkcd\n"));

        let names = DefinedNames {
            aliases: vec!["ll".to_string()],
            functions: vec!["mkcd".to_string()],
            env: vec!["SHA".to_string()],
        };
        assert_eq!(
            render_cleanup(Shell::Fish, &names),
            "functions -e ll\nfunctions -e mkcd\nset -e SHA\n"
        );
    }

    #[test]
    fn test_bash_cleanup() {
        let names = DefinedNames {
            aliases: vec!["c".to_string()],
            functions: vec![],
            env: vec!["C_VAR".to_string()],
        };
        assert_eq!(
            render_cleanup(Shell::Zsh, &names),
            "unalias c 2>/dev/null || true\nunset C_VAR\n"
        );
    }

    #[test]
    fn test_prev_dir_and_hooks() {
        assert_eq!(
            render_prev_dir(Shell::Bash, Path::new("/a/b")),
            "export DIRVANA_PREV_DIR='/a/b'\n"
        );
        assert!(hook(Shell::Zsh).contains("add-zsh-hook precmd"));
        assert!(hook(Shell::Fish).contains("--on-event fish_prompt"));
    }
}
