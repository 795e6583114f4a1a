//! Init command implementation

use anyhow::{Context, Result, bail};
use tracing::info;

use dirvana::config::CONFIG_NAMES;

use super::resolve_dir;

/// Default configuration content for dirvana init
pub const DEFAULT_CONFIG: &str = r#"# Dirvana configuration
# =====================
#
# Loaded when you cd into this directory (after `dirvana allow`), unloaded
# when you leave. Subdirectories inherit these definitions and may override
# them with their own .dirvana.yml.

# Discard everything inherited from parent directories
local_only: false

# Do not apply ~/.dirvana/global.yml in this tree
ignore_global: false

aliases:
  # Short form: name: command
  ll: ls -la

  # Long form:
  #   command     - what to run
  #   completion  - command to borrow completion from, or false to disable
  #   when / else - only run when the condition holds, otherwise run `else`
  #
  # up:
  #   command: docker compose up
  #   completion: docker
  #   when:
  #     file: compose.yml
  #   else: echo "no compose.yml here"

functions:
  # mkcd: |
  #   mkdir -p "$1" && cd "$1"

env:
  # Static value
  # PROJECT_ENV: development
  #
  # Output of a shell command (asks for approval on first use and whenever
  # the command set changes)
  # GIT_BRANCH:
  #   sh: git rev-parse --abbrev-ref HEAD
"#;

/// Write a commented .dirvana.yml in the current directory
pub fn init_command(force: bool) -> Result<()> {
    let dir = resolve_dir(None)?;
    let path = dir.join(CONFIG_NAMES[0]);

    if path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    std::fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Created {}", path.display());
    println!("Created {}", path.display());
    println!("Run `dirvana allow` to activate it.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let doc: dirvana::ConfigDocument = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(doc.aliases["ll"].command, "ls -la");
        assert!(!doc.local_only);
        assert!(doc.functions.is_empty());
        assert!(doc.env.is_empty());
    }
}
