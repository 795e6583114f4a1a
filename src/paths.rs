//! State file locations and runtime settings

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the state directory
pub const HOME_ENV: &str = "DIRVANA_HOME";

/// Environment variable overriding the shell command timeout (seconds)
pub const TIMEOUT_ENV: &str = "DIRVANA_SHELL_TIMEOUT";

/// Default bound on a single `sh` env command
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(10);

/// Global config file names, in preference order
pub const GLOBAL_CONFIG_NAMES: &[&str] = &["global.yml", "global.yaml", "global.toml", "global.json"];

/// Where dirvana keeps its global config, cache and authorization files
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolve from `$DIRVANA_HOME`, falling back to `~/.dirvana`
    pub fn from_env() -> Self {
        let root = std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".dirvana")
            });
        Self { root }
    }

    /// Use an explicit state directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_file(&self) -> PathBuf {
        self.root.join("cache.json")
    }

    pub fn legacy_auth_file(&self) -> PathBuf {
        self.root.join("authorized.json")
    }

    pub fn auth_file(&self) -> PathBuf {
        self.root.join("authorized_v2.json")
    }

    /// First existing global config file, if any
    pub fn global_config(&self) -> Option<PathBuf> {
        GLOBAL_CONFIG_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|p| p.is_file())
    }
}

/// Runtime knobs that are not part of any config document
#[derive(Debug, Clone)]
pub struct Settings {
    pub shell_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let shell_timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SHELL_TIMEOUT);
        Self { shell_timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_files_live_under_root() {
        let paths = Paths::with_root("/tmp/dv");
        assert_eq!(paths.cache_file(), PathBuf::from("/tmp/dv/cache.json"));
        assert_eq!(paths.auth_file(), PathBuf::from("/tmp/dv/authorized_v2.json"));
        assert_eq!(paths.legacy_auth_file(), PathBuf::from("/tmp/dv/authorized.json"));
    }

    #[test]
    fn test_global_config_prefers_yml() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_root(dir.path());
        assert!(paths.global_config().is_none());

        std::fs::write(dir.path().join("global.toml"), "").unwrap();
        assert_eq!(paths.global_config(), Some(dir.path().join("global.toml")));

        std::fs::write(dir.path().join("global.yml"), "").unwrap();
        assert_eq!(paths.global_config(), Some(dir.path().join("global.yml")));
    }
}
