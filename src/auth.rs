//! Directory authorization and shell-command approval
//!
//! Two independent gates protect the user:
//! 1. A directory must be explicitly allowed before its config is loaded.
//! 2. The set of `sh` env commands it requests must be approved, and is
//!    re-approved whenever that set changes.
//!
//! State lives in `authorized_v2.json`. Older releases kept a bare JSON
//! array of allowed paths in `authorized.json`; that file is read when the
//! versioned one does not exist yet and is never written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::AuthError;
use crate::fsutil::LockedFile;

/// Current on-disk format version
pub const AUTH_FORMAT_VERSION: u32 = 2;

/// Authorization state for one directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthEntry {
    pub allowed: bool,

    /// Digest of the approved `sh` command set; empty if never approved
    #[serde(default)]
    pub shell_commands_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthFile {
    version: u32,
    #[serde(default)]
    directories: BTreeMap<String, AuthEntry>,
}

/// Where the state was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    Empty,
    Legacy,
    Versioned,
}

/// Persistent authorization store
#[derive(Debug)]
pub struct AuthStore {
    path: PathBuf,
    source: AuthSource,
    directories: BTreeMap<String, AuthEntry>,
}

impl AuthStore {
    /// Load from the versioned file, else from the legacy file, else empty.
    pub fn open(path: impl Into<PathBuf>, legacy_path: &Path) -> Result<Self, AuthError> {
        let path = path.into();

        if path.exists() {
            let directories = parse_versioned(&path, &read(&path)?)?;
            debug!("Loaded {} authorization entries", directories.len());
            return Ok(Self {
                path,
                source: AuthSource::Versioned,
                directories,
            });
        }

        if legacy_path.exists() {
            let content = read(legacy_path)?;
            let paths: Vec<String> =
                serde_json::from_str(&content).map_err(|e| AuthError::Corrupt {
                    path: legacy_path.to_path_buf(),
                    message: e.to_string(),
                })?;
            debug!(
                "Loaded {} legacy authorization entries from {}",
                paths.len(),
                legacy_path.display()
            );
            let directories = paths
                .into_iter()
                .map(|p| {
                    (
                        p,
                        AuthEntry {
                            allowed: true,
                            shell_commands_hash: String::new(),
                        },
                    )
                })
                .collect();
            return Ok(Self {
                path,
                source: AuthSource::Legacy,
                directories,
            });
        }

        Ok(Self {
            path,
            source: AuthSource::Empty,
            directories: BTreeMap::new(),
        })
    }

    pub fn source(&self) -> AuthSource {
        self.source
    }

    pub fn entry(&self, dir: &Path) -> Option<&AuthEntry> {
        self.directories.get(&key(dir))
    }

    pub fn is_allowed(&self, dir: &Path) -> bool {
        self.entry(dir).is_some_and(|e| e.allowed)
    }

    /// Trust a directory. Persists even if it was already allowed.
    pub fn allow(&mut self, dir: &Path) -> Result<(), AuthError> {
        let k = key(dir);
        self.update(|dirs| {
            dirs.entry(k).or_default().allowed = true;
            Ok(())
        })?;
        info!("Authorized {}", dir.display());
        Ok(())
    }

    /// Stop trusting a directory; its shell-command approval is dropped too.
    ///
    /// Returns whether the directory was allowed before.
    pub fn revoke(&mut self, dir: &Path) -> Result<bool, AuthError> {
        let k = key(dir);
        let was_allowed = self.update(|dirs| {
            let Some(entry) = dirs.get_mut(&k) else {
                return Ok(false);
            };
            let was_allowed = entry.allowed;
            entry.allowed = false;
            entry.shell_commands_hash.clear();
            Ok(was_allowed)
        })?;
        info!("Revoked {}", dir.display());
        Ok(was_allowed)
    }

    /// True if `commands` is non-empty and differs from what was approved for `dir`
    pub fn requires_shell_approval(&self, dir: &Path, commands: &BTreeMap<String, String>) -> bool {
        if commands.is_empty() {
            return false;
        }
        match self.entry(dir) {
            None => true,
            Some(entry) => entry.shell_commands_hash != shell_commands_digest(commands),
        }
    }

    /// Record approval of `commands` for an allowed directory.
    ///
    /// Trust is checked against the file as it is on disk now, so a revoke
    /// from another shell since this store was opened wins.
    pub fn approve_shell_commands(
        &mut self,
        dir: &Path,
        commands: &BTreeMap<String, String>,
    ) -> Result<(), AuthError> {
        let k = key(dir);
        let digest = shell_commands_digest(commands);
        self.update(|dirs| {
            let entry = dirs
                .get_mut(&k)
                .filter(|e| e.allowed)
                .ok_or_else(|| AuthError::NotAllowed(dir.to_path_buf()))?;
            entry.shell_commands_hash = digest;
            Ok(())
        })?;
        info!("Approved {} shell command(s) for {}", commands.len(), dir.display());
        Ok(())
    }

    /// All allowed directories, sorted
    pub fn list(&self) -> Vec<PathBuf> {
        self.directories
            .iter()
            .filter(|(_, e)| e.allowed)
            .map(|(p, _)| PathBuf::from(p))
            .collect()
    }

    /// Apply `change` to the latest on-disk state while holding the file lock.
    ///
    /// Without a versioned file yet, the in-memory map (possibly loaded from
    /// the legacy file) is the base, so the first write migrates it.
    fn update<R>(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<String, AuthEntry>) -> Result<R, AuthError>,
    ) -> Result<R, AuthError> {
        let file = LockedFile::acquire(&self.path).map_err(|message| AuthError::Write {
            path: self.path.clone(),
            message,
        })?;
        let current = file.read().map_err(|source| AuthError::Read {
            path: self.path.clone(),
            source,
        })?;
        if let Some(content) = current {
            self.directories = parse_versioned(&self.path, &content)?;
        }

        let result = change(&mut self.directories)?;

        let content = serde_json::to_string_pretty(&AuthFile {
            version: AUTH_FORMAT_VERSION,
            directories: self.directories.clone(),
        })
        .map_err(|e| AuthError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        file.write(content.as_bytes()).map_err(|message| AuthError::Write {
            path: self.path.clone(),
            message,
        })?;
        if self.source == AuthSource::Legacy {
            info!("Migrated legacy authorizations to {}", self.path.display());
        }
        self.source = AuthSource::Versioned;
        Ok(result)
    }
}

/// Order-independent digest of a `{name: command}` set
pub fn shell_commands_digest(commands: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    // BTreeMap iterates sorted by name; length prefixes keep fields unambiguous
    for (name, command) in commands {
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update((command.len() as u64).to_le_bytes());
        hasher.update(command.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn key(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}

fn parse_versioned(path: &Path, content: &str) -> Result<BTreeMap<String, AuthEntry>, AuthError> {
    let file: AuthFile = serde_json::from_str(content).map_err(|e| AuthError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if file.version > AUTH_FORMAT_VERSION {
        return Err(AuthError::Corrupt {
            path: path.to_path_buf(),
            message: format!(
                "format version {} is newer than supported version {}",
                file.version, AUTH_FORMAT_VERSION
            ),
        });
    }
    Ok(file.directories)
}

fn read(path: &Path) -> Result<String, AuthError> {
    std::fs::read_to_string(path).map_err(|source| AuthError::Read {
        path: path.to_path_buf(),
        source,
    })
}
