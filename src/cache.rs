//! Per-directory result cache
//!
//! Maps an absolute directory path to what was computed for it last time:
//! the hash of its own config file, the names it defined (for cleanup) and,
//! for directories that were the target of an export, the merged result of
//! the whole active chain.
//!
//! Validity is always re-checked against freshly computed hashes, so a
//! stale entry can only cost a recomputation, never serve old data.
//! Every mutation is written to disk immediately.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigDocument, DefinedNames, MergedConfig};
use crate::error::CacheError;
use crate::fsutil::LockedFile;

/// Version of the running binary; entries from other versions are invalid
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cached state for one directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,

    /// Hash of the directory's own config file; empty when it has none
    #[serde(default)]
    pub content_hash: String,

    /// Colon-joined file hashes of the active chain, root-to-leaf
    #[serde(default)]
    pub hierarchy_hash: String,

    #[serde(default)]
    pub hierarchy_paths: Vec<PathBuf>,

    /// Hash of the global config that contributed to the merged result
    #[serde(default)]
    pub global_hash: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub version: String,

    #[serde(default)]
    pub local_only: bool,

    /// Cleanup lists; present only when the directory owns a config file
    #[serde(default)]
    pub alias_names: Option<Vec<String>>,
    #[serde(default)]
    pub function_names: Option<Vec<String>>,
    #[serde(default)]
    pub env_var_names: Option<Vec<String>>,

    /// Own alias/function name -> command
    #[serde(default)]
    pub command_map: BTreeMap<String, String>,
    #[serde(default)]
    pub completion_map: BTreeMap<String, String>,

    /// Same maps for the merged hierarchy; `None` until the directory was exported
    #[serde(default)]
    pub merged_command_map: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub merged_completion_map: Option<BTreeMap<String, String>>,

    /// Shell the definitions were rendered for
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub shell_code: Option<String>,
}

impl CacheEntry {
    /// Entry for a directory with no config file of its own
    pub fn inherited(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content_hash: String::new(),
            hierarchy_hash: String::new(),
            hierarchy_paths: Vec::new(),
            global_hash: None,
            timestamp: Utc::now(),
            version: TOOL_VERSION.to_string(),
            local_only: false,
            alias_names: None,
            function_names: None,
            env_var_names: None,
            command_map: BTreeMap::new(),
            completion_map: BTreeMap::new(),
            merged_command_map: None,
            merged_completion_map: None,
            shell: None,
            shell_code: None,
        }
    }

    /// Entry for a directory owning `doc`, whose file hashes to `content_hash`
    pub fn for_file(path: impl Into<PathBuf>, content_hash: String, doc: &ConfigDocument) -> Self {
        let names = doc.names();
        Self {
            content_hash,
            local_only: doc.local_only,
            alias_names: Some(names.aliases),
            function_names: Some(names.functions),
            env_var_names: Some(names.env),
            command_map: doc.command_map(),
            completion_map: doc.completion_map(),
            ..Self::inherited(path)
        }
    }

    /// Attach the merged result of the active chain
    pub fn with_hierarchy(
        mut self,
        hierarchy_hash: String,
        hierarchy_paths: Vec<PathBuf>,
        global_hash: Option<String>,
        merged: &MergedConfig,
    ) -> Self {
        self.hierarchy_hash = hierarchy_hash;
        self.hierarchy_paths = hierarchy_paths;
        self.global_hash = global_hash;
        self.merged_command_map = Some(merged.command_map());
        self.merged_completion_map = Some(merged.completion_map());
        self
    }

    pub fn with_shell_code(mut self, shell: &str, code: String) -> Self {
        self.shell = Some(shell.to_string());
        self.shell_code = Some(code);
        self
    }

    pub fn has_local_config(&self) -> bool {
        self.alias_names.is_some()
    }

    /// Names to unset when leaving this directory
    pub fn cleanup_names(&self) -> Option<DefinedNames> {
        if !self.has_local_config() {
            return None;
        }
        Some(DefinedNames {
            aliases: self.alias_names.clone().unwrap_or_default(),
            functions: self.function_names.clone().unwrap_or_default(),
            env: self.env_var_names.clone().unwrap_or_default(),
        })
    }

    /// The directory's own file is unchanged since this entry was written
    pub fn is_file_valid(&self, current_hash: &str) -> bool {
        self.version == TOOL_VERSION && self.content_hash == current_hash
    }

    /// The merged result still matches the active chain
    pub fn is_hierarchy_valid(&self, hierarchy_hash: &str, global_hash: Option<&str>) -> bool {
        self.merged_command_map.is_some()
            && self.version == TOOL_VERSION
            && self.hierarchy_hash == hierarchy_hash
            && self.global_hash.as_deref() == global_hash
    }

    fn drop_hierarchy(&mut self) {
        self.hierarchy_hash.clear();
        self.hierarchy_paths.clear();
        self.global_hash = None;
        self.merged_command_map = None;
        self.merged_completion_map = None;
        self.shell = None;
        self.shell_code = None;
    }
}

/// The persisted cache
#[derive(Debug)]
pub struct Cache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl Cache {
    /// Load the cache file; a missing file is an empty cache
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| CacheError::Read {
                path: path.clone(),
                source,
            })?;
            parse(&path, &content)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, dir: &Path) -> Option<CacheEntry> {
        self.lock().get(&key(dir)).cloned()
    }

    pub fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.update(|entries| {
            entries.insert(key(&entry.path), entry);
        })
    }

    /// Remove one entry; returns whether it existed
    pub fn delete(&self, dir: &Path) -> Result<bool, CacheError> {
        self.update(|entries| entries.remove(&key(dir)).is_some())
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<(), CacheError> {
        self.update(|entries| entries.clear())
    }

    /// Remove `dir` and every entry nested under it; returns how many were removed
    pub fn delete_with_subdirs(&self, dir: &Path) -> Result<usize, CacheError> {
        let removed = self.update(|entries| {
            let before = entries.len();
            entries.retain(|k, _| !Path::new(k).starts_with(dir));
            before - entries.len()
        })?;
        debug!("Removed {} cache entries under {}", removed, dir.display());
        Ok(removed)
    }

    /// Drop merged results for `dir` and everything nested under it.
    ///
    /// Per-file cleanup lists are kept: the next export still finds them and
    /// unsets what a revoked directory defined.
    pub fn clear_hierarchy(&self, dir: &Path) -> Result<usize, CacheError> {
        let cleared = self.update(|entries| {
            let mut cleared = 0;
            for (k, entry) in entries.iter_mut() {
                if Path::new(k).starts_with(dir) && entry.merged_command_map.is_some() {
                    entry.drop_hierarchy();
                    cleared += 1;
                }
            }
            cleared
        })?;
        debug!("Cleared {} merged cache entries under {}", cleared, dir.display());
        Ok(cleared)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to the latest on-disk map under the file lock, then persist.
    ///
    /// Entries written by other shells since `load` are kept.
    fn update<R>(&self, change: impl FnOnce(&mut BTreeMap<String, CacheEntry>) -> R) -> Result<R, CacheError> {
        let mut entries = self.lock();
        let file = LockedFile::acquire(&self.path).map_err(|message| CacheError::Write {
            path: self.path.clone(),
            message,
        })?;
        let current = file.read().map_err(|source| CacheError::Read {
            path: self.path.clone(),
            source,
        })?;
        if let Some(content) = current {
            *entries = parse(&self.path, &content)?;
        }

        let result = change(&mut *entries);

        let content = serde_json::to_string(&*entries).map_err(|e| CacheError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        file.write(content.as_bytes()).map_err(|message| CacheError::Write {
            path: self.path.clone(),
            message,
        })?;
        Ok(result)
    }
}

fn parse(path: &Path, content: &str) -> Result<BTreeMap<String, CacheEntry>, CacheError> {
    serde_json::from_str(content).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn key(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}
