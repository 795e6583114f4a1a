//! Config file discovery and hierarchy loading

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::document::{ConfigDocument, MergedConfig};
use super::merge::merge;
use crate::error::ConfigError;

/// Local config file names, in preference order (at most one is used per directory)
pub const CONFIG_NAMES: &[&str] = &[".dirvana.yml", ".dirvana.yaml", ".dirvana.toml", ".dirvana.json"];

/// Supported document formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yml" | "yaml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    fn parse(self, content: &str) -> Result<ConfigDocument, String> {
        // An empty YAML file is a valid, empty config
        if content.trim().is_empty() {
            return Ok(ConfigDocument::default());
        }
        match self {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Load and validate a single config file
pub fn load(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let format =
        Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let doc = format.parse(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    doc.validate()?;
    Ok(doc)
}

/// Result of loading a hierarchy
#[derive(Debug, Clone, Default)]
pub struct LoadedHierarchy {
    pub merged: MergedConfig,
    /// Every file that contributed, global first, then root-to-leaf
    pub loaded: Vec<PathBuf>,
    /// Global config file and its document, if it was loaded successfully
    pub global: Option<(PathBuf, ConfigDocument)>,
    /// Each local document as parsed, root-to-leaf, aligned with the input files
    pub documents: Vec<ConfigDocument>,
}

/// Finds and folds config files.
///
/// Holds only the global config location; every `load` call parses into a
/// fresh document.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    global: Option<PathBuf>,
}

impl Loader {
    pub fn new(global: Option<PathBuf>) -> Self {
        Self { global }
    }

    pub fn global_path(&self) -> Option<&Path> {
        self.global.as_deref()
    }

    /// The config file a directory owns, if any
    pub fn find_config_file(&self, dir: &Path) -> Option<PathBuf> {
        CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Config files from `start_dir` up to the filesystem root, returned root-to-leaf
    pub fn find_config_files(&self, start_dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = start_dir
            .ancestors()
            .filter_map(|dir| self.find_config_file(dir))
            .collect();
        found.reverse();
        found
    }

    /// Load the global config; a missing or broken file is skipped with a warning
    pub fn load_global(&self) -> Option<(PathBuf, ConfigDocument)> {
        let path = self.global.as_ref()?;
        if !path.is_file() {
            debug!("No global config at {}", path.display());
            return None;
        }
        match load(path) {
            Ok(doc) => Some((path.clone(), doc)),
            Err(e) => {
                warn!("Skipping global config: {}", e);
                None
            }
        }
    }

    /// Fold the global layer and the given local files (root-to-leaf).
    ///
    /// A broken local file fails the whole load. The global layer is dropped
    /// when the first local file sets `ignore_global`.
    pub fn load_files(&self, files: &[PathBuf]) -> Result<LoadedHierarchy, ConfigError> {
        let locals = files
            .iter()
            .map(|f| load(f))
            .collect::<Result<Vec<_>, _>>()?;

        let ignore_global = locals.first().is_some_and(|doc| doc.ignore_global);

        let mut result = LoadedHierarchy::default();
        if !ignore_global {
            if let Some((path, doc)) = self.load_global() {
                result.merged = doc.clone();
                result.loaded.push(path.clone());
                result.global = Some((path, doc));
            }
        }

        // A `local_only` document discards what came before it inside `merge`;
        // documents below it still fold on top
        for (path, doc) in files.iter().zip(locals) {
            result.documents.push(doc.clone());
            result.merged = merge(result.merged, doc);
            result.loaded.push(path.clone());
        }

        debug!("Loaded {} config file(s)", result.loaded.len());
        Ok(result)
    }

    /// Load every config from the filesystem root down to `dir`
    pub fn load_hierarchy(&self, dir: &Path) -> Result<LoadedHierarchy, ConfigError> {
        let files = self.find_config_files(dir);
        self.load_files(&files)
    }
}
