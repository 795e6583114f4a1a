//! Shared fixtures for integration tests

use std::fs;
use std::path::{Path, PathBuf};

use dirvana::auth::AuthStore;
use dirvana::paths::{Paths, Settings};
use dirvana::Engine;
use tempfile::TempDir;

/// A working tree under `work/` and an isolated state directory under `state/`
pub struct Tree {
    _tmp: TempDir,
    root: PathBuf,
    state: PathBuf,
}

#[allow(dead_code)]
impl Tree {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        // Canonical so chain paths compare equal on systems where /tmp is a symlink
        let base = tmp.path().canonicalize().expect("Failed to canonicalize temp dir");
        let root = base.join("work");
        let state = base.join("state");
        fs::create_dir_all(&root).expect("Failed to create work dir");
        Self {
            _tmp: tmp,
            root,
            state,
        }
    }

    pub fn state(&self) -> &Path {
        &self.state
    }

    /// Create `rel` (no config file) and return its path
    pub fn dir(&self, rel: &str) -> PathBuf {
        let dir = self.root.join(rel);
        fs::create_dir_all(&dir).expect("Failed to create dir");
        dir
    }

    /// Write `.dirvana.yml` into `rel` and return the directory
    pub fn config(&self, rel: &str, content: &str) -> PathBuf {
        let dir = self.dir(rel);
        fs::write(dir.join(".dirvana.yml"), content).expect("Failed to write config");
        dir
    }

    pub fn paths(&self) -> Paths {
        Paths::with_root(&self.state)
    }

    pub fn auth(&self) -> AuthStore {
        let paths = self.paths();
        AuthStore::open(paths.auth_file(), &paths.legacy_auth_file()).expect("Failed to open auth")
    }

    pub fn engine(&self) -> Engine {
        Engine::open(&self.paths(), Settings::default()).expect("Failed to open engine")
    }
}
