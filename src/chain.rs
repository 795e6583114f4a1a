//! Active chain resolution
//!
//! The active chain of a directory is every ancestor-or-self that owns a
//! config file AND is authorized, root-to-leaf. An unauthorized directory
//! is skipped without breaking the chain: its trusted descendants still
//! inherit from trusted ancestors above it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::auth::AuthStore;
use crate::config::Loader;

/// Answers "is this directory trusted"
pub trait Authorizer {
    fn is_allowed(&self, dir: &Path) -> bool;
}

impl Authorizer for AuthStore {
    fn is_allowed(&self, dir: &Path) -> bool {
        AuthStore::is_allowed(self, dir)
    }
}

impl Authorizer for HashSet<PathBuf> {
    fn is_allowed(&self, dir: &Path) -> bool {
        self.contains(dir)
    }
}

/// A directory in the chain with the config file it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub dir: PathBuf,
    pub file: PathBuf,
}

/// Result of resolving the active chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveChain {
    /// Contributing directories, root-to-leaf
    pub links: Vec<ChainLink>,
    /// Directories that own a config file but are not authorized, root-to-leaf
    pub skipped: Vec<PathBuf>,
}

impl ActiveChain {
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.links.iter().map(|l| l.dir.clone()).collect()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.links.iter().map(|l| l.file.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Deepest contributing directory
    pub fn leaf(&self) -> Option<&ChainLink> {
        self.links.last()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.links.iter().any(|l| l.dir == dir)
    }
}

/// Resolve the active chain for `target`
pub fn active_chain(loader: &Loader, auth: &dyn Authorizer, target: &Path) -> ActiveChain {
    let mut chain = ActiveChain::default();

    let mut candidates: Vec<(PathBuf, PathBuf)> = target
        .ancestors()
        .filter_map(|dir| loader.find_config_file(dir).map(|f| (dir.to_path_buf(), f)))
        .collect();
    candidates.reverse();

    for (dir, file) in candidates {
        if auth.is_allowed(&dir) {
            chain.links.push(ChainLink { dir, file });
        } else {
            chain.skipped.push(dir);
        }
    }

    debug!(
        "Active chain for {}: {} dir(s), {} unauthorized",
        target.display(),
        chain.links.len(),
        chain.skipped.len()
    );
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &Path, alias: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(".dirvana.yml"), format!("aliases:\n  {}: echo {}\n", alias, alias))
            .unwrap();
    }

    #[test]
    fn test_untrusted_middle_is_skipped() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("A");
        let b = a.join("B");
        let c = b.join("C");
        config(&a, "a");
        config(&b, "b");
        config(&c, "c");

        let trusted: HashSet<PathBuf> = [a.clone(), c.clone()].into_iter().collect();
        let loader = Loader::default();

        let chain = active_chain(&loader, &trusted, &c);
        assert_eq!(chain.dirs(), vec![a.clone(), c.clone()]);
        assert_eq!(chain.skipped, vec![b.clone()]);
        assert_eq!(chain.files()[1], c.join(".dirvana.yml"));

        assert_eq!(active_chain(&loader, &trusted, &b).dirs(), vec![a]);
    }

    #[test]
    fn test_directories_without_config_are_ignored() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("A");
        let deep = a.join("x/y/z");
        config(&a, "a");
        std::fs::create_dir_all(&deep).unwrap();

        let trusted: HashSet<PathBuf> = [a.clone(), a.join("x")].into_iter().collect();
        let chain = active_chain(&Loader::default(), &trusted, &deep);
        assert_eq!(chain.dirs(), vec![a.clone()]);
        assert_eq!(chain.leaf().map(|l| l.dir.clone()), Some(a));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("A");
        let b = a.join("B");
        config(&a, "a");
        config(&b, "b");
        let trusted: HashSet<PathBuf> = [a, b.clone()].into_iter().collect();
        let loader = Loader::default();

        assert_eq!(
            active_chain(&loader, &trusted, &b),
            active_chain(&loader, &trusted, &b)
        );
    }

    #[test]
    fn test_nothing_trusted_yields_empty_chain() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("A");
        config(&a, "a");

        let chain = active_chain(&Loader::default(), &HashSet::new(), &a);
        assert!(chain.is_empty());
        assert_eq!(chain.skipped, vec![a]);
    }
}
