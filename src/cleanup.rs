//! Transition cleanup between two active chains

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cache::Cache;
use crate::config::DefinedNames;

/// Directories in `prev` that are not in `curr`, in `prev` order
pub fn calculate_cleanup(prev: &[PathBuf], curr: &[PathBuf]) -> Vec<PathBuf> {
    let keep: HashSet<&Path> = curr.iter().map(PathBuf::as_path).collect();
    let mut seen = HashSet::new();
    prev.iter()
        .filter(|dir| !keep.contains(dir.as_path()) && seen.insert(dir.as_path()))
        .cloned()
        .collect()
}

/// Names to unset for the vacated directories, looked up from the cache.
///
/// Directories without a cache entry contribute nothing.
pub fn cleanup_names(cache: &Cache, dirs: &[PathBuf]) -> DefinedNames {
    let mut names = DefinedNames::default();
    for dir in dirs {
        let Some(found) = cache.get(dir).and_then(|e| e.cleanup_names()) else {
            debug!("No cleanup list cached for {}", dir.display());
            continue;
        };
        names.extend(found);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::config::{AliasSpec, ConfigDocument, EnvSpec};
    use tempfile::TempDir;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_set_difference() {
        let prev = paths(&["/a", "/a/b", "/a/b/c"]);
        let curr = paths(&["/a", "/a/x"]);
        assert_eq!(calculate_cleanup(&prev, &curr), paths(&["/a/b", "/a/b/c"]));
    }

    #[test]
    fn test_same_chain_needs_no_cleanup() {
        let chain = paths(&["/a", "/a/b"]);
        assert!(calculate_cleanup(&chain, &chain).is_empty());
        assert!(calculate_cleanup(&[], &chain).is_empty());
    }

    #[test]
    fn test_names_from_cache_skip_misses() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::load(dir.path().join("cache.json")).unwrap();

        let mut doc = ConfigDocument::default();
        doc.aliases.insert("c".to_string(), AliasSpec::new("echo c"));
        doc.env.insert("C_VAR".to_string(), EnvSpec::Static("1".to_string()));
        cache
            .set(CacheEntry::for_file("/a/b/c", "h".to_string(), &doc))
            .unwrap();
        cache.set(CacheEntry::inherited("/a/b/c/d")).unwrap();

        let names = cleanup_names(&cache, &paths(&["/a/b/c", "/a/b/c/d", "/missing"]));
        assert_eq!(names.aliases, vec!["c".to_string()]);
        assert_eq!(names.env, vec!["C_VAR".to_string()]);
        assert!(names.functions.is_empty());
    }
}
