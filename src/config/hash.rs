//! Content hashing for config files

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// Separator between per-file hashes in a hierarchy hash
pub const HIERARCHY_SEPARATOR: &str = ":";

/// SHA-256 of raw bytes, hex encoded
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content hash of a single file
pub fn hash_file(path: &Path) -> Result<String, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&bytes))
}

/// Colon-joined content hashes of `files`, in the given (root-to-leaf) order
pub fn hierarchy_hash<P: AsRef<Path>>(files: &[P]) -> Result<String, ConfigError> {
    let hashes = files
        .iter()
        .map(|f| hash_file(f.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hashes.join(HIERARCHY_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join(".dirvana.yml");
        std::fs::write(&file, "aliases:\n  a: ls\n").unwrap();

        let first = hash_file(&file).unwrap();
        assert_eq!(first, hash_file(&file).unwrap());
        assert_eq!(first.len(), 64);

        std::fs::write(&file, "aliases:\n  a: lz\n").unwrap();
        assert_ne!(first, hash_file(&file).unwrap());
    }

    #[test]
    fn test_hierarchy_hash_joins_in_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let joined = hierarchy_hash(&[&a, &b]).unwrap();
        assert_eq!(joined, format!("{}:{}", hash_bytes(b"a"), hash_bytes(b"b")));
        assert_ne!(joined, hierarchy_hash(&[&b, &a]).unwrap());
        assert_eq!(hierarchy_hash::<&Path>(&[]).unwrap(), "");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = hash_file(Path::new("/nonexistent/.dirvana.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
