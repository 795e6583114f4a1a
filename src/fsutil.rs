//! Locked atomic file updates
//!
//! State files (cache, authorization) may be written by several shells at
//! once. A writer holds an exclusive lock on a sibling `.lock` file for the
//! whole read-modify-write, so a change another process made between our
//! open and our write is re-read instead of overwritten. Content goes to a
//! temp file which is then renamed over the target.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Exclusive lock on a state file; released when dropped.
///
/// Errors are returned as plain strings so each store can wrap them in its
/// own error type together with the path.
#[derive(Debug)]
pub struct LockedFile {
    path: PathBuf,
    _lock: File,
}

impl LockedFile {
    /// Block until the lock for `path` is held, creating the parent directory if needed
    pub fn acquire(path: &Path) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create directory {}: {}", parent.display(), e))?;
        }

        let lock_path = sibling(path, "lock");
        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| format!("failed to create lock file {}: {}", lock_path.display(), e))?;

        lock.lock_exclusive()
            .map_err(|e| format!("failed to acquire lock: {}", e))?;

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Current content, `None` if the file does not exist
    pub fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the file with `content` atomically
    pub fn write(&self, content: &[u8]) -> Result<(), String> {
        let temp_path = sibling(&self.path, "tmp");
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| format!("failed to create temp file {}: {}", temp_path.display(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = temp_file.set_permissions(std::fs::Permissions::from_mode(0o600));
        }

        temp_file
            .write_all(content)
            .map_err(|e| format!("failed to write content: {}", e))?;

        temp_file
            .sync_all()
            .map_err(|e| format!("failed to sync file: {}", e))?;

        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| format!("failed to rename {}: {}", temp_path.display(), e))
    }
}

/// `cache.json` -> `cache.json.lock`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/state.json");

        let file = LockedFile::acquire(&target).unwrap();
        assert_eq!(file.read().unwrap(), None);
        file.write(b"first").unwrap();
        file.write(b"second").unwrap();

        assert_eq!(file.read().unwrap().as_deref(), Some("second"));
        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("state.json");

        LockedFile::acquire(&target).unwrap().write(b"one").unwrap();
        // A second acquire would block forever if the first lock leaked
        let again = LockedFile::acquire(&target).unwrap();
        assert_eq!(again.read().unwrap().as_deref(), Some("one"));
    }

    #[test]
    fn test_sibling_appends_suffix() {
        let p = Path::new("/a/b/cache.json");
        assert_eq!(sibling(p, "lock"), PathBuf::from("/a/b/cache.json.lock"));
    }
}
