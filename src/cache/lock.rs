//! Single-writer lock file for the build state directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::PersistentCacheError;
use crate::debug;

/// Held for the lifetime of a [`BuildState`](super::BuildState).
///
/// The file contains the owner's pid. A lock whose owner no longer runs is
/// stale and taken over.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn acquire(path: &Path) -> Result<Self, PersistentCacheError> {
        match Self::try_create(path) {
            Ok(lock) => return Ok(lock),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(PersistentCacheError::io(path, err)),
        }

        let pid = fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());
        if pid.is_some_and(|pid| pid == std::process::id() || process_alive(pid)) {
            return Err(PersistentCacheError::Locked {
                path: path.to_path_buf(),
                pid,
            });
        }

        debug!("cache"; "removing stale lock {}", path.display());
        fs::remove_file(path).map_err(|e| PersistentCacheError::io(path, e))?;
        Self::try_create(path).map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => PersistentCacheError::Locked {
                path: path.to_path_buf(),
                pid: None,
            },
            _ => PersistentCacheError::io(path, err),
        })
    }

    fn try_create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        write!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a cheap liveness probe, assume the owner is still running.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lock");
        let lock = LockFile::acquire(&path).unwrap();
        assert!(matches!(
            LockFile::acquire(&path),
            Err(PersistentCacheError::Locked { .. })
        ));
        drop(lock);
        assert!(!path.exists());
        assert!(LockFile::acquire(&path).is_ok());
    }

    #[test]
    fn test_garbage_lock_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lock");
        fs::write(&path, "not a pid").unwrap();
        let lock = LockFile::acquire(&path).unwrap();
        assert_eq!(
            fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );
    }
}
