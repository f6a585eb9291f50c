use std::path::PathBuf;

use thiserror::Error;

/// Errors from the persistent build state. All of them abort the build.
#[derive(Debug, Error)]
pub enum PersistentCacheError {
    #[error("build state I/O error at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build state at `{path}` is corrupt (line {line}): {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("build state at `{path}` is locked{}", pid.map(|p| format!(" by process {p}")).unwrap_or_default())]
    Locked { path: PathBuf, pid: Option<u32> },
}

impl PersistentCacheError {
    pub(super) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
