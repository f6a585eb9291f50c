//! Build error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::address::MalformedPathError;
use crate::cache::PersistentCacheError;
use crate::db::DbError;

/// A thread-local context was installed while another one was active.
///
/// Nesting is a programming error and is never recovered.
#[derive(Debug, Clone, Error)]
#[error("{kind} context already active on this thread (active: `{active}`)")]
pub struct ReentrantContextError {
    pub kind: &'static str,
    pub active: String,
}

/// An artifact's build step failed.
#[derive(Debug, Error)]
#[error("failed to build `{artifact}` from `{source_id}`")]
pub struct BuildProgramError {
    pub artifact: String,
    pub source_id: String,
    #[source]
    pub cause: anyhow::Error,
}

impl BuildProgramError {
    /// Full cause chain on one line.
    pub fn detail(&self) -> String {
        format!("{:#}", self.cause)
    }
}

/// Errors that abort a build, prune or clean.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Cache(#[from] PersistentCacheError),

    #[error(transparent)]
    Reentrant(#[from] ReentrantContextError),

    #[error(transparent)]
    Path(#[from] MalformedPathError),

    #[error("I/O error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("cannot look up `{source_id}`")]
    Lookup {
        source_id: String,
        #[source]
        source: DbError,
    },
}

impl BuildError {
    /// Split an error from a build step into fatal and per-artifact kinds.
    ///
    /// Cache, reentrancy and path errors anywhere in the chain are fatal.
    pub fn classify(err: anyhow::Error) -> Result<anyhow::Error, Self> {
        let err = match err.downcast::<PersistentCacheError>() {
            Ok(cache) => return Err(Self::Cache(cache)),
            Err(err) => err,
        };
        for cause in err.chain() {
            if let Some(reentrant) = cause.downcast_ref::<ReentrantContextError>() {
                return Err(Self::Reentrant(reentrant.clone()));
            }
            if let Some(path) = cause.downcast_ref::<MalformedPathError>() {
                return Err(Self::Path(path.clone()));
            }
        }
        Ok(err)
    }
}
