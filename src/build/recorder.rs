//! Thread-local dependency recording.
//!
//! While an artifact builds, every file read anywhere in the call tree
//! (content files, models, templates, helper lookups, directory listings)
//! goes through [`record`]. The set lives in a thread-local slot installed by
//! [`Recorder::install`] and torn down when the guard drops, on every exit
//! path.
//!
//! ```ignore
//! let recorder = Recorder::install(ActiveArtifact::new("blog/index.html", "/blog/"))?;
//! let text = recorder::read_to_string(&template)?;   // recorded
//! let deps = recorder.finish();
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::error::ReentrantContextError;

/// The artifact currently being built on this thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveArtifact {
    pub name: String,
    /// URL the artifact is served at; relative links are computed from it.
    pub base_url: String,
}

impl ActiveArtifact {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }
}

struct Slot {
    artifact: ActiveArtifact,
    touched: BTreeSet<PathBuf>,
}

thread_local! {
    static ACTIVE: RefCell<Option<Slot>> = const { RefCell::new(None) };
}

/// Scoped dependency recorder.
///
/// Not `Send`: the slot it owns belongs to the installing thread.
#[must_use = "dropping the recorder ends recording"]
pub struct Recorder {
    _thread_bound: PhantomData<*const ()>,
}

impl Recorder {
    /// Install a recorder for `artifact` on the current thread.
    pub fn install(artifact: ActiveArtifact) -> Result<Self, ReentrantContextError> {
        ACTIVE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(active) = slot.as_ref() {
                return Err(ReentrantContextError {
                    kind: "build",
                    active: active.artifact.name.clone(),
                });
            }
            *slot = Some(Slot {
                artifact,
                touched: BTreeSet::new(),
            });
            Ok(Self {
                _thread_bound: PhantomData,
            })
        })
    }

    /// Stop recording and return the touched paths.
    pub fn finish(self) -> BTreeSet<PathBuf> {
        ACTIVE.with(|slot| {
            slot.borrow_mut()
                .take()
                .map(|s| s.touched)
                .unwrap_or_default()
        })
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // `try_with`: the slot may already be gone during thread teardown.
        let _ = ACTIVE.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Record a path on the active recorder. No-op when nothing is recording.
pub fn record(path: impl AsRef<Path>) {
    ACTIVE.with(|slot| {
        if let Some(slot) = slot.borrow_mut().as_mut() {
            slot.touched.insert(path.as_ref().to_path_buf());
        }
    });
}

/// The artifact being built on this thread, if any.
pub fn active_artifact() -> Option<ActiveArtifact> {
    ACTIVE.with(|slot| slot.borrow().as_ref().map(|s| s.artifact.clone()))
}

pub fn is_recording() -> bool {
    ACTIVE.with(|slot| slot.borrow().is_some())
}

/// `fs::read_to_string` that records the path.
pub fn read_to_string(path: &Path) -> io::Result<String> {
    record(path);
    std::fs::read_to_string(path)
}

/// `fs::read` that records the path.
pub fn read(path: &Path) -> io::Result<Vec<u8>> {
    record(path);
    std::fs::read(path)
}

/// Whether `path` exists, recording the lookup either way.
pub fn exists(path: &Path) -> bool {
    record(path);
    path.exists()
}
