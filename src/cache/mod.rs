//! Persistent build state.
//!
//! Maps every artifact to the checksums of the files read while building it,
//! the config hash it was built under, and its owning source.
//!
//! ```text
//! <cache dir>/
//! ├── buildstate.json      # snapshot, rewritten on open and close
//! ├── buildstate.journal   # one JSON line per commit since the snapshot
//! └── lock                 # owner pid; single writer
//! ```

mod error;
mod lock;
mod store;


pub use error::PersistentCacheError;
pub use store::{ArtifactRecord, BuildState};

/// Bumped whenever the snapshot layout changes; older snapshots are dropped.
pub const SCHEMA_VERSION: u32 = 1;

pub const SNAPSHOT_FILE: &str = "buildstate.json";
pub const JOURNAL_FILE: &str = "buildstate.journal";
pub const LOCK_FILE: &str = "lock";
