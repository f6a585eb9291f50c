//! Incremental builds.
//!
//! # Module Structure
//!
//! ```text
//! build/
//! ├── artifact.rs   # ArtifactSpec, ArtifactState, BuildContext (atomic writes)
//! ├── builder.rs    # Builder: build, build_all, prune, clean
//! ├── error.rs      # BuildError, BuildProgramError, ReentrantContextError
//! ├── program/      # BuildProgram trait, registry, built-in programs
//! ├── recorder.rs   # thread-local dependency recorder
//! └── reporter.rs   # Reporter trait and implementations
//! ```
//!
//! # Artifact lifecycle
//!
//! ```text
//! checking ─┬─> current (skipped)
//!           └─> building ─┬─> built   (output renamed into place, deps committed)
//!                         └─> failed  (recorded as failed, pass continues)
//! ```

mod artifact;
mod builder;
mod error;
pub mod program;
pub mod recorder;
mod reporter;

#[cfg(test)]
mod tests;

pub use artifact::{ArtifactSpec, ArtifactState, BuildContext};
pub use builder::{BuildSummary, Builder, PruneSummary, SourceBuild};
pub use error::{BuildError, BuildProgramError, ReentrantContextError};
pub use reporter::{
    BufferReporter, BuildEvent, ChangeHub, ChangeStream, ChangeStreamReporter, CliReporter,
    MultiReporter, NullReporter, Reporter, StreamEvent,
};
