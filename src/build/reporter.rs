//! Build progress reporting.
//!
//! The builder brackets its work in reporter calls:
//!
//! ```text
//! start_build
//!   enter_source
//!     artifact_state(checking)
//!     start_artifact_build(is_current)
//!       artifact_state(building)
//!       build_func            (only when stale)
//!       report_failure        (only on error)
//!     finish_artifact_build   (always)
//!   leave_source              (always)
//!   report_pruned
//! finish_build
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use super::artifact::{ArtifactSpec, ArtifactState};
use super::error::BuildProgramError;
use crate::db::Source;
use crate::{debug, log};

pub trait Reporter: Send + Sync {
    fn start_build(&self, _activity: &str) {}
    fn finish_build(&self, _activity: &str, _elapsed: Duration) {}
    fn enter_source(&self, _source: &Source) {}
    fn leave_source(&self, _source: &Source) {}
    /// Non-terminal transitions; terminal states arrive through
    /// `finish_artifact_build`.
    fn artifact_state(&self, _artifact: &ArtifactSpec, _state: ArtifactState) {}
    fn start_artifact_build(&self, _artifact: &ArtifactSpec, _is_current: bool) {}
    fn build_func(&self, _program: &str) {}
    fn finish_artifact_build(&self, _artifact: &ArtifactSpec, _state: ArtifactState) {}
    fn report_failure(&self, _error: &BuildProgramError) {}
    fn report_pruned(&self, _artifact: &str) {}
}

/// Reports nothing.
pub struct NullReporter;

impl Reporter for NullReporter {}

// ============================================================================
// terminal
// ============================================================================

/// Terminal output through the logger.
#[derive(Default)]
pub struct CliReporter {
    built: AtomicUsize,
    current: AtomicUsize,
    failed: AtomicUsize,
    pruned: AtomicUsize,
}

impl CliReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for CliReporter {
    fn start_build(&self, activity: &str) {
        for counter in [&self.built, &self.current, &self.failed, &self.pruned] {
            counter.store(0, Ordering::Relaxed);
        }
        debug!(activity; "started");
    }

    fn finish_build(&self, activity: &str, elapsed: Duration) {
        let ms = elapsed.as_millis();
        match activity {
            "prune" | "clean" => {
                log!(activity; "removed {} artifacts in {ms}ms", self.pruned.load(Ordering::Relaxed));
            }
            _ => {
                let failed = self.failed.load(Ordering::Relaxed);
                let summary = format!(
                    "{} built, {} current in {ms}ms",
                    self.built.load(Ordering::Relaxed),
                    self.current.load(Ordering::Relaxed),
                );
                if failed > 0 {
                    log!("failed"; "{summary}, {failed} failed");
                } else {
                    log!(activity; "{summary}");
                }
            }
        }
    }

    fn enter_source(&self, source: &Source) {
        debug!("source"; "{source}");
    }

    fn build_func(&self, program: &str) {
        debug!("program"; "{program}");
    }

    fn finish_artifact_build(&self, artifact: &ArtifactSpec, state: ArtifactState) {
        match state {
            ArtifactState::Built => {
                self.built.fetch_add(1, Ordering::Relaxed);
                debug!("build"; "{}", artifact.name);
            }
            ArtifactState::Current => {
                self.current.fetch_add(1, Ordering::Relaxed);
            }
            ArtifactState::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn report_failure(&self, error: &BuildProgramError) {
        log!("error"; "{}: {}", error.artifact, error.detail());
    }

    fn report_pruned(&self, artifact: &str) {
        self.pruned.fetch_add(1, Ordering::Relaxed);
        debug!("prune"; "{artifact}");
    }
}

// ============================================================================
// capture
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    StartBuild(String),
    FinishBuild(String),
    EnterSource(String),
    LeaveSource(String),
    State { artifact: String, state: ArtifactState },
    StartArtifact { artifact: String, is_current: bool },
    BuildFunc(String),
    FinishArtifact { artifact: String, state: ArtifactState },
    Failure { artifact: String, message: String },
    Pruned(String),
}

/// Captures every event, for tooling and tests.
#[derive(Default)]
pub struct BufferReporter {
    events: Mutex<Vec<BuildEvent>>,
}

impl BufferReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Artifacts that finished in `state`, in order.
    pub fn artifacts_in(&self, state: ArtifactState) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BuildEvent::FinishArtifact { artifact, state: s } if *s == state => {
                    Some(artifact.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: BuildEvent) {
        self.events.lock().push(event);
    }
}

impl Reporter for BufferReporter {
    fn start_build(&self, activity: &str) {
        self.push(BuildEvent::StartBuild(activity.to_string()));
    }

    fn finish_build(&self, activity: &str, _elapsed: Duration) {
        self.push(BuildEvent::FinishBuild(activity.to_string()));
    }

    fn enter_source(&self, source: &Source) {
        self.push(BuildEvent::EnterSource(source.identity()));
    }

    fn leave_source(&self, source: &Source) {
        self.push(BuildEvent::LeaveSource(source.identity()));
    }

    fn artifact_state(&self, artifact: &ArtifactSpec, state: ArtifactState) {
        self.push(BuildEvent::State {
            artifact: artifact.name.clone(),
            state,
        });
    }

    fn start_artifact_build(&self, artifact: &ArtifactSpec, is_current: bool) {
        self.push(BuildEvent::StartArtifact {
            artifact: artifact.name.clone(),
            is_current,
        });
    }

    fn build_func(&self, program: &str) {
        self.push(BuildEvent::BuildFunc(program.to_string()));
    }

    fn finish_artifact_build(&self, artifact: &ArtifactSpec, state: ArtifactState) {
        self.push(BuildEvent::FinishArtifact {
            artifact: artifact.name.clone(),
            state,
        });
    }

    fn report_failure(&self, error: &BuildProgramError) {
        self.push(BuildEvent::Failure {
            artifact: error.artifact.clone(),
            message: error.detail(),
        });
    }

    fn report_pruned(&self, artifact: &str) {
        self.push(BuildEvent::Pruned(artifact.to_string()));
    }
}

// ============================================================================
// live reload
// ============================================================================

const STREAM_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// URL of an artifact that was rebuilt.
    Change(String),
    Heartbeat,
}

/// Fans rebuilt artifact URLs out to every subscribed stream.
#[derive(Default)]
pub struct ChangeHub {
    subscribers: Mutex<Vec<Sender<String>>>,
}

impl ChangeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(&self) -> ChangeStream {
        let (tx, rx) = channel::bounded(STREAM_CAPACITY);
        self.subscribers.lock().push(tx);
        ChangeStream { rx }
    }

    /// Deliver `url` to every live subscriber. Slow subscribers lose events
    /// once their buffer is full; gone subscribers are dropped.
    pub fn publish(&self, url: &str) {
        self.subscribers
            .lock()
            .retain(|tx| !matches!(tx.try_send(url.to_string()), Err(TrySendError::Disconnected(_))));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

pub struct ChangeStream {
    rx: Receiver<String>,
}

impl ChangeStream {
    /// Wait up to `timeout` for a change. `None` once the hub is gone.
    pub fn next_event(&self, timeout: Duration) -> Option<StreamEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(url) => Some(StreamEvent::Change(url)),
            Err(RecvTimeoutError::Timeout) => Some(StreamEvent::Heartbeat),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Publishes the URL of every built artifact.
pub struct ChangeStreamReporter {
    hub: Arc<ChangeHub>,
}

impl ChangeStreamReporter {
    pub fn new(hub: Arc<ChangeHub>) -> Self {
        Self { hub }
    }
}

impl Reporter for ChangeStreamReporter {
    fn finish_artifact_build(&self, artifact: &ArtifactSpec, state: ArtifactState) {
        if state == ArtifactState::Built {
            self.hub.publish(artifact.url.as_str());
        }
    }
}

/// Forwards every event to each inner reporter.
pub struct MultiReporter(pub Vec<Box<dyn Reporter>>);

impl Reporter for MultiReporter {
    fn start_build(&self, activity: &str) {
        self.0.iter().for_each(|r| r.start_build(activity));
    }

    fn finish_build(&self, activity: &str, elapsed: Duration) {
        self.0.iter().for_each(|r| r.finish_build(activity, elapsed));
    }

    fn enter_source(&self, source: &Source) {
        self.0.iter().for_each(|r| r.enter_source(source));
    }

    fn leave_source(&self, source: &Source) {
        self.0.iter().for_each(|r| r.leave_source(source));
    }

    fn artifact_state(&self, artifact: &ArtifactSpec, state: ArtifactState) {
        self.0.iter().for_each(|r| r.artifact_state(artifact, state));
    }

    fn start_artifact_build(&self, artifact: &ArtifactSpec, is_current: bool) {
        self.0.iter().for_each(|r| r.start_artifact_build(artifact, is_current));
    }

    fn build_func(&self, program: &str) {
        self.0.iter().for_each(|r| r.build_func(program));
    }

    fn finish_artifact_build(&self, artifact: &ArtifactSpec, state: ArtifactState) {
        self.0.iter().for_each(|r| r.finish_artifact_build(artifact, state));
    }

    fn report_failure(&self, error: &BuildProgramError) {
        self.0.iter().for_each(|r| r.report_failure(error));
    }

    fn report_pruned(&self, artifact: &str) {
        self.0.iter().for_each(|r| r.report_pruned(artifact));
    }
}
