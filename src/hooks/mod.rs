//! Plugin event hooks.
//!
//! Fire-and-forget: listeners observe (and may annotate render metadata or
//! HTML) but cannot fail a build.
//!
//! | Event            | When                                        |
//! |------------------|---------------------------------------------|
//! | `BeforeBuildAll` | start of a full build pass                  |
//! | `AfterBuildAll`  | end of a full build pass                    |
//! | `BeforeBuild`    | before the artifacts of one source          |
//! | `AfterBuild`     | after the artifacts of one source           |
//! | `BeforePrune`    | before stale artifacts are removed          |
//! | `AfterPrune`     | after stale artifacts are removed           |
//! | `PreRender`      | before a markup field renders               |
//! | `PostRender`     | after a markup field renders                |

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::build::BuildSummary;
use crate::db::{Record, Source};
use crate::debug;

pub enum HookEvent<'a> {
    BeforeBuildAll,
    AfterBuildAll {
        summary: &'a BuildSummary,
    },
    BeforeBuild {
        source: &'a Source,
    },
    AfterBuild {
        source: &'a Source,
    },
    BeforePrune,
    AfterPrune {
        removed: &'a [String],
    },
    PreRender {
        record: &'a Record,
        meta: &'a mut Map<String, Value>,
    },
    PostRender {
        record: &'a Record,
        html: &'a mut String,
        meta: &'a mut Map<String, Value>,
    },
}

impl HookEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeBuildAll => "before-build-all",
            Self::AfterBuildAll { .. } => "after-build-all",
            Self::BeforeBuild { .. } => "before-build",
            Self::AfterBuild { .. } => "after-build",
            Self::BeforePrune => "before-prune",
            Self::AfterPrune { .. } => "after-prune",
            Self::PreRender { .. } => "pre-render",
            Self::PostRender { .. } => "post-render",
        }
    }
}

/// A plugin listening for events.
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: &mut HookEvent<'_>);
}

/// Event dispatcher owned by the environment.
pub trait HookBus: Send + Sync {
    fn emit(&self, event: &mut HookEvent<'_>);
}

/// Dispatches to registered hooks in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        debug!("hooks"; "registered `{}`", hook.name());
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl HookBus for HookRegistry {
    fn emit(&self, event: &mut HookEvent<'_>) {
        for hook in &self.hooks {
            hook.on_event(event);
        }
    }
}
