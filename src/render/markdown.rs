//! Markdown field values and their render cache.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use super::RenderError;
use super::context::{RenderContext, RenderGuard};
use super::links::PadLinks;
use crate::address::{Alt, DbPath};
use crate::build::recorder;
use crate::db::{LinkPolicy, Pad, Record};
use crate::hooks::HookEvent;

/// Renders are cached per artifact URL and pad generation: the same field
/// renders differently for artifacts at different URLs (relative links) and
/// after the source graph changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderCacheKey {
    pub base_url: String,
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    pub html: String,
    pub meta: Map<String, Value>,
}

/// A markdown field value.
pub struct Markdown {
    source: String,
    /// Owning record, without alt.
    record: DbPath,
    alt: Alt,
    policy: LinkPolicy,
    cache: Mutex<FxHashMap<RenderCacheKey, Arc<RenderResult>>>,
}

impl Markdown {
    pub fn new(source: &str, record: DbPath, alt: Alt, policy: LinkPolicy) -> Self {
        Self {
            source: source.to_string(),
            record: DbPath::new(record.record),
            alt,
            policy,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn policy(&self) -> LinkPolicy {
        self.policy
    }

    /// `None` outside a build: nothing is cached without an active artifact.
    pub fn get_cache_key(generation: u64) -> Option<RenderCacheKey> {
        recorder::active_artifact().map(|artifact| RenderCacheKey {
            base_url: artifact.base_url,
            generation,
        })
    }

    pub fn cached_renders(&self) -> usize {
        self.cache.lock().len()
    }

    /// Render to HTML for the active artifact.
    ///
    /// Links resolve relative to the artifact URL, or to the record URL when
    /// nothing is building.
    pub fn render(&self, pad: &Pad, record: &Record) -> Result<Arc<RenderResult>, RenderError> {
        let key = Self::get_cache_key(pad.generation());
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.lock().get(k).cloned()) {
            return Ok(hit);
        }

        let hooks = &pad.env().hooks;
        let mut meta = Map::new();
        hooks.emit(&mut HookEvent::PreRender {
            record,
            meta: &mut meta,
        });

        let base_url = key
            .as_ref()
            .map_or_else(|| record.url.as_str().to_string(), |k| k.base_url.clone());
        let guard = RenderGuard::install(RenderContext {
            record: self.record.clone(),
            alt: self.alt.clone(),
            base_url,
            policy: self.policy,
            meta,
        })?;
        let mut html = pad.env().markup.render(&self.source, &PadLinks::new(pad))?;
        let mut meta = guard.finish().map(|ctx| ctx.meta).unwrap_or_default();

        hooks.emit(&mut HookEvent::PostRender {
            record,
            html: &mut html,
            meta: &mut meta,
        });

        let result = Arc::new(RenderResult { html, meta });
        if let Some(key) = key {
            self.cache.lock().insert(key, Arc::clone(&result));
        }
        Ok(result)
    }
}

impl fmt::Debug for Markdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Markdown")
            .field("record", &self.record)
            .field("alt", &self.alt)
            .field("policy", &self.policy)
            .field("len", &self.source.len())
            .finish()
    }
}
