//! Thread-local render context.
//!
//! Installed for the duration of one markup render so that the renderer and
//! link resolution can see which record is rendering, for which artifact URL,
//! under which link policy. Nested installs are rejected.

use std::cell::RefCell;
use std::marker::PhantomData;

use serde_json::{Map, Value};

use crate::address::{Alt, DbPath};
use crate::build::ReentrantContextError;
use crate::db::LinkPolicy;

#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Owning record path, without alt; relative links resolve against it.
    pub record: DbPath,
    pub alt: Alt,
    /// URL of the artifact being built; resolved links are relative to it.
    pub base_url: String,
    pub policy: LinkPolicy,
    pub meta: Map<String, Value>,
}

thread_local! {
    static CONTEXT: RefCell<Option<RenderContext>> = const { RefCell::new(None) };
}

#[must_use = "dropping the guard uninstalls the context"]
pub struct RenderGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl RenderGuard {
    pub fn install(ctx: RenderContext) -> Result<Self, ReentrantContextError> {
        CONTEXT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(active) = slot.as_ref() {
                return Err(ReentrantContextError {
                    kind: "render",
                    active: active.record.to_string(),
                });
            }
            *slot = Some(ctx);
            Ok(Self {
                _thread_bound: PhantomData,
            })
        })
    }

    /// Uninstall and return the context with whatever the render added.
    pub fn finish(self) -> Option<RenderContext> {
        CONTEXT.with(|slot| slot.borrow_mut().take())
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        let _ = CONTEXT.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Run `f` on the active context, if any.
pub fn with_context<R>(f: impl FnOnce(&mut RenderContext) -> R) -> Option<R> {
    CONTEXT.with(|slot| slot.borrow_mut().as_mut().map(f))
}

pub fn is_active() -> bool {
    CONTEXT.with(|slot| slot.borrow().is_some())
}
