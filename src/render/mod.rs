//! Markup rendering.
//!
//! # Module Structure
//!
//! ```text
//! render/
//! ├── context.rs     # thread-local render context + guard
//! ├── controller.rs  # MarkupController, renderer sharing, pulldown-cmark
//! ├── links.rs       # link and image target resolution
//! └── markdown.rs    # Markdown field value, per-artifact render cache
//! ```

mod context;
mod controller;
mod links;
mod markdown;


use thiserror::Error;

use crate::address::MalformedPathError;
use crate::build::ReentrantContextError;
use crate::db::DbError;

pub use context::{RenderContext, RenderGuard, is_active, with_context};
pub use controller::{
    LinkRewriter, MarkupController, MarkupRenderer, NoRewrite, PulldownRenderer, RendererFactory,
    RendererSharing,
};
pub use links::PadLinks;
pub use markdown::{Markdown, RenderCacheKey, RenderResult};

/// A link in a field with `resolve_links = "always"` did not resolve.
#[derive(Debug, Clone, Error)]
#[error("unresolvable link `{target}` in `{record}`")]
pub struct UnresolvableLinkError {
    pub target: String,
    pub record: String,
}

// Not transparent: build error classification walks the source chain.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render context unavailable")]
    Reentrant(#[from] ReentrantContextError),

    #[error("link resolution failed")]
    Unresolvable(#[from] UnresolvableLinkError),

    #[error("invalid link path")]
    Path(#[from] MalformedPathError),

    #[error("source lookup failed")]
    Db(#[from] DbError),
}
