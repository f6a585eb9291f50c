//! Source graph: records, attachments, assets and virtual sources.
//!
//! # Module Structure
//!
//! ```text
//! db/
//! ├── content.rs     # .lr tokenizer
//! ├── model.rs       # models/<name>.toml
//! ├── fields.rs      # FieldValue, FieldFilter, OrderKey
//! ├── record.rs      # Record (alt overlay, hidden inheritance, URLs)
//! ├── attachment.rs  # files next to contents.lr
//! ├── asset.rs       # files below the assets root
//! ├── source.rs      # Source enum, VirtualSource
//! ├── pagination.rs  # Pagination, PaginationPage
//! ├── thumbnail.rs   # Thumbnail, ThumbnailResolver
//! ├── query.rs       # child queries
//! └── pad.rs         # Pad (lookups, cache, URL resolution)
//! ```
//!
//! Every file read while loading a source goes through the dependency
//! recorder, so builds see content, model and directory-listing changes.

mod asset;
mod attachment;
mod content;
mod fields;
mod model;
mod pad;
mod pagination;
mod query;
mod record;
mod source;
mod thumbnail;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use thiserror::Error;

use crate::address::MalformedPathError;

pub use asset::Asset;
pub use attachment::Attachment;
pub use content::{serialize, tokenize};
pub use fields::{FieldFilter, FieldLookup, FieldValue, OrderKey, parse_bool};
pub use model::{DataModel, FieldType, LinkPolicy, ModelConfig, ModelRegistry};
pub use pad::Pad;
pub use pagination::{Pagination, PaginationPage};
pub use query::Query;
pub use record::Record;
pub use source::{Source, VirtualResolver, VirtualSource};
pub use thumbnail::{THUMB_PREFIX, Thumbnail, ThumbnailResolver};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid path")]
    Path(#[from] MalformedPathError),

    #[error("failed to read `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model `{path}`")]
    Model {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
