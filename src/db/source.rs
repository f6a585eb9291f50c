//! The `Source` capability set shared by every addressable node.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::asset::Asset;
use super::attachment::Attachment;
use super::pagination::PaginationPage;
use super::record::Record;
use super::thumbnail::Thumbnail;
use super::{DbError, Pad};
use crate::address::{Alt, DbPath, UrlPath};

/// A source backed by another source: pagination pages, thumbnails and
/// whatever plugins register.
pub trait VirtualSource: fmt::Debug + Send + Sync {
    /// Short name used in logs and by build program predicates.
    fn kind(&self) -> &'static str;
    fn path(&self) -> DbPath;
    fn alt(&self) -> &Alt;
    fn parent(&self) -> Source;
    /// The record this source belongs to, if any.
    fn record(&self) -> Option<Arc<Record>>;
    fn url_path(&self) -> UrlPath;
    fn source_filenames(&self) -> Vec<PathBuf>;

    fn is_hidden(&self) -> bool {
        self.parent().is_hidden()
    }

    fn is_discoverable(&self) -> bool {
        !self.is_hidden()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Resolves `<owner>@<prefix>/<rest>` virtual paths.
pub trait VirtualResolver: Send + Sync {
    fn resolve(&self, pad: &Pad, owner: &Source, rest: &str) -> Result<Option<Source>, DbError>;
}

#[derive(Debug, Clone)]
pub enum Source {
    Record(Arc<Record>),
    Attachment(Arc<Attachment>),
    Asset(Arc<Asset>),
    Virtual(Arc<dyn VirtualSource>),
}

impl Source {
    /// Database path; `None` for assets, which live outside the content tree.
    pub fn path(&self) -> Option<DbPath> {
        match self {
            Self::Record(r) => Some(r.path.clone()),
            Self::Attachment(a) => Some(a.path.clone()),
            Self::Asset(_) => None,
            Self::Virtual(v) => Some(v.path()),
        }
    }

    pub fn alt(&self) -> Alt {
        match self {
            Self::Record(r) => r.alt.clone(),
            Self::Attachment(a) => a.alt.clone(),
            Self::Asset(_) => Alt::primary(),
            Self::Virtual(v) => v.alt().clone(),
        }
    }

    /// Identity string stored in the build state.
    pub fn identity(&self) -> String {
        match self {
            Self::Asset(a) => a.identity(),
            _ => self.path().map(|p| p.to_string()).unwrap_or_default(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Attachment(_) => "attachment",
            Self::Asset(a) if a.is_dir => "asset-dir",
            Self::Asset(_) => "asset",
            Self::Virtual(v) => v.kind(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            Self::Record(r) => r.hidden,
            Self::Attachment(a) => a.hidden,
            Self::Asset(_) => false,
            Self::Virtual(v) => v.is_hidden(),
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.is_hidden()
    }

    pub fn is_discoverable(&self) -> bool {
        match self {
            Self::Record(r) => r.discoverable,
            Self::Virtual(v) => v.is_discoverable(),
            _ => !self.is_hidden(),
        }
    }

    pub fn url_path(&self) -> UrlPath {
        match self {
            Self::Record(r) => r.url.clone(),
            Self::Attachment(a) => a.url.clone(),
            Self::Asset(a) => a.url.clone(),
            Self::Virtual(v) => v.url_path(),
        }
    }

    /// Files backing this source, including per-alt files not created yet.
    pub fn source_filenames(&self) -> Vec<PathBuf> {
        match self {
            Self::Record(r) => r.source_files.clone(),
            Self::Attachment(a) => a.source_filenames(),
            Self::Asset(a) => vec![a.file.clone()],
            Self::Virtual(v) => v.source_filenames(),
        }
    }

    pub fn record(&self) -> Option<Arc<Record>> {
        match self {
            Self::Record(r) => Some(Arc::clone(r)),
            Self::Attachment(a) => Some(Arc::clone(&a.record)),
            Self::Asset(_) => None,
            Self::Virtual(v) => v.record(),
        }
    }

    pub fn parent(&self) -> Option<Source> {
        match self {
            Self::Record(r) => r.parent.clone().map(Source::Record),
            Self::Attachment(a) => Some(Source::Record(Arc::clone(&a.record))),
            Self::Asset(_) => None,
            Self::Virtual(v) => Some(v.parent()),
        }
    }

    /// Virtual sources hanging off this source: pagination pages 2..=N of
    /// a paginated record, declared thumbnails of an image attachment.
    pub fn virtual_sources(&self, pad: &Pad) -> Result<Vec<Source>, DbError> {
        match self {
            Self::Record(r) if r.model.paginated() => {
                let pages = pad.pagination(r, None)?.pages;
                Ok((2..=pages)
                    .map(|page| PaginationPage::source(Arc::clone(r), page))
                    .collect())
            }
            Self::Attachment(a) => Ok(a
                .thumbnail_widths()
                .iter()
                .map(|&width| Thumbnail::source(Arc::clone(a), width))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Resolve the URL segments below this source.
    pub fn resolve_url_path(&self, pad: &Pad, segments: &[&str]) -> Result<Option<Source>, DbError> {
        if segments.is_empty() {
            return Ok(Some(self.clone()));
        }
        match self {
            Self::Record(r) => pad.resolve_below_record(r, segments),
            Self::Asset(a) if a.is_dir => {
                let rel = if a.rel.is_empty() {
                    segments.join("/")
                } else {
                    format!("{}/{}", a.rel, segments.join("/"))
                };
                Ok(pad.get_asset(&rel))
            }
            _ => Ok(None),
        }
    }

    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_attachment(&self) -> Option<&Arc<Attachment>> {
        match self {
            Self::Attachment(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&Arc<Asset>> {
        match self {
            Self::Asset(a) => Some(a),
            _ => None,
        }
    }

    /// Downcast a virtual source.
    pub fn as_virtual<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Virtual(v) => v.as_any().downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.identity())
    }
}
