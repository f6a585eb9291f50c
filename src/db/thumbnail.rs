//! Image thumbnails: `<attachment>@thumb/<width>`.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::attachment::Attachment;
use super::record::Record;
use super::source::{Source, VirtualResolver, VirtualSource};
use super::{DbError, Pad};
use crate::address::{Alt, DbPath, UrlPath};

pub const THUMB_PREFIX: &str = "thumb";

#[derive(Debug)]
pub struct Thumbnail {
    pub attachment: Arc<Attachment>,
    pub width: u32,
}

impl Thumbnail {
    pub fn source(attachment: Arc<Attachment>, width: u32) -> Source {
        Source::Virtual(Arc::new(Self { attachment, width }))
    }

    /// `photo.jpg` at 320 → `photo@320w.jpg`
    pub fn file_name(filename: &str, width: u32) -> String {
        let path = Path::new(filename);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}@{width}w.{ext}"),
            None => format!("{stem}@{width}w"),
        }
    }

    /// Inverse of [`file_name`](Self::file_name): `(attachment name, width)`.
    pub fn parse_file_name(name: &str) -> Option<(String, u32)> {
        let (stem, rest) = name.rsplit_once('@')?;
        let (width, ext) = match rest.split_once('.') {
            Some((width, ext)) => (width, Some(ext)),
            None => (rest, None),
        };
        let width: u32 = width.strip_suffix('w')?.parse().ok()?;
        if width == 0 || stem.is_empty() {
            return None;
        }
        let original = match ext {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        };
        Some((original, width))
    }
}

impl VirtualSource for Thumbnail {
    fn kind(&self) -> &'static str {
        "thumbnail"
    }

    fn path(&self) -> DbPath {
        let virtual_path = format!("{THUMB_PREFIX}/{}", self.width);
        self.attachment
            .path
            .clone()
            .with_virtual(Some(virtual_path.as_str()))
    }

    fn alt(&self) -> &Alt {
        &self.attachment.alt
    }

    fn parent(&self) -> Source {
        Source::Attachment(Arc::clone(&self.attachment))
    }

    fn record(&self) -> Option<Arc<Record>> {
        Some(Arc::clone(&self.attachment.record))
    }

    fn url_path(&self) -> UrlPath {
        self.attachment
            .url
            .join(&Self::file_name(&self.attachment.filename, self.width))
    }

    fn source_filenames(&self) -> Vec<PathBuf> {
        vec![self.attachment.file.clone()]
    }

    fn is_hidden(&self) -> bool {
        self.attachment.hidden
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Built-in resolver for `@thumb/<width>`.
pub struct ThumbnailResolver;

impl VirtualResolver for ThumbnailResolver {
    fn resolve(&self, _pad: &Pad, owner: &Source, rest: &str) -> Result<Option<Source>, DbError> {
        let Some(attachment) = owner.as_attachment() else {
            return Ok(None);
        };
        let width = rest.trim_matches('/').parse::<u32>().ok().filter(|w| *w > 0);
        Ok(match width {
            Some(width) if attachment.is_image() => {
                Some(Thumbnail::source(Arc::clone(attachment), width))
            }
            _ => None,
        })
    }
}
