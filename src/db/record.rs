//! Records: directories below the content root with a `contents.lr`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use super::content::tokenize;
use super::fields::{FieldLookup, FieldValue, parse_bool};
use super::model::{DEFAULT_MODEL, DataModel};
use super::{DbError, Pad};
use crate::address::{Alt, DbPath, RecordPath, UrlPath};
use crate::build::recorder;

pub const CONTENTS_FILE: &str = "contents.lr";

/// Content file for `alt` in `dir`: `contents+<alt>.lr`.
pub fn alt_contents_file(alt: &Alt) -> String {
    format!("contents+{alt}.lr")
}

#[derive(Debug)]
pub struct Record {
    /// Record path with the resolved alt written out.
    pub path: DbPath,
    pub alt: Alt,
    pub id: String,
    pub slug: String,
    pub url: UrlPath,
    pub model: Arc<DataModel>,
    pub fields: BTreeMap<String, FieldValue>,
    pub hidden: bool,
    pub discoverable: bool,
    pub template: String,
    pub dir: PathBuf,
    /// Backing files, alt file first. Includes files that do not exist yet.
    pub source_files: Vec<PathBuf>,
    pub parent: Option<Arc<Record>>,
}

impl Record {
    /// Load the record at `path` in `alt`.
    ///
    /// The record exists when its alt file or its primary file exists and
    /// its parent exists. Fields from the alt file override the primary's.
    pub(super) fn load(pad: &Pad, path: &RecordPath, alt: &Alt) -> Result<Option<Self>, DbError> {
        let dir = pad.record_dir(path);
        let mut source_files = Vec::with_capacity(2);
        if !alt.is_primary_sentinel() {
            source_files.push(dir.join(alt_contents_file(alt)));
        }
        source_files.push(dir.join(CONTENTS_FILE));
        for file in &source_files {
            recorder::record(file);
        }
        // Attachments and other plain files are not records.
        if !dir.is_dir() {
            return Ok(None);
        }

        let parent = match path.parent() {
            Some(parent) => match pad.get_record(&parent, alt)? {
                Some(parent) => Some(parent),
                None => return Ok(None),
            },
            None => None,
        };

        let mut raw = BTreeMap::new();
        let mut found = false;
        for file in source_files.iter().rev() {
            match std::fs::read_to_string(file) {
                Ok(text) => {
                    found = true;
                    raw.extend(tokenize(&text));
                }
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {}
                Err(source) => {
                    return Err(DbError::Io {
                        path: file.clone(),
                        source,
                    });
                }
            }
        }
        if !found {
            return Ok(None);
        }

        let model_id = raw
            .get("_model")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                parent
                    .as_ref()
                    .and_then(|p| p.model.config.children.model.clone())
            })
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let model = pad.models().get(&model_id)?;

        let hidden = match raw.get("_hidden").and_then(|v| parse_bool(v)) {
            Some(explicit) => explicit,
            None => inherited_hidden(parent.as_deref(), &model),
        };
        let discoverable = !hidden
            && raw
                .get("_discoverable")
                .and_then(|v| parse_bool(v))
                .unwrap_or(true);

        let id = path.id().to_string();
        let slug = raw
            .get("_slug")
            .map(|s| s.trim().trim_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| id.clone());
        let url = match &parent {
            None => UrlPath::from_page(pad.space().url_prefix(alt)),
            Some(parent) => child_url(&parent.url, &slug),
        };
        let template = raw
            .get("_template")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| model.template());

        let db_path = DbPath::new(path.clone()).with_alt_code(Some(alt.as_str()));
        let fields = raw
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| {
                let spec = model.field(key);
                let value = FieldValue::from_raw(&spec, value, &db_path, alt);
                (key.clone(), value)
            })
            .collect();

        Ok(Some(Self {
            path: db_path,
            alt: alt.clone(),
            id,
            slug,
            url,
            model,
            fields,
            hidden,
            discoverable,
            template,
            dir,
            source_files,
            parent,
        }))
    }

    #[inline]
    pub fn record_path(&self) -> &RecordPath {
        &self.path.record
    }

    /// Path without alt, the base for relative link resolution.
    pub fn link_base(&self) -> DbPath {
        DbPath::new(self.path.record.clone())
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Hidden state a record gets when it does not set `_hidden`.
fn inherited_hidden(parent: Option<&Record>, model: &DataModel) -> bool {
    if let Some(parent) = parent {
        if let Some(hidden) = parent.model.config.children.hidden {
            return hidden || parent.hidden;
        }
    }
    if let Some(hidden) = model.config.model.hidden {
        return hidden || parent.is_some_and(|p| p.hidden);
    }
    parent.is_some_and(|p| p.hidden)
}

/// URL of a child with `slug` below `parent`. A last slug segment with an
/// extension addresses a file instead of a directory.
pub fn child_url(parent: &UrlPath, slug: &str) -> UrlPath {
    let base = parent.as_str().trim_end_matches('/');
    let joined = format!("{base}/{slug}");
    let last = slug.rsplit('/').next().unwrap_or(slug);
    if last.contains('.') {
        UrlPath::from_file(&joined)
    } else {
        UrlPath::from_page(&joined)
    }
}

impl FieldLookup for Record {
    fn lookup(&self, name: &str) -> Option<FieldValue> {
        let text = |s: &str| Some(FieldValue::Text(s.to_string()));
        match name {
            "_id" => text(&self.id),
            "_slug" => text(&self.slug),
            "_path" => text(self.path.record.as_str()),
            "_alt" => text(self.alt.as_str()),
            "_model" => text(&self.model.id),
            "_template" => text(&self.template),
            "_hidden" => Some(FieldValue::Boolean(self.hidden)),
            "_discoverable" => Some(FieldValue::Boolean(self.discoverable)),
            _ => self.fields.get(name).cloned(),
        }
    }
}

impl<T: FieldLookup> FieldLookup for Arc<T> {
    fn lookup(&self, name: &str) -> Option<FieldValue> {
        (**self).lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_url() {
        let root = UrlPath::from_page("/");
        assert_eq!(child_url(&root, "blog").as_str(), "/blog/");
        assert_eq!(child_url(&root, "feed.xml").as_str(), "/feed.xml");
        let de = UrlPath::from_page("/de/");
        assert_eq!(child_url(&de, "2024/hello").as_str(), "/de/2024/hello/");
    }
}
