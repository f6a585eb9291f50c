//! Attachments: plain files stored next to a record's `contents.lr`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use super::content::tokenize;
use super::fields::{FieldLookup, FieldValue, parse_bool};
use super::model::{FieldSpec, FieldType};
use super::record::Record;
use super::DbError;
use crate::address::{Alt, DbPath, UrlPath};
use crate::build::recorder;
use crate::utils::mime;

#[derive(Debug)]
pub struct Attachment {
    pub path: DbPath,
    pub alt: Alt,
    pub filename: String,
    pub file: PathBuf,
    pub url: UrlPath,
    pub hidden: bool,
    pub fields: BTreeMap<String, FieldValue>,
    /// `<file>+<alt>.lr` then `<file>.lr`.
    pub meta_files: Vec<PathBuf>,
    pub record: Arc<Record>,
}

/// Whether a file in a record directory is an attachment.
pub fn is_attachment_name(name: &str) -> bool {
    !name.starts_with('.') && !name.ends_with(".lr")
}

impl Attachment {
    pub(super) fn load(record: &Arc<Record>, filename: &str) -> Result<Option<Self>, DbError> {
        if !is_attachment_name(filename) || filename.contains('/') {
            return Ok(None);
        }
        let file = record.dir.join(filename);
        if !recorder::exists(&file) || !file.is_file() {
            return Ok(None);
        }

        let alt = &record.alt;
        let mut meta_files = Vec::with_capacity(2);
        if !alt.is_primary_sentinel() {
            meta_files.push(record.dir.join(format!("{filename}+{alt}.lr")));
        }
        meta_files.push(record.dir.join(format!("{filename}.lr")));

        let mut raw = BTreeMap::new();
        for meta in meta_files.iter().rev() {
            recorder::record(meta);
            match std::fs::read_to_string(meta) {
                Ok(text) => raw.extend(tokenize(&text)),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(DbError::Io {
                        path: meta.clone(),
                        source,
                    });
                }
            }
        }

        let hidden = record.hidden
            || raw
                .get("_hidden")
                .and_then(|v| parse_bool(v))
                .unwrap_or(false);
        let path = DbPath::new(record.record_path().child(filename))
            .with_alt_code(Some(alt.as_str()));
        let spec = FieldSpec {
            kind: FieldType::Text,
            ..Default::default()
        };
        let fields = raw
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| {
                let value = FieldValue::from_raw(&spec, value, &path, alt);
                (key.clone(), value)
            })
            .collect();

        Ok(Some(Self {
            url: record.url.join(filename),
            path,
            alt: alt.clone(),
            filename: filename.to_string(),
            file,
            hidden,
            fields,
            meta_files,
            record: Arc::clone(record),
        }))
    }

    pub fn is_image(&self) -> bool {
        mime::is_thumbnailable(&self.file)
    }

    /// Thumbnail widths the owning record's model asks for.
    pub fn thumbnail_widths(&self) -> &[u32] {
        if self.is_image() {
            &self.record.model.config.attachments.thumbnails
        } else {
            &[]
        }
    }

    pub fn source_filenames(&self) -> Vec<PathBuf> {
        let mut files = vec![self.file.clone()];
        files.extend(self.meta_files.iter().cloned());
        files
    }
}

impl FieldLookup for Attachment {
    fn lookup(&self, name: &str) -> Option<FieldValue> {
        match name {
            "_id" => Some(FieldValue::Text(self.filename.clone())),
            "_hidden" => Some(FieldValue::Boolean(self.hidden)),
            _ => self.fields.get(name).cloned(),
        }
    }
}
