//! Child queries.

use std::sync::Arc;

use super::fields::{FieldFilter, OrderKey, compare_by};
use super::record::Record;
use super::{DbError, Pad};
use crate::address::{Alt, RecordPath};
use crate::build::recorder;

/// Lazy query over a record's children.
///
/// Hidden and undiscoverable children are skipped unless included. Without
/// an explicit order the parent model's `[children] order_by` applies, then
/// the record id.
pub struct Query<'a> {
    pad: &'a Pad,
    parent: RecordPath,
    alt: Alt,
    include_hidden: bool,
    include_undiscoverable: bool,
    filters: Vec<FieldFilter>,
    order: Option<Vec<OrderKey>>,
}

impl<'a> Query<'a> {
    pub(super) fn new(pad: &'a Pad, parent: RecordPath, alt: Alt) -> Self {
        Self {
            pad,
            parent,
            alt,
            include_hidden: false,
            include_undiscoverable: false,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn include_hidden(mut self, yes: bool) -> Self {
        self.include_hidden = yes;
        self
    }

    pub fn include_undiscoverable(mut self, yes: bool) -> Self {
        self.include_undiscoverable = yes;
        self
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by<S: AsRef<str>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.order = Some(keys.into_iter().map(|k| OrderKey::parse(k.as_ref())).collect());
        self
    }

    /// All matching children, ordered.
    pub fn all(&self) -> Result<Vec<Arc<Record>>, DbError> {
        let Some(parent) = self.pad.get_record(&self.parent, &self.alt)? else {
            return Ok(Vec::new());
        };

        let mut children = Vec::new();
        for id in child_ids(&parent) {
            let Some(child) = self.pad.get_record(&self.parent.child(&id), &self.alt)? else {
                continue;
            };
            if child.hidden && !self.include_hidden {
                continue;
            }
            if !child.discoverable && !child.hidden && !self.include_undiscoverable {
                continue;
            }
            if self.filters.iter().all(|f| f.matches(&child)) {
                children.push(child);
            }
        }

        let keys = match &self.order {
            Some(keys) => keys.clone(),
            None => parent
                .model
                .config
                .children
                .order_by
                .iter()
                .map(|k| OrderKey::parse(k))
                .collect(),
        };
        children.sort_by(|a, b| {
            compare_by(&keys, a, b).then_with(|| a.id.cmp(&b.id))
        });
        Ok(children)
    }

    pub fn first(&self) -> Result<Option<Arc<Record>>, DbError> {
        Ok(self.all()?.into_iter().next())
    }

    pub fn count(&self) -> Result<usize, DbError> {
        Ok(self.all()?.len())
    }

    /// Child with `id`, if it passes the query.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Record>>, DbError> {
        Ok(self.all()?.into_iter().find(|r| r.id == id))
    }
}

/// Subdirectory names of a record directory. Records the listing.
pub(super) fn child_ids(parent: &Record) -> Vec<String> {
    recorder::record(&parent.dir);
    let Ok(entries) = std::fs::read_dir(&parent.dir) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.') && !name.starts_with('_'))
        .collect();
    ids.sort();
    ids
}

/// Attachment file names of a record directory. Records the listing.
pub(super) fn attachment_names(parent: &Record) -> Vec<String> {
    recorder::record(&parent.dir);
    let Ok(entries) = std::fs::read_dir(&parent.dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| super::attachment::is_attachment_name(name))
        .collect();
    names.sort();
    names
}
