//! The `Pad`: lazy, generation-scoped access to the source graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::asset::Asset;
use super::attachment::Attachment;
use super::model::ModelRegistry;
use super::pagination::{Pagination, PaginationPage, paginated_query};
use super::query::{Query, attachment_names};
use super::record::Record;
use super::source::Source;
use super::thumbnail::Thumbnail;
use super::DbError;
use crate::address::{AddressSpace, Alt, DbPath, RecordPath, SourceKey, UrlPath};
use crate::build::recorder;
use crate::config::SiteConfig;
use crate::env::Environment;

/// Entry point into the content database.
///
/// Lookups are cached per [`SourceKey`] until [`flush`](Self::flush), which
/// also bumps the generation that render caches are keyed on.
pub struct Pad {
    env: Arc<Environment>,
    models: ModelRegistry,
    cache: RwLock<FxHashMap<SourceKey, Option<Source>>>,
    generation: AtomicU64,
}

impl Pad {
    pub fn new(env: Arc<Environment>) -> Self {
        let models = ModelRegistry::new(&env.config.build.models);
        Self {
            env,
            models,
            cache: RwLock::new(FxHashMap::default()),
            generation: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    #[inline]
    pub fn config(&self) -> &SiteConfig {
        &self.env.config
    }

    #[inline]
    pub fn space(&self) -> &AddressSpace {
        &self.env.space
    }

    #[inline]
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drop every cached source and model and start a new generation.
    pub fn flush(&self) {
        self.cache.write().clear();
        self.models.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn content_dir(&self) -> &Path {
        &self.env.config.build.content
    }

    pub fn assets_dir(&self) -> &Path {
        &self.env.config.build.assets
    }

    /// Directory backing a record path.
    pub fn record_dir(&self, path: &RecordPath) -> PathBuf {
        let mut dir = self.content_dir().to_path_buf();
        dir.extend(path.segments());
        dir
    }

    // ========================================================================
    // lookups
    // ========================================================================

    /// Look up `path` in `alt`, optionally at a pagination page.
    ///
    /// With `persist`, the result stays cached until the next flush.
    pub fn get(
        &self,
        path: &str,
        alt: Option<&str>,
        page_num: Option<u32>,
        persist: bool,
    ) -> Result<Option<Source>, DbError> {
        let parsed = self
            .space()
            .with_alt(self.space().normalize(path)?, alt)?
            .with_requested_page(page_num)?;
        self.get_path(&parsed, persist)
    }

    pub fn get_path(&self, path: &DbPath, persist: bool) -> Result<Option<Source>, DbError> {
        let key = self.space().identity(path);
        let cached = self.cache.read().get(&key).cloned();
        let found = match cached {
            Some(hit) => hit,
            None => {
                let found = self.load(&key)?;
                if persist {
                    self.cache.write().insert(key, found.clone());
                }
                found
            }
        };
        if let Some(source) = &found {
            record_dependencies(source);
        }
        Ok(found)
    }

    /// The record at `path` in `alt`. Always cached.
    pub fn get_record(&self, path: &RecordPath, alt: &Alt) -> Result<Option<Arc<Record>>, DbError> {
        let key = record_key(path, alt);
        let cached = self.cache.read().get(&key).cloned();
        let record = match cached {
            Some(hit) => hit.and_then(|s| s.as_record().cloned()),
            None => {
                let record = Record::load(self, path, alt)?.map(Arc::new);
                self.cache
                    .write()
                    .insert(key, record.clone().map(Source::Record));
                record
            }
        };
        match &record {
            Some(record) => {
                for file in &record.source_files {
                    recorder::record(file);
                }
                recorder::record(&record.model.path);
            }
            // The files that would create it.
            None => {
                let dir = self.record_dir(path);
                recorder::record(dir.join(super::record::CONTENTS_FILE));
                if !alt.is_primary_sentinel() {
                    recorder::record(dir.join(super::record::alt_contents_file(alt)));
                }
            }
        }
        Ok(record)
    }

    pub fn root(&self, alt: &Alt) -> Result<Option<Arc<Record>>, DbError> {
        self.get_record(&RecordPath::root(), alt)
    }

    pub fn asset_root(&self) -> Option<Source> {
        Asset::load(self.assets_dir(), "").map(|a| Source::Asset(Arc::new(a)))
    }

    pub fn get_asset(&self, rel: &str) -> Option<Source> {
        Asset::load(self.assets_dir(), rel).map(|a| Source::Asset(Arc::new(a)))
    }

    /// Look up a source by the identity stored in the build state.
    pub fn get_by_identity(&self, identity: &str) -> Result<Option<Source>, DbError> {
        if let Some(rel) = identity.strip_prefix("asset:") {
            return Ok(self.get_asset(rel));
        }
        let path = self.space().normalize(identity)?;
        self.get_path(&path, false)
    }

    pub fn query(&self, parent: &RecordPath, alt: &Alt) -> Query<'_> {
        Query::new(self, parent.clone(), alt.clone())
    }

    /// Attachments of `record`, sorted by file name.
    pub fn attachments(&self, record: &Arc<Record>) -> Result<Vec<Arc<Attachment>>, DbError> {
        let mut out = Vec::new();
        for name in attachment_names(record) {
            if let Some(attachment) = Attachment::load(record, &name)? {
                out.push(Arc::new(attachment));
            }
        }
        Ok(out)
    }

    /// Pagination of `record` at `page` (`None` = canonical view).
    pub fn pagination(&self, record: &Arc<Record>, page: Option<u32>) -> Result<Pagination, DbError> {
        let total = paginated_query(self, record)?.len();
        Ok(Pagination::new(Arc::clone(record), page, total))
    }

    fn load(&self, key: &SourceKey) -> Result<Option<Source>, DbError> {
        let base = match self.get_record(&key.record, &key.alt)? {
            Some(record) => Source::Record(record),
            None => match self.attachment_at(&key.record, &key.alt)? {
                Some(attachment) => Source::Attachment(attachment),
                None => return Ok(None),
            },
        };

        let base = match key.page {
            None => base,
            Some(page) => {
                let Some(record) = base.as_record() else {
                    return Ok(None);
                };
                if !record.model.paginated() || self.pagination(record, None)?.for_page(page).is_none()
                {
                    return Ok(None);
                }
                PaginationPage::source(Arc::clone(record), page)
            }
        };

        let Some(virtual_path) = key.virtual_path.as_deref() else {
            return Ok(Some(base));
        };
        let (prefix, rest) = virtual_path.split_once('/').unwrap_or((virtual_path, ""));
        match self.env.virtuals.get(prefix) {
            Some(resolver) => resolver.resolve(self, &base, rest),
            None => Ok(None),
        }
    }

    fn attachment_at(&self, path: &RecordPath, alt: &Alt) -> Result<Option<Arc<Attachment>>, DbError> {
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        let Some(record) = self.get_record(&parent, alt)? else {
            return Ok(None);
        };
        Ok(Attachment::load(&record, path.id())?.map(Arc::new))
    }

    // ========================================================================
    // URL resolution
    // ========================================================================

    /// Map a URL path to the source served there.
    ///
    /// The alt comes from the URL prefix. With `alt_fallback`, a URL that
    /// does not resolve in its alt is retried in the default alt. URLs that
    /// match no record fall back to the asset tree.
    pub fn resolve_url_path(&self, url: &str, alt_fallback: bool) -> Result<Option<Source>, DbError> {
        let url = UrlPath::from_file(url);
        let (alt, rest) = self.space().alt_for_url(url.as_str());
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(found) = self.resolve_in_alt(&alt, &segments)? {
            return Ok(Some(found));
        }
        let default_alt = self.space().default_alt();
        if alt_fallback && &alt != default_alt {
            if let Some(found) = self.resolve_in_alt(default_alt, &segments)? {
                return Ok(Some(found));
            }
        }

        let rel = url.as_str().trim_matches('/');
        Ok(self
            .get_asset(rel)
            .filter(|asset| asset.as_asset().is_some_and(|a| !a.is_dir)))
    }

    fn resolve_in_alt(&self, alt: &Alt, segments: &[&str]) -> Result<Option<Source>, DbError> {
        match self.root(alt)? {
            Some(root) if !root.hidden => Source::Record(root).resolve_url_path(self, segments),
            _ => Ok(None),
        }
    }

    /// One step of URL resolution below `record`: child slugs (possibly
    /// spanning several segments), attachments, thumbnails, pagination.
    pub(super) fn resolve_below_record(
        &self,
        record: &Arc<Record>,
        segments: &[&str],
    ) -> Result<Option<Source>, DbError> {
        let children = self
            .query(record.record_path(), &record.alt)
            .include_undiscoverable(true)
            .all()?;
        for child in children {
            let slug: Vec<&str> = child.slug.split('/').filter(|s| !s.is_empty()).collect();
            if slug.is_empty() || !segments.starts_with(&slug) {
                continue;
            }
            let rest = &segments[slug.len()..];
            if let Some(found) = Source::Record(child).resolve_url_path(self, rest)? {
                return Ok(Some(found));
            }
        }

        if let [name] = segments {
            if let Some(attachment) = Attachment::load(record, name)? {
                return Ok((!attachment.hidden).then(|| Source::Attachment(Arc::new(attachment))));
            }
            if let Some((original, width)) = Thumbnail::parse_file_name(name) {
                if let Some(attachment) = Attachment::load(record, &original)? {
                    if !attachment.hidden && attachment.is_image() {
                        return Ok(Some(Thumbnail::source(Arc::new(attachment), width)));
                    }
                }
            }
        }

        if let [suffix, num] = segments {
            let pagination = &record.model.config.pagination;
            if pagination.enabled && *suffix == pagination.url_suffix {
                // Page 1 lives at the record URL only.
                let page = num.parse::<u32>().ok().filter(|n| *n >= 2);
                if let Some(page) = page {
                    if self.pagination(record, None)?.for_page(page).is_some() {
                        return Ok(Some(PaginationPage::source(Arc::clone(record), page)));
                    }
                }
            }
        }

        Ok(None)
    }
}

fn record_key(path: &RecordPath, alt: &Alt) -> SourceKey {
    SourceKey {
        record: path.clone(),
        alt: alt.clone(),
        page: None,
        virtual_path: None,
    }
}

/// Backing files (and the model file of records) of a returned source.
fn record_dependencies(source: &Source) {
    for file in source.source_filenames() {
        recorder::record(file);
    }
    if let Some(record) = source.as_record() {
        recorder::record(&record.model.path);
    }
}
