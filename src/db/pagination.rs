//! Pagination of a record's children.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use super::fields::FieldFilter;
use super::record::Record;
use super::source::{Source, VirtualSource};
use super::{DbError, Pad};
use crate::address::{Alt, DbPath, UrlPath};

/// Per-page view on a record's children.
///
/// `page == None` is the canonical view; it shows page 1 at the record's URL.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub record: Arc<Record>,
    pub page: Option<u32>,
    pub per_page: u32,
    pub total: usize,
    pub pages: u32,
}

/// Pages needed for `total` items, at least one; saturates at `u32::MAX`.
fn page_count(total: usize, per_page: u32) -> u32 {
    let per_page = usize::try_from(per_page).unwrap_or(usize::MAX).max(1);
    u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX).max(1)
}

impl Pagination {
    pub(super) fn new(record: Arc<Record>, page: Option<u32>, total: usize) -> Self {
        let per_page = record.model.config.pagination.per_page.max(1);
        let pages = page_count(total, per_page);
        Self {
            record,
            page,
            per_page,
            total,
            pages,
        }
    }

    /// The page number, `None` counting as 1.
    #[inline]
    pub fn current(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn has_prev(&self) -> bool {
        self.current() > 1
    }

    pub fn has_next(&self) -> bool {
        self.current() < self.pages
    }

    pub fn prev_num(&self) -> Option<u32> {
        self.has_prev().then(|| self.current() - 1)
    }

    pub fn next_num(&self) -> Option<u32> {
        self.has_next().then(|| self.current() + 1)
    }

    /// The view for page `n`; `None` outside `1..=pages`.
    pub fn for_page(&self, n: u32) -> Option<Self> {
        (1..=self.pages).contains(&n).then(|| Self {
            page: Some(n),
            ..self.clone()
        })
    }

    pub fn prev(&self) -> Option<Self> {
        self.prev_num().and_then(|n| self.for_page(n))
    }

    pub fn next(&self) -> Option<Self> {
        self.next_num().and_then(|n| self.for_page(n))
    }

    /// URL of page `n`. Page 1 is the record's own URL.
    pub fn page_url(&self, n: u32) -> UrlPath {
        page_url(&self.record, n)
    }

    pub fn url_path(&self) -> UrlPath {
        self.page_url(self.current())
    }

    /// Children shown on the current page.
    pub fn items(&self, pad: &Pad) -> Result<Vec<Arc<Record>>, DbError> {
        let start = (self.current() - 1) as usize * self.per_page as usize;
        let items = paginated_query(pad, &self.record)?;
        Ok(items
            .into_iter()
            .skip(start)
            .take(self.per_page as usize)
            .collect())
    }
}

/// The children a paginated record distributes over its pages.
pub(super) fn paginated_query(pad: &Pad, record: &Record) -> Result<Vec<Arc<Record>>, DbError> {
    let mut query = pad.query(record.record_path(), &record.alt);
    if let Some(filter) = record
        .model
        .config
        .pagination
        .filter
        .as_deref()
        .and_then(FieldFilter::parse)
    {
        query = query.filter(filter);
    }
    query.all()
}

pub fn page_url(record: &Record, n: u32) -> UrlPath {
    if n <= 1 {
        return record.url.clone();
    }
    let suffix = &record.model.config.pagination.url_suffix;
    let base = record.url.as_str().trim_end_matches('/');
    UrlPath::from_page(&format!("{base}/{suffix}/{n}"))
}

/// `<record>@<n>` as a source.
#[derive(Debug)]
pub struct PaginationPage {
    pub record: Arc<Record>,
    pub page: u32,
}

impl PaginationPage {
    pub fn source(record: Arc<Record>, page: u32) -> Source {
        Source::Virtual(Arc::new(Self { record, page }))
    }
}

impl VirtualSource for PaginationPage {
    fn kind(&self) -> &'static str {
        "pagination"
    }

    fn path(&self) -> DbPath {
        self.record.path.clone().with_page(Some(self.page))
    }

    fn alt(&self) -> &Alt {
        &self.record.alt
    }

    fn parent(&self) -> Source {
        Source::Record(Arc::clone(&self.record))
    }

    fn record(&self) -> Option<Arc<Record>> {
        Some(Arc::clone(&self.record))
    }

    fn url_path(&self) -> UrlPath {
        page_url(&self.record, self.page)
    }

    fn source_filenames(&self) -> Vec<PathBuf> {
        self.record.source_files.clone()
    }

    fn is_hidden(&self) -> bool {
        self.record.hidden
    }

    fn is_discoverable(&self) -> bool {
        self.record.discoverable
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
