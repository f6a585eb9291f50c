//! Database path parsing.
//!
//! A [`DbPath`] addresses any node of the content database:
//!
//! ```text
//! /blog/post              record
//! /blog/post+de           record in alternate `de`
//! /blog@2                 second pagination page of `/blog`
//! /blog/photo.jpg@thumb/320  virtual source below an attachment
//! ```
//!
//! Parsing normalizes `.` and `..`, tolerates a trailing slash and rejects
//! empty interior segments or paths escaping the root.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error raised for malformed database paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPathError {
    #[error("empty path")]
    EmptyPath,

    #[error("empty segment in path `{0}`")]
    EmptySegment(String),

    #[error("path `{0}` escapes above the root")]
    EscapesRoot(String),

    #[error("invalid page number in path `{0}`")]
    InvalidPage(String),

    #[error("empty virtual path in `{0}`")]
    EmptyVirtual(String),

    #[error("path `{path}` carries alt `{found}` but alt `{explicit}` was requested")]
    ConflictingAlt {
        path: String,
        found: String,
        explicit: String,
    },

    #[error("path `{path}` carries page {found} but page {explicit} was requested")]
    ConflictingPage {
        path: String,
        found: u32,
        explicit: u32,
    },
}

// ============================================================================
// RecordPath
// ============================================================================

/// Slash separated record path. Root is `/`, no trailing slash otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordPath(Arc<str>);

impl RecordPath {
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    /// Build from already validated segments.
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut path = String::new();
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }
        if path.is_empty() {
            return Self::root();
        }
        Self(Arc::from(path))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_ref() == "/"
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment, empty for the root.
    pub fn id(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let segments: Vec<_> = self.segments().collect();
        Some(Self::from_segments(segments[..segments.len() - 1].iter().copied()))
    }

    pub fn child(&self, id: &str) -> Self {
        Self::from_segments(self.segments().chain(std::iter::once(id)))
    }

    /// Segment-wise prefix test. A path is a descendant of itself when not `strict`.
    pub fn is_descendant_of(&self, other: &Self, strict: bool) -> bool {
        let mine: Vec<_> = self.segments().collect();
        let theirs: Vec<_> = other.segments().collect();
        if mine.len() < theirs.len() || (strict && mine.len() == theirs.len()) {
            return false;
        }
        mine.iter().zip(&theirs).all(|(a, b)| a == b)
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// DbPath
// ============================================================================

/// Structured database path: record path, explicit alt, page and virtual path.
///
/// The alt kept here is the one written in the path (`+de`). Resolving it
/// against the configured alternates is the job of
/// [`AddressSpace`](super::AddressSpace).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbPath {
    pub record: RecordPath,
    pub alt: Option<Arc<str>>,
    pub page: Option<u32>,
    pub virtual_path: Option<Arc<str>>,
}

impl DbPath {
    pub fn new(record: RecordPath) -> Self {
        Self {
            record,
            alt: None,
            page: None,
            virtual_path: None,
        }
    }

    pub fn root() -> Self {
        Self::new(RecordPath::root())
    }

    pub fn with_page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }

    /// Apply a page requested next to the path. A path that already names
    /// a different page is rejected.
    pub fn with_requested_page(self, page: Option<u32>) -> Result<Self, MalformedPathError> {
        match (self.page, page) {
            (Some(found), Some(explicit)) if found != explicit => {
                Err(MalformedPathError::ConflictingPage {
                    path: self.to_string(),
                    found,
                    explicit,
                })
            }
            (_, Some(explicit)) => Ok(self.with_page(Some(explicit))),
            (_, None) => Ok(self),
        }
    }

    pub fn with_virtual(mut self, virtual_path: Option<&str>) -> Self {
        self.virtual_path = virtual_path.map(Arc::from);
        self
    }

    pub fn with_alt_code(mut self, alt: Option<&str>) -> Self {
        self.alt = alt.map(Arc::from);
        self
    }

    /// Parse an absolute path (the leading `/` is optional).
    pub fn parse(raw: &str) -> Result<Self, MalformedPathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MalformedPathError::EmptyPath);
        }
        let (path_part, suffix) = split_suffix(trimmed);
        let (path_part, alt) = split_alt(path_part);
        let segments = normalize_segments(&[], path_part, raw)?;
        let (page, virtual_path) = parse_suffix(suffix, raw)?;

        Ok(Self {
            record: RecordPath::from_segments(segments.iter().map(String::as_str)),
            alt: alt.map(Arc::from),
            page,
            virtual_path,
        })
    }

    /// Resolve `relative` against this path.
    ///
    /// - absolute paths replace the base
    /// - a bare `@...` suffix attaches to the base record
    /// - anything else resolves against the base record path
    ///
    /// The base page and virtual path are dropped; the base alt carries over
    /// unless `relative` names its own.
    pub fn join(&self, relative: &str) -> Result<Self, MalformedPathError> {
        let relative = relative.trim();
        if relative.starts_with('/') {
            return Self::parse(relative);
        }

        let (path_part, suffix) = split_suffix(relative);
        let (path_part, alt) = split_alt(path_part);
        let base: Vec<_> = self.record.segments().collect();
        let segments = normalize_segments(&base, path_part, relative)?;
        let (page, virtual_path) = parse_suffix(suffix, relative)?;

        Ok(Self {
            record: RecordPath::from_segments(segments.iter().map(String::as_str)),
            alt: alt.map(Arc::from).or_else(|| self.alt.clone()),
            page,
            virtual_path,
        })
    }

    /// `(record, explicit alt, page, virtual path)`
    pub fn split(&self) -> (&RecordPath, Option<&str>, Option<u32>, Option<&str>) {
        (
            &self.record,
            self.alt.as_deref(),
            self.page,
            self.virtual_path.as_deref(),
        )
    }

    #[inline]
    pub fn has_suffix(&self) -> bool {
        self.page.is_some() || self.virtual_path.is_some()
    }

    /// Record-path prefix relation. A paged or virtual path is a strict
    /// child of its own record.
    pub fn is_child_of(&self, other: &Self, strict: bool) -> bool {
        if !self.record.is_descendant_of(&other.record, false) {
            return false;
        }
        if !strict || self.record != other.record {
            return true;
        }
        self.has_suffix() && !other.has_suffix()
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record.as_str())?;
        if let Some(alt) = &self.alt {
            write!(f, "+{alt}")?;
        }
        if let Some(page) = self.page {
            write!(f, "@{page}")?;
        }
        if let Some(virtual_path) = &self.virtual_path {
            write!(f, "@{virtual_path}")?;
        }
        Ok(())
    }
}

// ============================================================================
// parsing helpers
// ============================================================================

/// Split at the first `@`: `(path, suffix)`.
fn split_suffix(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('@') {
        Some((path, suffix)) => (path, Some(suffix)),
        None => (raw, None),
    }
}

/// Split a `+alt` marker off the last segment.
///
/// Only a non-empty token of ASCII alphanumerics, `_` or `-` counts as an alt,
/// so file names such as `c++.txt` stay intact.
fn split_alt(path: &str) -> (&str, Option<&str>) {
    let last_slash = path.rfind('/').map_or(0, |i| i + 1);
    let Some(plus) = path[last_slash..].rfind('+') else {
        return (path, None);
    };
    let plus = last_slash + plus;
    let alt = &path[plus + 1..];
    if !alt.is_empty() && alt.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        (&path[..plus], Some(alt))
    } else {
        (path, None)
    }
}

fn normalize_segments(
    base: &[&str],
    path: &str,
    raw: &str,
) -> Result<Vec<String>, MalformedPathError> {
    let mut out: Vec<String> = base.iter().map(|s| (*s).to_string()).collect();
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Ok(out);
    }

    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(MalformedPathError::EmptySegment(raw.to_string())),
            "." => {}
            ".." => {
                if out.pop().is_none() {
                    return Err(MalformedPathError::EscapesRoot(raw.to_string()));
                }
            }
            other => out.push(other.to_string()),
        }
    }
    Ok(out)
}

#[allow(clippy::type_complexity)]
fn parse_suffix(
    suffix: Option<&str>,
    raw: &str,
) -> Result<(Option<u32>, Option<Arc<str>>), MalformedPathError> {
    let Some(suffix) = suffix else {
        return Ok((None, None));
    };
    let suffix = suffix.trim_end_matches('/');
    if suffix.is_empty() {
        return Err(MalformedPathError::EmptyVirtual(raw.to_string()));
    }
    if suffix.bytes().all(|b| b.is_ascii_digit()) {
        return match suffix.parse::<u32>() {
            Ok(0) | Err(_) => Err(MalformedPathError::InvalidPage(raw.to_string())),
            Ok(page) => Ok((Some(page), None)),
        };
    }
    if suffix.split('/').any(str::is_empty) {
        return Err(MalformedPathError::EmptySegment(raw.to_string()));
    }
    Ok((None, Some(Arc::from(suffix))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> DbPath {
        DbPath::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_record_paths() {
        assert_eq!(parse("/").record.as_str(), "/");
        assert_eq!(parse("blog/post").record.as_str(), "/blog/post");
        assert_eq!(parse("/blog/post/").record.as_str(), "/blog/post");
        assert_eq!(parse("/blog/./post").record.as_str(), "/blog/post");
        assert_eq!(parse("/blog/x/../post").record.as_str(), "/blog/post");
    }

    #[test]
    fn test_parse_alt_page_virtual() {
        let path = parse("/blog/post+de@2");
        assert_eq!(path.record.as_str(), "/blog/post");
        assert_eq!(path.alt.as_deref(), Some("de"));
        assert_eq!(path.page, Some(2));
        assert_eq!(path.virtual_path, None);

        let path = parse("/blog/photo.jpg@thumb/320");
        assert_eq!(path.record.as_str(), "/blog/photo.jpg");
        assert_eq!(path.page, None);
        assert_eq!(path.virtual_path.as_deref(), Some("thumb/320"));

        let root = parse("/+de");
        assert!(root.record.is_root());
        assert_eq!(root.alt.as_deref(), Some("de"));
    }

    #[test]
    fn test_plus_in_file_name_is_not_an_alt() {
        let path = parse("/downloads/c++.txt");
        assert_eq!(path.record.as_str(), "/downloads/c++.txt");
        assert_eq!(path.alt, None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(DbPath::parse(""), Err(MalformedPathError::EmptyPath));
        assert!(matches!(
            DbPath::parse("/a//b"),
            Err(MalformedPathError::EmptySegment(_))
        ));
        assert!(matches!(
            DbPath::parse("/a/../.."),
            Err(MalformedPathError::EscapesRoot(_))
        ));
        assert!(matches!(
            DbPath::parse("/blog@0"),
            Err(MalformedPathError::InvalidPage(_))
        ));
        assert!(matches!(
            DbPath::parse("/blog@"),
            Err(MalformedPathError::EmptyVirtual(_))
        ));
    }

    #[test]
    fn test_requested_page() {
        let path = parse("/blog@2");
        assert_eq!(path.clone().with_requested_page(None).unwrap().page, Some(2));
        assert_eq!(path.clone().with_requested_page(Some(2)).unwrap().page, Some(2));
        assert_eq!(parse("/blog").with_requested_page(Some(3)).unwrap().page, Some(3));
        assert!(matches!(
            path.with_requested_page(Some(3)),
            Err(MalformedPathError::ConflictingPage { found: 2, explicit: 3, .. })
        ));
    }

    #[test]
    fn test_display_roundtrips_textual_form() {
        for raw in ["/", "/blog/post+de@2", "/blog/photo.jpg@thumb/320", "/+de"] {
            assert_eq!(parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_join() {
        let base = parse("/blog/post@3");
        assert_eq!(base.join("../about").unwrap().to_string(), "/blog/about");
        assert_eq!(base.join("image.png").unwrap().to_string(), "/blog/post/image.png");
        assert_eq!(base.join("/projects").unwrap().to_string(), "/projects");
        assert_eq!(base.join("@2").unwrap().to_string(), "/blog/post@2");
        assert_eq!(base.join(".").unwrap().to_string(), "/blog/post");
        assert!(matches!(
            base.join("../../../x"),
            Err(MalformedPathError::EscapesRoot(_))
        ));
    }

    #[test]
    fn test_join_keeps_base_alt() {
        let base = parse("/blog+de");
        assert_eq!(base.join("post").unwrap().alt.as_deref(), Some("de"));
        assert_eq!(base.join("post+fr").unwrap().alt.as_deref(), Some("fr"));
    }

    #[test]
    fn test_is_child_of() {
        let blog = parse("/blog");
        let post = parse("/blog/post");
        let page = parse("/blog@2");

        assert!(post.is_child_of(&blog, true));
        assert!(!blog.is_child_of(&post, false));
        assert!(blog.is_child_of(&blog, false));
        assert!(!blog.is_child_of(&blog, true));
        assert!(page.is_child_of(&blog, true));
        assert!(!parse("/blogger").is_child_of(&blog, false));
        assert!(post.is_child_of(&DbPath::root(), true));
    }

    #[test]
    fn test_record_path_navigation() {
        let path = RecordPath::from_segments(["blog", "post"]);
        assert_eq!(path.id(), "post");
        assert_eq!(path.parent().unwrap().as_str(), "/blog");
        assert_eq!(path.parent().unwrap().parent().unwrap(), RecordPath::root());
        assert_eq!(RecordPath::root().parent(), None);
        assert_eq!(RecordPath::root().child("blog").as_str(), "/blog");
    }
}
