//! URL path type and relative URL computation.
//!
//! - Internal representation: always decoded (human-readable)
//! - Browser boundary: decode on input, encode on output

use std::borrow::Borrow;
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters escaped when a path leaves the process.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Decoded URL path
///
/// Invariants:
/// - Always decoded (no percent-encoding)
/// - Always starts with `/`
/// - Page URLs end with `/`, file URLs do not
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlPath(Arc<str>);

impl UrlPath {
    /// Create from a request URL (decode percent-encoding, strip query and fragment).
    pub fn from_browser(encoded: &str) -> Self {
        let path = encoded.split(['?', '#']).next().unwrap_or(encoded);
        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| path.to_string());
        Self::from_file(&decoded)
    }

    /// Create page URL (with trailing slash).
    pub fn from_page(decoded: &str) -> Self {
        let trimmed = decoded.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Self(Arc::from("/"));
        }
        Self(Arc::from(format!("/{trimmed}/")))
    }

    /// Create file URL (no trailing slash normalization).
    pub fn from_file(decoded: &str) -> Self {
        let trimmed = decoded.trim();
        if trimmed.is_empty() {
            return Self(Arc::from("/"));
        }
        if trimmed.starts_with('/') {
            Self(Arc::from(trimmed))
        } else {
            Self(Arc::from(format!("/{trimmed}")))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode for the browser.
    pub fn to_encoded(&self) -> String {
        utf8_percent_encode(&self.0, PATH_SEGMENT).to_string()
    }

    #[inline]
    pub fn is_page_url(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Directory part: the URL itself for pages, the parent for files.
    pub fn dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..=idx],
            None => "/",
        }
    }

    /// Join a child segment below this URL's directory.
    pub fn join(&self, segment: &str) -> Self {
        Self(Arc::from(format!("{}{}", self.dir(), segment)))
    }

    /// Segments below the root, ignoring empty ones.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Output-relative artifact file name for this URL.
    ///
    /// `/` -> `index.html`, `/blog/` -> `blog/index.html`,
    /// `/blog/feed.xml` -> `blog/feed.xml`
    pub fn artifact_name(&self) -> String {
        let trimmed = self.0.trim_start_matches('/');
        if self.is_page_url() {
            format!("{trimmed}index.html")
        } else {
            trimmed.to_string()
        }
    }
}

impl std::fmt::Display for UrlPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for UrlPath {
    fn default() -> Self {
        Self::from_page("/")
    }
}

impl AsRef<str> for UrlPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UrlPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Compute the URL of `target` relative to `base`.
///
/// Both arguments are site-absolute paths. The directory of `base` is the
/// part up to its last `/`. An empty result becomes `./`.
///
/// ```ignore
/// make_relative_url("/blog/", "/blog/post/")  -> "post/"
/// make_relative_url("/blog/post/", "/")       -> "../../"
/// make_relative_url("/a/b.html", "/c/d.png")  -> "../c/d.png"
/// ```
pub fn make_relative_url(base: &str, target: &str) -> String {
    let base_dir = match base.rfind('/') {
        Some(idx) => &base[..idx],
        None => "",
    };
    let (target_dir, target_name) = match target.rfind('/') {
        Some(idx) => (&target[..idx], &target[idx + 1..]),
        None => ("", target),
    };

    let base_segments: Vec<_> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    let target_segments: Vec<_> = target_dir.split('/').filter(|s| !s.is_empty()).collect();

    let common = base_segments
        .iter()
        .zip(&target_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = "../".repeat(base_segments.len() - common);
    for segment in &target_segments[common..] {
        out.push_str(segment);
        out.push('/');
    }
    out.push_str(target_name);

    if out.is_empty() {
        "./".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_page() {
        assert_eq!(UrlPath::from_page("").as_str(), "/");
        assert_eq!(UrlPath::from_page("/").as_str(), "/");
        assert_eq!(UrlPath::from_page("blog").as_str(), "/blog/");
        assert_eq!(UrlPath::from_page("/blog/post/").as_str(), "/blog/post/");
    }

    #[test]
    fn test_from_browser_decodes() {
        let url = UrlPath::from_browser("/blog/caf%C3%A9/?x=1#top");
        assert_eq!(url.as_str(), "/blog/café/");
        assert_eq!(UrlPath::from_browser("/img/a%20b.png").as_str(), "/img/a b.png");
    }

    #[test]
    fn test_to_encoded() {
        let url = UrlPath::from_file("/img/a b.png");
        assert_eq!(url.to_encoded(), "/img/a%20b.png");
    }

    #[test]
    fn test_dir_and_join() {
        let page = UrlPath::from_page("/blog/post");
        assert_eq!(page.dir(), "/blog/post/");
        assert_eq!(page.join("photo.jpg").as_str(), "/blog/post/photo.jpg");

        let file = UrlPath::from_file("/blog/feed.xml");
        assert_eq!(file.dir(), "/blog/");
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(UrlPath::from_page("/").artifact_name(), "index.html");
        assert_eq!(UrlPath::from_page("/blog").artifact_name(), "blog/index.html");
        assert_eq!(UrlPath::from_file("/blog/feed.xml").artifact_name(), "blog/feed.xml");
    }

    #[test]
    fn test_make_relative_url() {
        assert_eq!(make_relative_url("/blog/", "/blog/post/"), "post/");
        assert_eq!(make_relative_url("/blog/post/", "/"), "../../");
        assert_eq!(make_relative_url("/blog/", "/blog/"), "./");
        assert_eq!(make_relative_url("/a/", "/a/img.png"), "img.png");
        assert_eq!(make_relative_url("/a/page.html", "/b/"), "../b/");
        assert_eq!(make_relative_url("/a/b.html", "/c/d.png"), "../c/d.png");
        assert_eq!(make_relative_url("/", "/projects/page/2/"), "projects/page/2/");
    }
}
