//! Alternates and the address space.
//!
//! [`AddressSpace`] owns the configured alternates and turns raw path strings
//! into comparable [`SourceKey`]s. An alt that is not configured resolves to
//! the site's default alt, so `get("/", alt="en")` and `get("/")` address the
//! same record unless `en` is configured.

use std::fmt;
use std::sync::Arc;

use super::path::{DbPath, MalformedPathError, RecordPath};
use crate::config::SiteConfig;

/// Sentinel alt used when no alternate applies.
pub const PRIMARY_ALT: &str = "_primary";

/// Interned alternate code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Alt(Arc<str>);

impl Alt {
    pub fn new(code: &str) -> Self {
        Self(Arc::from(code))
    }

    pub fn primary() -> Self {
        Self::new(PRIMARY_ALT)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_primary_sentinel(&self) -> bool {
        self.as_str() == PRIMARY_ALT
    }
}

impl fmt::Display for Alt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One configured alternate.
#[derive(Debug, Clone)]
pub struct AltSpec {
    pub code: Alt,
    pub name: String,
    /// URL prefix, always starting and ending with `/`.
    pub url_prefix: String,
    pub primary: bool,
}

/// Normalized identity of an addressable node.
///
/// Two keys are the same identity when [`SourceKey::same_identity`] holds;
/// the virtual path only distinguishes virtual sources below one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub record: RecordPath,
    pub alt: Alt,
    pub page: Option<u32>,
    pub virtual_path: Option<Arc<str>>,
}

impl SourceKey {
    pub fn same_identity(&self, other: &Self) -> bool {
        self.record == other.record && self.alt == other.alt && self.page == other.page
    }

    /// The equivalent path with the resolved alt written out.
    pub fn to_db_path(&self) -> DbPath {
        DbPath::new(self.record.clone())
            .with_alt_code(Some(self.alt.as_str()))
            .with_page(self.page)
            .with_virtual(self.virtual_path.as_deref())
    }
}

/// Parseable by [`DbPath::parse`]: `/blog+de@2`.
impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_db_path().fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct AddressSpace {
    alts: Vec<AltSpec>,
    default_alt: Alt,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl AddressSpace {
    pub fn new(alts: Vec<AltSpec>) -> Self {
        let default_alt = alts
            .iter()
            .find(|spec| spec.primary)
            .map_or_else(Alt::primary, |spec| spec.code.clone());
        Self { alts, default_alt }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        let alts = config
            .alternates
            .iter()
            .map(|(code, alt)| AltSpec {
                code: Alt::new(code),
                name: alt.name.clone().unwrap_or_else(|| code.clone()),
                url_prefix: alt.url_prefix.clone().unwrap_or_else(|| {
                    if alt.primary {
                        "/".to_string()
                    } else {
                        format!("/{code}/")
                    }
                }),
                primary: alt.primary,
            })
            .collect();
        Self::new(alts)
    }

    /// The alt used when none (or an unknown one) is requested.
    #[inline]
    pub fn default_alt(&self) -> &Alt {
        &self.default_alt
    }

    pub fn alts(&self) -> &[AltSpec] {
        &self.alts
    }

    pub fn is_configured(&self, code: &str) -> bool {
        self.alts.iter().any(|spec| spec.code.as_str() == code)
    }

    /// Resolve a requested alt; unknown alts fall back to the default alt.
    pub fn resolve_alt(&self, alt: Option<&str>) -> Alt {
        match alt {
            Some(code) if self.is_configured(code) => Alt::new(code),
            _ => self.default_alt.clone(),
        }
    }

    /// Alts that get their own root during a full build.
    pub fn build_alts(&self) -> Vec<Alt> {
        let mut alts: Vec<Alt> = self.alts.iter().map(|spec| spec.code.clone()).collect();
        if self.default_alt.is_primary_sentinel() {
            alts.insert(0, self.default_alt.clone());
        }
        alts
    }

    pub fn url_prefix(&self, alt: &Alt) -> &str {
        self.alts
            .iter()
            .find(|spec| &spec.code == alt)
            .map_or("/", |spec| spec.url_prefix.as_str())
    }

    /// Pick the alt whose URL prefix is the longest match for `url`.
    ///
    /// Returns the alt and the remainder of the URL below the prefix.
    pub fn alt_for_url<'a>(&self, url: &'a str) -> (Alt, &'a str) {
        let mut best: Option<(&AltSpec, usize)> = None;
        for spec in &self.alts {
            let prefix = spec.url_prefix.as_str();
            let bare = prefix.trim_end_matches('/');
            let matches = url.starts_with(prefix) || (!bare.is_empty() && url == bare);
            if matches && best.is_none_or(|(_, len)| prefix.len() > len) {
                best = Some((spec, prefix.len()));
            }
        }
        match best {
            Some((spec, len)) => (spec.code.clone(), url.get(len..).unwrap_or("")),
            None => (
                self.default_alt.clone(),
                url.strip_prefix('/').unwrap_or(url),
            ),
        }
    }

    /// Apply an explicitly requested alt to a parsed path.
    ///
    /// Fails when the path already names a different alt.
    pub fn with_alt(
        &self,
        mut path: DbPath,
        explicit: Option<&str>,
    ) -> Result<DbPath, MalformedPathError> {
        let Some(explicit) = explicit else {
            return Ok(path);
        };
        match path.alt.as_deref() {
            Some(found) if self.resolve_alt(Some(found)) != self.resolve_alt(Some(explicit)) => {
                Err(MalformedPathError::ConflictingAlt {
                    path: path.to_string(),
                    found: found.to_string(),
                    explicit: explicit.to_string(),
                })
            }
            Some(_) => Ok(path),
            None => {
                path.alt = Some(Arc::from(explicit));
                Ok(path)
            }
        }
    }

    #[inline]
    pub fn normalize(&self, raw: &str) -> Result<DbPath, MalformedPathError> {
        DbPath::parse(raw)
    }

    #[inline]
    pub fn join(&self, base: &DbPath, relative: &str) -> Result<DbPath, MalformedPathError> {
        base.join(relative)
    }

    /// `(record, resolved alt, page, virtual path)`
    pub fn split<'a>(&self, path: &'a DbPath) -> (RecordPath, Alt, Option<u32>, Option<&'a str>) {
        (
            path.record.clone(),
            self.resolve_alt(path.alt.as_deref()),
            path.page,
            path.virtual_path.as_deref(),
        )
    }

    /// Child relation within one resolved alt.
    pub fn is_child_of(&self, a: &DbPath, b: &DbPath, strict: bool) -> bool {
        self.resolve_alt(a.alt.as_deref()) == self.resolve_alt(b.alt.as_deref())
            && a.is_child_of(b, strict)
    }

    pub fn identity(&self, path: &DbPath) -> SourceKey {
        SourceKey {
            record: path.record.clone(),
            alt: self.resolve_alt(path.alt.as_deref()),
            page: path.page,
            virtual_path: path.virtual_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(code: &str, prefix: &str, primary: bool) -> AltSpec {
        AltSpec {
            code: Alt::new(code),
            name: code.to_string(),
            url_prefix: prefix.to_string(),
            primary,
        }
    }

    fn space_with_de() -> AddressSpace {
        AddressSpace::new(vec![spec("de", "/de/", false)])
    }

    #[test]
    fn test_identity_equivalence_for_unconfigured_alt() {
        let space = space_with_de();
        let root = space.identity(&DbPath::parse("/").unwrap());
        let root_en = space.identity(&DbPath::parse("/+en").unwrap());
        let root_de = space.identity(&DbPath::parse("/+de").unwrap());

        assert!(root.same_identity(&root_en));
        assert_eq!(root.alt, Alt::primary());
        assert!(!root.same_identity(&root_de));
    }

    #[test]
    fn test_configured_primary_is_default() {
        let space = AddressSpace::new(vec![spec("en", "/", true), spec("de", "/de/", false)]);
        assert_eq!(space.default_alt().as_str(), "en");
        assert_eq!(space.resolve_alt(Some("fr")).as_str(), "en");
        assert_eq!(space.resolve_alt(None).as_str(), "en");
        assert_eq!(space.build_alts(), vec![Alt::new("en"), Alt::new("de")]);
    }

    #[test]
    fn test_build_alts_without_primary() {
        let space = space_with_de();
        assert_eq!(space.build_alts(), vec![Alt::primary(), Alt::new("de")]);
        assert_eq!(AddressSpace::default().build_alts(), vec![Alt::primary()]);
    }

    #[test]
    fn test_with_alt_conflict() {
        let space = space_with_de();
        let path = DbPath::parse("/blog+de").unwrap();
        assert!(space.with_alt(path.clone(), Some("de")).is_ok());
        assert!(matches!(
            space.with_alt(path, Some(PRIMARY_ALT)),
            Err(MalformedPathError::ConflictingAlt { .. })
        ));

        let bare = DbPath::parse("/blog").unwrap();
        let applied = space.with_alt(bare, Some("de")).unwrap();
        assert_eq!(applied.alt.as_deref(), Some("de"));
    }

    #[test]
    fn test_alt_for_url() {
        let space = space_with_de();
        let (alt, rest) = space.alt_for_url("/de/blog/");
        assert_eq!(alt.as_str(), "de");
        assert_eq!(rest, "blog/");

        let (alt, rest) = space.alt_for_url("/de");
        assert_eq!(alt.as_str(), "de");
        assert_eq!(rest, "");

        let (alt, rest) = space.alt_for_url("/design/");
        assert_eq!(alt, Alt::primary());
        assert_eq!(rest, "design/");
    }

    #[test]
    fn test_split_resolves_alt() {
        let space = space_with_de();
        let path = DbPath::parse("/blog+xx@2").unwrap();
        let (record, alt, page, virtual_path) = space.split(&path);
        assert_eq!(record.as_str(), "/blog");
        assert_eq!(alt, Alt::primary());
        assert_eq!(page, Some(2));
        assert_eq!(virtual_path, None);
    }

    #[test]
    fn test_is_child_of_respects_alt() {
        let space = space_with_de();
        let blog = DbPath::parse("/blog").unwrap();
        let post_de = DbPath::parse("/blog/post+de").unwrap();
        let post_en = DbPath::parse("/blog/post+en").unwrap();
        assert!(!space.is_child_of(&post_de, &blog, true));
        assert!(space.is_child_of(&post_en, &blog, true));
    }
}
