//! Link classification.

/// Whether `link` carries a URL scheme (`https:`, `mailto:`, ...).
///
/// A scheme is at least one character of ASCII alphanumerics or `+-.`
/// before the first colon.
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Whether the link should be left untouched by resolution: schemes,
/// protocol-relative URLs and pure fragments.
#[inline]
pub fn is_passthrough_link(link: &str) -> bool {
    link.is_empty() || link.starts_with('#') || link.starts_with("//") || is_external_link(link)
}

/// Split `url` into path and fragment. The fragment is empty when absent.
#[inline]
pub fn split_path_fragment(url: &str) -> (&str, &str) {
    url.split_once('#').unwrap_or((url, ""))
}

/// Split `url` into path and query. The query is empty when absent.
#[inline]
pub fn split_path_query(url: &str) -> (&str, &str) {
    url.split_once('?').unwrap_or((url, ""))
}
