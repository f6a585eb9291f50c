//! Slug generation for record ids and heading anchors.

use deunicode::deunicode;

/// ASCII slug: transliterated, lowercased, runs of non-alphanumerics
/// collapsed into a single `-`.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut out = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Anchor id for a heading; never empty.
pub fn anchor(text: &str) -> String {
    let slug = slugify(text).replace('.', "-");
    if slug.is_empty() { "section".into() } else { slug }
}
