//! Content types for served files, and which attachments get thumbnails.

use std::path::Path;

pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Extension → content type. Lookups are case-insensitive.
const TABLE: &[(&[&str], &str)] = &[
    (&["html", "htm"], types::HTML),
    (&["txt", "lr"], types::PLAIN),
    (&["css"], types::CSS),
    (&["js", "mjs"], types::JAVASCRIPT),
    (&["json", "map"], types::JSON),
    (&["xml"], types::XML),
    (&["rss"], "application/rss+xml"),
    (&["atom"], "application/atom+xml"),
    (&["png"], types::PNG),
    (&["jpg", "jpeg"], types::JPEG),
    (&["gif"], types::GIF),
    (&["webp"], types::WEBP),
    (&["svg"], types::SVG),
    (&["avif"], "image/avif"),
    (&["ico"], "image/x-icon"),
    (&["woff"], "font/woff"),
    (&["woff2"], "font/woff2"),
    (&["ttf"], "font/ttf"),
    (&["pdf"], "application/pdf"),
    (&["mp4"], "video/mp4"),
    (&["webm"], "video/webm"),
    (&["mp3"], "audio/mpeg"),
    (&["wasm"], "application/wasm"),
];

pub fn from_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return types::OCTET_STREAM;
    };
    TABLE
        .iter()
        .find(|(exts, _)| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .map_or(types::OCTET_STREAM, |(_, mime)| mime)
}

/// Raster images the thumbnail program can decode.
pub fn is_thumbnailable(path: &Path) -> bool {
    matches!(from_path(path), types::PNG | types::JPEG | types::GIF | types::WEBP)
}
