//! Configuration sections.
//!
//! ```toml
//! [site]
//! name = "My Site"
//! url = "https://example.com"
//!
//! [alternates.en]
//! name = "English"
//! url_prefix = "/"
//! primary = true
//!
//! [alternates.de]
//! url_prefix = "/de/"
//!
//! [build]
//! content = "content"
//! assets = "assets"
//! templates = "templates"
//! models = "models"
//! output = "public"
//! cache = ".folio/cache"
//! checksum = "content"        # or "mtime"
//! prune = true
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 5277
//! watch = true
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigDiagnostics;

// ============================================================================
// [site]
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub name: String,
    pub url: Option<String>,
}

impl SiteSection {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Some(url) = &self.url
            && url::Url::parse(url).is_err()
        {
            diag.error_with_hint(
                "site.url",
                format!("`{url}` is not an absolute URL"),
                "use a full URL such as `https://example.com`",
            );
        }
    }
}

// ============================================================================
// [alternates.<code>]
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternateConfig {
    /// Display name, defaults to the code.
    pub name: Option<String>,
    /// URL prefix, defaults to `/` for the primary alt and `/<code>/` otherwise.
    pub url_prefix: Option<String>,
    pub primary: bool,
}

// ============================================================================
// [build]
// ============================================================================

/// How dependency checksums are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumMode {
    /// blake3 of file contents
    #[default]
    Content,
    /// modification time and length
    Mtime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub content: PathBuf,
    pub assets: PathBuf,
    pub templates: PathBuf,
    pub models: PathBuf,
    pub output: PathBuf,
    /// Build state directory.
    pub cache: PathBuf,
    pub checksum: ChecksumMode,
    /// Prune stale artifacts after a build.
    pub prune: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            content: "content".into(),
            assets: "assets".into(),
            templates: "templates".into(),
            models: "models".into(),
            output: "public".into(),
            cache: ".folio/cache".into(),
            checksum: ChecksumMode::default(),
            prune: true,
        }
    }
}

impl BuildSection {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.output == self.content {
            diag.error(
                "build.output",
                "output directory must differ from the content directory",
            );
        }
        if self.output == self.assets {
            diag.error(
                "build.output",
                "output directory must differ from the assets directory",
            );
        }
    }
}

// ============================================================================
// [serve]
// ============================================================================

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// Rebuild on file changes.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5277,
            watch: true,
        }
    }
}
