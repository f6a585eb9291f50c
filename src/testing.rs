//! Site fixtures for tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::build::Builder;
use crate::config::SiteConfig;
use crate::db::Pad;
use crate::env::Environment;

/// A site in a temp directory.
///
/// ```ignore
/// let site = TestSite::new()
///     .file("content/contents.lr", "title: Home")
///     .file("templates/page.html", "{{ this.title }}");
/// let builder = site.builder();
/// ```
pub struct TestSite {
    dir: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn file(self, rel: &str, content: &str) -> Self {
        self.write(rel, content);
        self
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn write_bytes(&self, rel: &str, content: &[u8]) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        let path = self.path(rel);
        if path.is_dir() {
            fs::remove_dir_all(path).unwrap();
        } else {
            fs::remove_file(path).unwrap();
        }
    }

    /// `folio.toml` when present, defaults otherwise.
    pub fn config(&self) -> SiteConfig {
        let config_path = self.path("folio.toml");
        let mut config = match fs::read_to_string(&config_path) {
            Ok(text) => {
                let mut config = SiteConfig::from_str(&text).unwrap();
                config.config_path = config_path;
                config
            }
            Err(_) => SiteConfig::default(),
        };
        config.finalize(self.root());
        config
    }

    pub fn env(&self) -> Arc<Environment> {
        Environment::new(self.config())
    }

    pub fn pad(&self) -> Pad {
        Pad::new(self.env())
    }

    pub fn builder(&self) -> Builder {
        Builder::new(self.env()).unwrap()
    }

    pub fn output(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.path("public").join(rel)).ok()
    }
}

/// Encoded PNG of `width` x `height`.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
