//! Assets: files below the assets root, copied verbatim.

use std::path::{Path, PathBuf};

use crate::address::UrlPath;
use crate::build::recorder;

#[derive(Debug)]
pub struct Asset {
    /// Slash-separated path below the assets root; empty for the root.
    pub rel: String,
    pub file: PathBuf,
    pub is_dir: bool,
    pub url: UrlPath,
}

impl Asset {
    /// Load `rel` below `root`. Dotfiles are not assets.
    pub fn load(root: &Path, rel: &str) -> Option<Self> {
        let rel = rel.trim_matches('/');
        if rel.split('/').any(|seg| seg.starts_with('.') || seg == "..") {
            return None;
        }
        let file = if rel.is_empty() {
            root.to_path_buf()
        } else {
            root.join(rel)
        };
        let meta = std::fs::metadata(&file).ok()?;
        let url = if meta.is_dir() {
            UrlPath::from_page(rel)
        } else {
            UrlPath::from_file(rel)
        };
        Some(Self {
            rel: rel.to_string(),
            file,
            is_dir: meta.is_dir(),
            url,
        })
    }

    /// Identity used in the build state.
    pub fn identity(&self) -> String {
        format!("asset:/{}", self.rel)
    }

    /// Direct children, sorted by name. Records the directory listing.
    pub fn children(&self, root: &Path) -> Vec<Asset> {
        if !self.is_dir {
            return Vec::new();
        }
        recorder::record(&self.file);
        let Ok(entries) = std::fs::read_dir(&self.file) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
            .iter()
            .filter_map(|name| {
                let rel = if self.rel.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{name}", self.rel)
                };
                Self::load(root, &rel)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_children() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("static/css")).unwrap();
        fs::write(dir.path().join("static/css/site.css"), "body{}").unwrap();
        fs::write(dir.path().join("static/.hidden"), "").unwrap();
        fs::write(dir.path().join("robots.txt"), "").unwrap();

        let root = Asset::load(dir.path(), "").unwrap();
        assert!(root.is_dir);
        assert_eq!(root.url.as_str(), "/");
        assert_eq!(root.identity(), "asset:/");

        let children = root.children(dir.path());
        let urls: Vec<_> = children.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, ["/robots.txt", "/static/"]);

        let css = Asset::load(dir.path(), "/static/css/site.css").unwrap();
        assert_eq!(css.url.artifact_name(), "static/css/site.css");
        assert!(Asset::load(dir.path(), "static/.hidden").is_none());
        assert!(Asset::load(dir.path(), "missing.png").is_none());
    }
}
