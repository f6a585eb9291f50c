//! Filesystem path normalization.
//!
//! - `normalize_path` - absolute form (canonicalize + fallback)
//! - `to_slash` / `relative_slash` - stable forward-slash keys for persisted state

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first. Falls back to the path itself when it is
/// absolute, or to the cwd join when it is relative.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Join path components with `/`, whatever the platform separator.
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        let part = match component {
            Component::Normal(part) => part.to_string_lossy(),
            Component::CurDir => continue,
            Component::ParentDir => "..".into(),
            Component::RootDir | Component::Prefix(_) => {
                out.push('/');
                continue;
            }
        };
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(&part);
    }
    out
}

/// `path` relative to `root` in slash form, or the absolute slash form when
/// `path` lies outside `root`.
pub fn relative_slash(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => to_slash(rel),
        Err(_) => to_slash(path),
    }
}
