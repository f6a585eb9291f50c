//! Artifacts and atomic artifact writes.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

use super::recorder;
use crate::address::UrlPath;

/// An output file a build program declares for its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Output-relative, slash-separated.
    pub name: String,
    pub url: UrlPath,
}

impl ArtifactSpec {
    pub fn for_url(url: &UrlPath) -> Self {
        Self {
            name: url.artifact_name(),
            url: url.clone(),
        }
    }
}

/// Lifecycle of one artifact within a pass:
/// `unbuilt -> checking -> {current | building -> {built | failed}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Never built; only seen from outside a pass.
    Unbuilt,
    Checking,
    Current,
    Building,
    Built,
    Failed,
}

impl ArtifactState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unbuilt => "unbuilt",
            Self::Checking => "checking",
            Self::Current => "current",
            Self::Building => "building",
            Self::Built => "built",
            Self::Failed => "failed",
        }
    }
}

/// Staging area for one artifact.
///
/// Writes go to a temp file next to the destination; [`finish`](Self::finish)
/// renames it into place. A context dropped without finishing removes the
/// temp file, so failed builds never leave partial output.
pub struct BuildContext {
    artifact: String,
    dst: PathBuf,
    tmp: PathBuf,
    written: bool,
}

impl BuildContext {
    pub fn new(output: &Path, artifact: &str) -> Result<Self> {
        let rel = Path::new(artifact);
        if artifact.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("artifact name `{artifact}` escapes the output directory");
        }
        let dst = output.join(rel);
        let file_name = dst
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dst.with_file_name(format!(".{file_name}.folio-tmp"));
        Ok(Self {
            artifact: artifact.to_string(),
            dst,
            tmp,
            written: false,
        })
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Final location of the artifact.
    pub fn output_path(&self) -> &Path {
        &self.dst
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.prepare()?;
        fs::write(&self.tmp, bytes)?;
        self.written = true;
        Ok(())
    }

    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes())
    }

    /// Copy `src` verbatim. `src` becomes a dependency.
    pub fn copy_from(&mut self, src: &Path) -> io::Result<()> {
        recorder::record(src);
        self.prepare()?;
        fs::copy(src, &self.tmp)?;
        self.written = true;
        Ok(())
    }

    /// Let `f` produce the temp file itself (encoders writing to a path).
    pub fn write_with(&mut self, f: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
        self.prepare()?;
        f(&self.tmp)?;
        self.written = true;
        Ok(())
    }

    fn prepare(&self) -> io::Result<()> {
        match self.tmp.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
    }

    /// Move the staged file into place. Returns whether anything was written.
    pub fn finish(mut self) -> io::Result<bool> {
        if !self.written {
            return Ok(false);
        }
        fs::rename(&self.tmp, &self.dst)?;
        self.written = false;
        Ok(true)
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if self.written {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}
