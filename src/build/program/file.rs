use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{BuildProgram, url_artifact};
use crate::build::artifact::{ArtifactSpec, BuildContext};
use crate::db::{DbError, Pad, Source};

/// Copies an attachment or asset file verbatim.
pub struct CopyProgram {
    source: Source,
    name: &'static str,
}

impl CopyProgram {
    pub fn attachment(source: Source) -> Self {
        Self {
            source,
            name: "attachment",
        }
    }

    pub fn asset(source: Source) -> Self {
        Self {
            source,
            name: "asset",
        }
    }

    fn file(&self) -> Option<PathBuf> {
        match &self.source {
            Source::Attachment(a) => Some(a.file.clone()),
            Source::Asset(a) => Some(a.file.clone()),
            _ => None,
        }
    }
}

impl BuildProgram for CopyProgram {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> &Source {
        &self.source
    }

    fn declare_artifacts(&self, _pad: &Pad) -> Vec<ArtifactSpec> {
        url_artifact(&self.source)
    }

    fn build_artifact(&self, _pad: &Pad, _artifact: &ArtifactSpec, ctx: &mut BuildContext) -> Result<()> {
        let file = self.file().context("source has no backing file")?;
        ctx.copy_from(&file)
            .with_context(|| format!("failed to copy `{}`", file.display()))
    }

    /// Thumbnails of image attachments.
    fn child_sources(&self, pad: &Pad) -> Result<Vec<Source>, DbError> {
        self.source.virtual_sources(pad)
    }
}

/// Asset directories produce nothing themselves; their entries do.
pub struct AssetDirProgram {
    source: Source,
}

impl AssetDirProgram {
    pub fn new(source: Source) -> Self {
        Self { source }
    }
}

impl BuildProgram for AssetDirProgram {
    fn name(&self) -> &'static str {
        "asset-dir"
    }

    fn source(&self) -> &Source {
        &self.source
    }

    fn declare_artifacts(&self, _pad: &Pad) -> Vec<ArtifactSpec> {
        Vec::new()
    }

    fn build_artifact(&self, _pad: &Pad, _artifact: &ArtifactSpec, _ctx: &mut BuildContext) -> Result<()> {
        Ok(())
    }

    fn child_sources(&self, pad: &Pad) -> Result<Vec<Source>, DbError> {
        let Some(asset) = self.source.as_asset() else {
            return Ok(Vec::new());
        };
        Ok(asset
            .children(pad.assets_dir())
            .into_iter()
            .map(|a| Source::Asset(std::sync::Arc::new(a)))
            .collect())
    }
}
