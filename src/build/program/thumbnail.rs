use anyhow::{Context, Result};
use image::ImageFormat;
use image::imageops::FilterType;

use super::{BuildProgram, url_artifact};
use crate::build::artifact::{ArtifactSpec, BuildContext};
use crate::build::recorder;
use crate::db::{DbError, Pad, Source, Thumbnail};

/// Scales an image attachment down to the thumbnail width, keeping the
/// aspect ratio. Images narrower than the width are re-encoded unscaled.
pub struct ThumbnailProgram {
    source: Source,
}

impl ThumbnailProgram {
    pub fn new(source: Source) -> Self {
        Self { source }
    }
}

impl BuildProgram for ThumbnailProgram {
    fn name(&self) -> &'static str {
        "thumbnail"
    }

    fn source(&self) -> &Source {
        &self.source
    }

    fn declare_artifacts(&self, _pad: &Pad) -> Vec<ArtifactSpec> {
        url_artifact(&self.source)
    }

    fn build_artifact(&self, _pad: &Pad, _artifact: &ArtifactSpec, ctx: &mut BuildContext) -> Result<()> {
        let thumb = self
            .source
            .as_virtual::<Thumbnail>()
            .context("not a thumbnail source")?;
        let file = &thumb.attachment.file;

        let bytes = recorder::read(file)
            .with_context(|| format!("failed to read `{}`", file.display()))?;
        let format = ImageFormat::from_path(file)?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .with_context(|| format!("failed to decode `{}`", file.display()))?;

        let image = if image.width() > thumb.width {
            let height = (u64::from(image.height()) * u64::from(thumb.width) / u64::from(image.width()))
                .max(1) as u32;
            image.resize_exact(thumb.width, height, FilterType::Lanczos3)
        } else {
            image
        };

        ctx.write_with(|tmp| {
            image
                .save_with_format(tmp, format)
                .with_context(|| format!("failed to encode thumbnail of `{}`", file.display()))
        })
    }

    fn child_sources(&self, _pad: &Pad) -> Result<Vec<Source>, DbError> {
        Ok(Vec::new())
    }

    fn config_hash(&self) -> Option<String> {
        Some("lanczos3".to_string())
    }
}
