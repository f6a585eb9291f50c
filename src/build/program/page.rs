use anyhow::{Context, Result};

use super::{BuildProgram, url_artifact};
use crate::build::artifact::{ArtifactSpec, BuildContext};
use crate::db::{DbError, Pad, Source};
use crate::template::TemplateContext;

/// Renders records (and their pagination pages) through the template engine.
pub struct PageProgram {
    source: Source,
}

impl PageProgram {
    pub fn new(source: Source) -> Self {
        Self { source }
    }
}

impl BuildProgram for PageProgram {
    fn name(&self) -> &'static str {
        "page"
    }

    fn source(&self) -> &Source {
        &self.source
    }

    fn declare_artifacts(&self, _pad: &Pad) -> Vec<ArtifactSpec> {
        url_artifact(&self.source)
    }

    fn build_artifact(&self, pad: &Pad, artifact: &ArtifactSpec, ctx: &mut BuildContext) -> Result<()> {
        let record = self
            .source
            .record()
            .context("page source without a record")?;
        let tctx = TemplateContext::new(pad, self.source.clone(), artifact.url.as_str());
        let html = pad
            .env()
            .templates
            .render(&record.template, &tctx)
            .with_context(|| format!("failed to render template `{}`", record.template))?;
        ctx.write_str(&html)?;
        Ok(())
    }

    /// Every child (hidden and undiscoverable ones too), attachments, and
    /// pagination pages 2..N. Pagination pages have no children of their own.
    fn child_sources(&self, pad: &Pad) -> Result<Vec<Source>, DbError> {
        let Source::Record(record) = &self.source else {
            return Ok(Vec::new());
        };
        let mut children: Vec<Source> = pad
            .query(record.record_path(), &record.alt)
            .include_hidden(true)
            .include_undiscoverable(true)
            .all()?
            .into_iter()
            .map(Source::Record)
            .collect();
        children.extend(pad.attachments(record)?.into_iter().map(Source::Attachment));
        children.extend(self.source.virtual_sources(pad)?);
        Ok(children)
    }
}
