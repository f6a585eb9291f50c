//! Build programs: turn one source into its artifacts.
//!
//! | Program      | Sources                          | Artifacts          |
//! |--------------|----------------------------------|--------------------|
//! | `page`       | records, pagination pages        | rendered template  |
//! | `attachment` | attachments                      | verbatim copy      |
//! | `thumbnail`  | `@thumb/<width>` virtual sources | resized image      |
//! | `asset`      | asset files                      | verbatim copy      |
//! | `asset-dir`  | asset directories                | none (children)    |
//!
//! Programs are selected through [`ProgramRegistry`]: plugin registrations
//! first, then the built-ins, first matching predicate wins.

mod file;
mod page;
mod thumbnail;

use std::sync::Arc;

use anyhow::Result;

use super::artifact::{ArtifactSpec, BuildContext};
use crate::db::{DbError, Pad, PaginationPage, Source, Thumbnail};

pub use file::{AssetDirProgram, CopyProgram};
pub use page::PageProgram;
pub use thumbnail::ThumbnailProgram;

pub trait BuildProgram: Send {
    fn name(&self) -> &'static str;

    fn source(&self) -> &Source;

    /// Artifacts this source produces. Hidden sources declare none.
    fn declare_artifacts(&self, pad: &Pad) -> Vec<ArtifactSpec>;

    /// Produce `artifact` into `ctx`. Every file read goes through the
    /// dependency recorder.
    fn build_artifact(&self, pad: &Pad, artifact: &ArtifactSpec, ctx: &mut BuildContext) -> Result<()>;

    /// Sources to build after this one.
    fn child_sources(&self, pad: &Pad) -> Result<Vec<Source>, DbError>;

    /// Extra input to the artifact config hash (program options).
    fn config_hash(&self) -> Option<String> {
        None
    }
}

type Predicate = Arc<dyn Fn(&Source) -> bool + Send + Sync>;
type Factory = Arc<dyn Fn(&Source) -> Box<dyn BuildProgram> + Send + Sync>;

#[derive(Default)]
pub struct ProgramRegistry {
    plugins: Vec<(Predicate, Factory)>,
    builtins: Vec<(Predicate, Factory)>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.builtin(
            |s| matches!(s, Source::Record(_)) || s.as_virtual::<PaginationPage>().is_some(),
            |s| Box::new(PageProgram::new(s.clone())),
        );
        registry.builtin(
            |s| matches!(s, Source::Attachment(_)),
            |s| Box::new(CopyProgram::attachment(s.clone())),
        );
        registry.builtin(
            |s| s.as_virtual::<Thumbnail>().is_some(),
            |s| Box::new(ThumbnailProgram::new(s.clone())),
        );
        registry.builtin(
            |s| s.as_asset().is_some_and(|a| a.is_dir),
            |s| Box::new(AssetDirProgram::new(s.clone())),
        );
        registry.builtin(
            |s| s.as_asset().is_some_and(|a| !a.is_dir),
            |s| Box::new(CopyProgram::asset(s.clone())),
        );
        registry
    }

    pub fn register<P, F>(&mut self, predicate: P, factory: F)
    where
        P: Fn(&Source) -> bool + Send + Sync + 'static,
        F: Fn(&Source) -> Box<dyn BuildProgram> + Send + Sync + 'static,
    {
        self.plugins.push((Arc::new(predicate), Arc::new(factory)));
    }

    fn builtin<P, F>(&mut self, predicate: P, factory: F)
    where
        P: Fn(&Source) -> bool + Send + Sync + 'static,
        F: Fn(&Source) -> Box<dyn BuildProgram> + Send + Sync + 'static,
    {
        self.builtins.push((Arc::new(predicate), Arc::new(factory)));
    }

    /// Program for `source`, or `None` when nothing claims it.
    pub fn select(&self, source: &Source) -> Option<Box<dyn BuildProgram>> {
        self.plugins
            .iter()
            .chain(&self.builtins)
            .find(|(predicate, _)| predicate(source))
            .map(|(_, factory)| factory(source))
    }

    pub fn len(&self) -> usize {
        self.plugins.len() + self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The single artifact of a visible source, served at its URL.
fn url_artifact(source: &Source) -> Vec<ArtifactSpec> {
    if source.is_hidden() {
        return Vec::new();
    }
    vec![ArtifactSpec::for_url(&source.url_path())]
}
