//! `build`, `prune` and `clean` commands.

use anyhow::{Result, bail};

use crate::build::{BuildSummary, Builder, CliReporter, Reporter};
use crate::config::SiteConfig;
use crate::env::Environment;
use crate::log;

/// One build pass, pruning afterwards when `[build] prune` is on.
pub fn build_site(builder: &Builder, reporter: &dyn Reporter) -> Result<BuildSummary> {
    let summary = builder.build_all(reporter)?;
    if builder.pad().config().build.prune {
        builder.prune(false, reporter)?;
    }
    Ok(summary)
}

/// Entry point for `folio build`. Fails when any artifact failed.
pub fn run_build(config: &SiteConfig) -> Result<()> {
    let builder = Builder::new(Environment::new(config.clone()))?;
    let summary = build_site(&builder, &CliReporter::new())?;
    if !summary.is_success() {
        bail!("{} artifact(s) failed", summary.failed_artifacts.len());
    }
    Ok(())
}

/// Entry point for `folio prune [--all]`.
pub fn run_prune(config: &SiteConfig, all: bool) -> Result<()> {
    let builder = Builder::new(Environment::new(config.clone()))?;
    let summary = builder.prune(all, &CliReporter::new())?;
    if all {
        log!("prune"; "build state cleared");
    }
    crate::debug!("prune"; "{} removed", summary.removed.len());
    Ok(())
}

/// Entry point for `folio clean`.
pub fn run_clean(config: &SiteConfig) -> Result<()> {
    let builder = Builder::new(Environment::new(config.clone()))?;
    builder.clean(&CliReporter::new())?;
    Ok(())
}
