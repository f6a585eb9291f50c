//! Rebuild on file changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use super::lifecycle::is_shutdown;
use crate::build::{
    Builder, ChangeHub, ChangeStreamReporter, CliReporter, MultiReporter, Reporter,
};
use crate::cli::Cli;
use crate::cli::build::build_site;
use crate::config::SiteConfig;
use crate::env::Environment;
use crate::logger::{status_error, status_success, status_unchanged};
use crate::{debug, log};

/// Quiet period before a batch of changes triggers a rebuild.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// A running watcher. Dropping the handle stops event delivery.
pub struct WatchHandle {
    watcher: RecommendedWatcher,
    thread: JoinHandle<()>,
}

impl WatchHandle {
    /// Wait for the rebuild thread, at most two seconds.
    pub fn shutdown(self) {
        drop(self.watcher);
        for _ in 0..40 {
            if self.thread.is_finished() {
                let _ = self.thread.join();
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Start watching the site's inputs. The builder moves to the rebuild
/// thread; `cli` is kept to reload the config when `folio.toml` changes.
pub fn spawn(builder: Builder, hub: Arc<ChangeHub>, cli: &'static Cli) -> Result<WatchHandle> {
    let (tx, rx) = channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;

    let config = builder.pad().config();
    for path in watched_paths(config) {
        // Skip missing directories; they are picked up on restart.
        if path.exists() {
            watcher.watch(&path, RecursiveMode::Recursive)?;
            debug!("watch"; "{}", config.root_relative(&path).display());
        }
    }

    let thread = thread::spawn(move || {
        let mut session = Session::new(builder, hub, cli);
        session.run(&rx);
    });
    Ok(WatchHandle {
        watcher,
        thread,
    })
}

fn watched_paths(config: &SiteConfig) -> Vec<PathBuf> {
    let build = &config.build;
    let mut paths = vec![
        build.content.clone(),
        build.assets.clone(),
        build.templates.clone(),
        build.models.clone(),
    ];
    if config.config_path.is_file() {
        paths.push(config.config_path.clone());
    }
    paths
}

/// Editor leftovers and hidden files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Whether a change to `path` can affect the build.
fn is_relevant(path: &Path, config: &SiteConfig) -> bool {
    !is_temp_file(path)
        && !path.starts_with(&config.build.output)
        && !path.starts_with(&config.build.cache)
}

struct Session {
    builder: Option<Builder>,
    hub: Arc<ChangeHub>,
    cli: &'static Cli,
    config: SiteConfig,
}

impl Session {
    fn new(builder: Builder, hub: Arc<ChangeHub>, cli: &'static Cli) -> Self {
        let config = builder.pad().config().clone();
        Self {
            builder: Some(builder),
            hub,
            cli,
            config,
        }
    }

    fn run(&mut self, rx: &Receiver<notify::Result<Event>>) {
        let mut pending = FxHashSet::default();
        while !is_shutdown() {
            match rx.recv_timeout(DEBOUNCE) {
                Ok(Ok(event)) => pending.extend(
                    event
                        .paths
                        .into_iter()
                        .filter(|p| is_relevant(p, &self.config)),
                ),
                Ok(Err(e)) => log!("watch"; "notify error: {e}"),
                Err(RecvTimeoutError::Timeout) if !pending.is_empty() => {
                    let changed: Vec<PathBuf> = pending.drain().collect();
                    self.rebuild(&changed);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn rebuild(&mut self, changed: &[PathBuf]) {
        for path in changed {
            debug!("watch"; "changed: {}", self.config.root_relative(path).display());
        }
        if changed.contains(&self.config.config_path)
            && let Err(e) = self.reload_config()
        {
            status_error("config reload failed", &format!("{e:#}"));
            return;
        }
        if self.builder.is_none() {
            match Builder::new(Environment::new(self.config.clone())) {
                Ok(builder) => self.builder = Some(builder),
                Err(e) => {
                    status_error("cannot open build state", &format!("{e:#}"));
                    return;
                }
            }
        }
        let Some(builder) = self.builder.as_ref() else {
            return;
        };

        let started = Instant::now();
        let reporters: Vec<Box<dyn Reporter>> = vec![
            Box::new(CliReporter::new()),
            Box::new(ChangeStreamReporter::new(Arc::clone(&self.hub))),
        ];
        let reporter = MultiReporter(reporters);
        match build_site(builder, &reporter) {
            Ok(summary) if !summary.is_success() => {
                let details: Vec<String> = summary
                    .failed_artifacts
                    .iter()
                    .map(|f| format!("{}: {}", f.artifact, f.detail()))
                    .collect();
                status_error(
                    &format!("{} artifact(s) failed", summary.failed_artifacts.len()),
                    &details.join("\n"),
                );
            }
            Ok(summary) if summary.built == 0 => status_unchanged("nothing to rebuild"),
            Ok(summary) => status_success(&format!(
                "rebuilt {} in {}ms",
                summary.built,
                started.elapsed().as_millis()
            )),
            Err(e) => status_error("build failed", &format!("{e:#}")),
        }
    }

    /// Re-read the config and reopen the builder on it. The old builder is
    /// released first so the state lock can be taken again.
    fn reload_config(&mut self) -> Result<()> {
        let config = SiteConfig::load(self.cli)?;
        log!("watch"; "config changed, reloading");
        self.builder = None;
        self.config = config;
        self.builder = Some(Builder::new(Environment::new(self.config.clone()))?);
        Ok(())
    }
}
