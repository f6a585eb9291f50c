//! The builder: walks the source graph and keeps the output in sync.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use jwalk::WalkDir;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use super::artifact::{ArtifactSpec, ArtifactState, BuildContext};
use super::error::{BuildError, BuildProgramError};
use super::program::BuildProgram;
use super::recorder::{self, ActiveArtifact};
use super::reporter::Reporter;
use crate::cache::BuildState;
use crate::db::{Pad, Source};
use crate::env::Environment;
use crate::hooks::HookEvent;
use crate::log;

/// Outcome of building one source.
#[derive(Debug)]
pub struct SourceBuild {
    pub source: Source,
    pub artifacts: Vec<(ArtifactSpec, ArtifactState)>,
    pub failures: Vec<BuildProgramError>,
    /// Sources to build next.
    pub children: Vec<Source>,
}

impl SourceBuild {
    fn empty(source: &Source) -> Self {
        Self {
            source: source.clone(),
            artifacts: Vec::new(),
            failures: Vec::new(),
            children: Vec::new(),
        }
    }

    fn count(&self, state: ArtifactState) -> usize {
        self.artifacts.iter().filter(|(_, s)| *s == state).count()
    }
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub built: usize,
    pub current: usize,
    pub failed_artifacts: Vec<BuildProgramError>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failed_artifacts.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PruneSummary {
    pub removed: Vec<String>,
}

pub struct Builder {
    pad: Pad,
    state: BuildState,
    output: PathBuf,
    /// Artifacts declared during the current pass; prune never touches them.
    visited: Mutex<FxHashSet<String>>,
}

impl Builder {
    pub fn new(env: Arc<Environment>) -> Result<Self, BuildError> {
        let build = &env.config.build;
        let state = BuildState::open(&env.config.root, &build.cache, build.checksum)?;
        let output = build.output.clone();
        Ok(Self {
            pad: Pad::new(env),
            state,
            output,
            visited: Mutex::new(FxHashSet::default()),
        })
    }

    pub fn pad(&self) -> &Pad {
        &self.pad
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn env(&self) -> &Environment {
        self.pad.env()
    }

    // ========================================================================
    // build
    // ========================================================================

    /// Build the artifacts of one source. Its children are returned, not
    /// built.
    pub fn build(&self, source: &Source, reporter: &dyn Reporter) -> Result<SourceBuild, BuildError> {
        let Some(program) = self.env().programs.select(source) else {
            crate::debug!("build"; "no program for {source}");
            return Ok(SourceBuild::empty(source));
        };

        reporter.enter_source(source);
        self.env()
            .hooks
            .emit(&mut HookEvent::BeforeBuild { source });
        let result = self.build_program(program.as_ref(), source, reporter);
        self.env().hooks.emit(&mut HookEvent::AfterBuild { source });
        reporter.leave_source(source);
        result
    }

    fn build_program(
        &self,
        program: &dyn BuildProgram,
        source: &Source,
        reporter: &dyn Reporter,
    ) -> Result<SourceBuild, BuildError> {
        let mut out = SourceBuild::empty(source);
        let config_hash = self.artifact_config_hash(program);

        for artifact in program.declare_artifacts(&self.pad) {
            self.visited.lock().insert(artifact.name.clone());

            reporter.artifact_state(&artifact, ArtifactState::Checking);
            let is_current = self.output.join(&artifact.name).exists()
                && self.state.is_current(&artifact.name, &config_hash)?;
            reporter.start_artifact_build(&artifact, is_current);

            let state: Result<ArtifactState, BuildError> = if is_current {
                Ok(ArtifactState::Current)
            } else {
                reporter.artifact_state(&artifact, ArtifactState::Building);
                reporter.build_func(program.name());
                self.build_artifact(program, source, &artifact, &config_hash)
                    .or_else(|err| {
                        let cause = BuildError::classify(err)?;
                        let failure = BuildProgramError {
                            artifact: artifact.name.clone(),
                            source_id: source.identity(),
                            cause,
                        };
                        self.state.mark_failed(&artifact.name, &failure.source_id)?;
                        reporter.report_failure(&failure);
                        out.failures.push(failure);
                        Ok(ArtifactState::Failed)
                    })
            };

            let reported = state.as_ref().copied().unwrap_or(ArtifactState::Failed);
            reporter.finish_artifact_build(&artifact, reported);
            out.artifacts.push((artifact, state?));
        }

        out.children = match program.child_sources(&self.pad) {
            Ok(children) => children,
            Err(err) => {
                let err = BuildError::classify(err.into())?;
                log!("error"; "failed to list children of {source}: {err:#}");
                Vec::new()
            }
        };
        Ok(out)
    }

    fn build_artifact(
        &self,
        program: &dyn BuildProgram,
        source: &Source,
        artifact: &ArtifactSpec,
        config_hash: &str,
    ) -> anyhow::Result<ArtifactState> {
        let recorder = self
            .state
            .begin_recording(ActiveArtifact::new(&artifact.name, artifact.url.as_str()))?;
        for file in source.source_filenames() {
            recorder::record(file);
        }

        let mut ctx = BuildContext::new(&self.output, &artifact.name)?;
        program.build_artifact(&self.pad, artifact, &mut ctx)?;
        ctx.finish()
            .with_context(|| format!("failed to write `{}`", artifact.name))?;

        self.state
            .commit(&artifact.name, &source.identity(), recorder, config_hash)?;
        Ok(ArtifactState::Built)
    }

    fn artifact_config_hash(&self, program: &dyn BuildProgram) -> String {
        let base = self.env().config_hash();
        match program.config_hash() {
            Some(extra) => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(base.as_bytes());
                hasher.update(program.name().as_bytes());
                hasher.update(extra.as_bytes());
                hasher.finalize().to_hex().to_string()
            }
            None => base.to_string(),
        }
    }

    /// One full pass from every alt's root and the asset root.
    pub fn build_all(&self, reporter: &dyn Reporter) -> Result<BuildSummary, BuildError> {
        let started = Instant::now();
        reporter.start_build("build");
        self.env().hooks.emit(&mut HookEvent::BeforeBuildAll);

        self.pad.flush();
        self.state.begin_pass();
        self.visited.lock().clear();

        let mut pending = self.roots()?;
        pending.reverse();
        let mut seen = FxHashSet::default();
        let mut summary = BuildSummary::default();

        while let Some(source) = pending.pop() {
            if !seen.insert(source.identity()) {
                continue;
            }
            let build = self.build(&source, reporter)?;
            summary.built += build.count(ArtifactState::Built);
            summary.current += build.count(ArtifactState::Current);
            summary.failed_artifacts.extend(build.failures);
            pending.extend(build.children.into_iter().rev());
        }

        self.env()
            .hooks
            .emit(&mut HookEvent::AfterBuildAll { summary: &summary });
        reporter.finish_build("build", started.elapsed());
        Ok(summary)
    }

    fn roots(&self) -> Result<Vec<Source>, BuildError> {
        let mut roots = Vec::new();
        for alt in self.pad.space().build_alts() {
            match self.pad.root(&alt) {
                Ok(Some(root)) => roots.push(Source::Record(root)),
                Ok(None) => crate::debug!("build"; "no root record in alt `{alt}`"),
                Err(err) => {
                    let err = BuildError::classify(err.into())?;
                    log!("error"; "failed to load root of alt `{alt}`: {err:#}");
                }
            }
        }
        roots.extend(self.pad.asset_root());
        Ok(roots)
    }

    // ========================================================================
    // prune & clean
    // ========================================================================

    /// Remove artifacts whose source is gone, hidden, or no longer declares
    /// them. Artifacts declared in the current pass are always kept. With
    /// `all`, the build state is cleared afterwards.
    pub fn prune(&self, all: bool, reporter: &dyn Reporter) -> Result<PruneSummary, BuildError> {
        let started = Instant::now();
        reporter.start_build("prune");
        self.env().hooks.emit(&mut HookEvent::BeforePrune);

        let visited = self.visited.lock().clone();
        let mut summary = PruneSummary::default();
        for (artifact, source_id) in self.state.artifacts() {
            if visited.contains(&artifact) || !self.is_stale(&artifact, &source_id)? {
                continue;
            }
            self.remove_artifact(&artifact)?;
            reporter.report_pruned(&artifact);
            summary.removed.push(artifact);
        }
        if all {
            self.state.clear()?;
        }
        self.remove_empty_dirs();

        self.env().hooks.emit(&mut HookEvent::AfterPrune {
            removed: &summary.removed,
        });
        reporter.finish_build("prune", started.elapsed());
        Ok(summary)
    }

    /// Only a source that no longer resolves makes an artifact stale. A
    /// lookup error aborts the prune.
    fn is_stale(&self, artifact: &str, source_id: &str) -> Result<bool, BuildError> {
        let source = match self.pad.get_by_identity(source_id) {
            Ok(Some(source)) => source,
            Ok(None) => return Ok(true),
            Err(source) => {
                return Err(BuildError::Lookup {
                    source_id: source_id.to_string(),
                    source,
                });
            }
        };
        if source.is_hidden() {
            return Ok(true);
        }
        Ok(match self.env().programs.select(&source) {
            Some(program) => !program
                .declare_artifacts(&self.pad)
                .iter()
                .any(|spec| spec.name == artifact),
            None => true,
        })
    }

    /// Delete every recorded artifact and forget all state.
    pub fn clean(&self, reporter: &dyn Reporter) -> Result<usize, BuildError> {
        let started = Instant::now();
        reporter.start_build("clean");
        let artifacts = self.state.artifacts();
        for (artifact, _) in &artifacts {
            self.remove_artifact(artifact)?;
            reporter.report_pruned(artifact);
        }
        self.state.clear()?;
        self.visited.lock().clear();
        self.remove_empty_dirs();
        reporter.finish_build("clean", started.elapsed());
        Ok(artifacts.len())
    }

    fn remove_artifact(&self, artifact: &str) -> Result<(), BuildError> {
        let path = self.output.join(artifact);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(BuildError::Io(path, err)),
        }
        self.state.remove(artifact)?;
        Ok(())
    }

    /// Remove directories below the output root left empty, deepest first.
    fn remove_empty_dirs(&self) {
        if !self.output.is_dir() {
            return;
        }
        let mut dirs: Vec<(usize, PathBuf)> = WalkDir::new(&self.output)
            .skip_hidden(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.depth > 0 && e.file_type().is_dir())
            .map(|e| (e.depth, e.path()))
            .collect();
        dirs.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, dir) in dirs {
            // Non-empty directories stay.
            let _ = fs::remove_dir(&dir);
        }
    }
}
