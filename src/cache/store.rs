//! Snapshot + journal persistence for the build state.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::lock::LockFile;
use super::{JOURNAL_FILE, LOCK_FILE, PersistentCacheError, SCHEMA_VERSION, SNAPSHOT_FILE};
use crate::build::recorder::{ActiveArtifact, Recorder};
use crate::build::ReentrantContextError;
use crate::config::ChecksumMode;
use crate::debug;
use crate::freshness::{Checksum, FreshnessCache};
use crate::utils::path::relative_slash;

type Result<T> = std::result::Result<T, PersistentCacheError>;

/// What the store knows about one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Identity of the owning source (`SourceKey` display form).
    pub source: String,
    /// Root-relative path (slash form) → checksum at build time.
    pub dependencies: BTreeMap<String, Checksum>,
    pub config_hash: String,
    #[serde(default)]
    pub failed: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    schema: u32,
    artifacts: BTreeMap<String, ArtifactRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalEntry {
    Put {
        artifact: String,
        record: ArtifactRecord,
    },
    Remove {
        artifact: String,
    },
    Clear,
}

struct StateInner {
    artifacts: BTreeMap<String, ArtifactRecord>,
    journal: File,
}

/// Persistent artifact → dependency store.
///
/// Every mutation appends one JSON line to the journal and syncs it before
/// the in-memory map changes, so an interrupted build leaves the state as of
/// the last completed commit. Opening replays the journal and compacts it
/// into the snapshot.
pub struct BuildState {
    root: PathBuf,
    dir: PathBuf,
    inner: RwLock<StateInner>,
    freshness: FreshnessCache,
    _lock: LockFile,
}

impl BuildState {
    /// Open (or create) the state in `dir`; dependency paths are stored
    /// relative to `root`.
    pub fn open(root: &Path, dir: &Path, mode: ChecksumMode) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| PersistentCacheError::io(dir, e))?;
        let lock = LockFile::acquire(&dir.join(LOCK_FILE))?;

        let mut artifacts = load_snapshot(&dir.join(SNAPSHOT_FILE))?;
        let replayed = replay_journal(&dir.join(JOURNAL_FILE), &mut artifacts)?;

        let journal_path = dir.join(JOURNAL_FILE);
        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)
            .map_err(|e| PersistentCacheError::io(&journal_path, e))?;

        let state = Self {
            root: root.to_path_buf(),
            dir: dir.to_path_buf(),
            inner: RwLock::new(StateInner { artifacts, journal }),
            freshness: FreshnessCache::new(mode),
            _lock: lock,
        };
        if replayed > 0 {
            debug!("cache"; "replayed {} journal entries", replayed);
        }
        // Also drops a torn tail so later appends never follow it.
        state.compact()?;
        Ok(state)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether `artifact` was built successfully under `config_hash` and
    /// none of its recorded dependencies changed since.
    pub fn is_current(&self, artifact: &str, config_hash: &str) -> Result<bool> {
        let Some(record) = self.get(artifact) else {
            return Ok(false);
        };
        if record.failed || record.config_hash != config_hash {
            return Ok(false);
        }
        Ok(record
            .dependencies
            .par_iter()
            .all(|(rel, stored)| self.freshness.checksum(&self.root.join(rel)) == *stored))
    }

    pub fn get(&self, artifact: &str) -> Option<ArtifactRecord> {
        self.inner.read().artifacts.get(artifact).cloned()
    }

    pub fn contains(&self, artifact: &str) -> bool {
        self.inner.read().artifacts.contains_key(artifact)
    }

    /// Recorded dependency paths of `artifact`, root-relative.
    pub fn get_recorded_dependencies(&self, artifact: &str) -> Vec<String> {
        self.inner
            .read()
            .artifacts
            .get(artifact)
            .map(|r| r.dependencies.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All artifacts with their owning source identity.
    pub fn artifacts(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .artifacts
            .iter()
            .map(|(name, r)| (name.clone(), r.source.clone()))
            .collect()
    }

    pub fn artifacts_for_source(&self, source: &str) -> Vec<String> {
        self.inner
            .read()
            .artifacts
            .iter()
            .filter(|(_, r)| r.source == source)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn failed_artifacts(&self) -> Vec<String> {
        self.inner
            .read()
            .artifacts
            .iter()
            .filter(|(_, r)| r.failed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().artifacts.is_empty()
    }

    // ========================================================================
    // Recording and mutation
    // ========================================================================

    /// Start recording dependencies for `artifact` on this thread.
    pub fn begin_recording(
        &self,
        artifact: ActiveArtifact,
    ) -> std::result::Result<Recorder, ReentrantContextError> {
        Recorder::install(artifact)
    }

    /// Start a build pass: live checksums are recomputed from here on.
    pub fn begin_pass(&self) {
        self.freshness.clear();
    }

    /// Replace the dependency set of `artifact` with what `recorder` saw.
    pub fn commit(
        &self,
        artifact: &str,
        source: &str,
        recorder: Recorder,
        config_hash: &str,
    ) -> Result<()> {
        self.commit_paths(artifact, source, recorder.finish(), config_hash)
    }

    /// [`commit`](Self::commit) with an explicit path set.
    pub fn commit_paths(
        &self,
        artifact: &str,
        source: &str,
        paths: impl IntoIterator<Item = PathBuf>,
        config_hash: &str,
    ) -> Result<()> {
        let dependencies = paths
            .into_iter()
            .map(|path| {
                let absolute = if path.is_absolute() {
                    path
                } else {
                    self.root.join(path)
                };
                // Outputs may have been written since the pass began.
                self.freshness.invalidate(&absolute);
                let checksum = self.freshness.checksum(&absolute);
                (relative_slash(&self.root, &absolute), checksum)
            })
            .collect();

        self.put(
            artifact,
            ArtifactRecord {
                source: source.to_string(),
                dependencies,
                config_hash: config_hash.to_string(),
                failed: false,
            },
        )
    }

    /// Record `artifact` as failed; it is rebuilt on the next pass.
    pub fn mark_failed(&self, artifact: &str, source: &str) -> Result<()> {
        let record = ArtifactRecord {
            source: source.to_string(),
            dependencies: BTreeMap::new(),
            config_hash: String::new(),
            failed: true,
        };
        self.put(artifact, record)
    }

    pub fn remove(&self, artifact: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        if !inner.artifacts.contains_key(artifact) {
            return Ok(false);
        }
        self.append(
            &mut inner.journal,
            &JournalEntry::Remove {
                artifact: artifact.to_string(),
            },
        )?;
        inner.artifacts.remove(artifact);
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        self.append(&mut inner.journal, &JournalEntry::Clear)?;
        inner.artifacts.clear();
        Ok(())
    }

    fn put(&self, artifact: &str, record: ArtifactRecord) -> Result<()> {
        let mut inner = self.inner.write();
        let entry = JournalEntry::Put {
            artifact: artifact.to_string(),
            record,
        };
        self.append(&mut inner.journal, &entry)?;
        if let JournalEntry::Put { artifact, record } = entry {
            inner.artifacts.insert(artifact, record);
        }
        Ok(())
    }

    fn append(&self, journal: &mut File, entry: &JournalEntry) -> Result<()> {
        let path = self.dir.join(JOURNAL_FILE);
        let mut line = serde_json::to_string(entry).map_err(|e| PersistentCacheError::Corrupt {
            path: path.clone(),
            line: 0,
            reason: e.to_string(),
        })?;
        line.push('\n');
        journal
            .write_all(line.as_bytes())
            .and_then(|()| journal.sync_data())
            .map_err(|e| PersistentCacheError::io(&path, e))
    }

    /// Fold the journal into the snapshot.
    pub fn compact(&self) -> Result<()> {
        let inner = self.inner.write();
        let snapshot_path = self.dir.join(SNAPSHOT_FILE);
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));

        let snapshot = SnapshotRef {
            schema: SCHEMA_VERSION,
            artifacts: &inner.artifacts,
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| {
            PersistentCacheError::Corrupt {
                path: snapshot_path.clone(),
                line: 0,
                reason: e.to_string(),
            }
        })?;

        let mut file = File::create(&tmp).map_err(|e| PersistentCacheError::io(&tmp, e))?;
        file.write_all(&json)
            .and_then(|()| file.sync_all())
            .map_err(|e| PersistentCacheError::io(&tmp, e))?;
        fs::rename(&tmp, &snapshot_path)
            .map_err(|e| PersistentCacheError::io(&snapshot_path, e))?;

        inner
            .journal
            .set_len(0)
            .map_err(|e| PersistentCacheError::io(self.dir.join(JOURNAL_FILE), e))?;
        debug!("cache"; "compacted {} artifacts", inner.artifacts.len());
        Ok(())
    }
}

impl Drop for BuildState {
    fn drop(&mut self) {
        if let Err(err) = self.compact() {
            debug!("cache"; "compaction on close failed: {}", err);
        }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    schema: u32,
    artifacts: &'a BTreeMap<String, ArtifactRecord>,
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<String, ArtifactRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(PersistentCacheError::io(path, e)),
    };
    let snapshot: Snapshot =
        serde_json::from_slice(&bytes).map_err(|e| PersistentCacheError::Corrupt {
            path: path.to_path_buf(),
            line: e.line(),
            reason: e.to_string(),
        })?;
    if snapshot.schema != SCHEMA_VERSION {
        debug!("cache"; "schema {} != {}, starting fresh", snapshot.schema, SCHEMA_VERSION);
        return Ok(BTreeMap::new());
    }
    Ok(snapshot.artifacts)
}

/// Apply journal lines in order. A malformed final line is a torn write and
/// is dropped; a malformed line followed by others is corruption.
fn replay_journal(path: &Path, artifacts: &mut BTreeMap<String, ArtifactRecord>) -> Result<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(PersistentCacheError::io(path, e)),
    };
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .map_err(|e| PersistentCacheError::io(path, e))?;

    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let mut applied = 0;
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(JournalEntry::Put { artifact, record }) => {
                artifacts.insert(artifact, record);
            }
            Ok(JournalEntry::Remove { artifact }) => {
                artifacts.remove(&artifact);
            }
            Ok(JournalEntry::Clear) => artifacts.clear(),
            Err(_) if Some(idx) == last => {
                debug!("cache"; "ignoring torn journal line {}", idx + 1);
                continue;
            }
            Err(e) => {
                return Err(PersistentCacheError::Corrupt {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
        applied += 1;
    }
    Ok(applied)
}
