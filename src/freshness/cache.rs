//! Per-pass checksum memoization.

use dashmap::DashMap;
use std::path::{Path, PathBuf};

use super::Checksum;
use crate::config::ChecksumMode;

/// Checksum cache shared by all staleness checks of one build pass.
///
/// Cleared at the start of every pass so that edits between passes are
/// picked up.
#[derive(Debug)]
pub struct FreshnessCache {
    mode: ChecksumMode,
    checksums: DashMap<PathBuf, Checksum>,
}

impl FreshnessCache {
    pub fn new(mode: ChecksumMode) -> Self {
        Self {
            mode,
            checksums: DashMap::new(),
        }
    }

    #[inline]
    pub fn mode(&self) -> ChecksumMode {
        self.mode
    }

    /// Live checksum of `path`, computed once per pass.
    pub fn checksum(&self, path: &Path) -> Checksum {
        if let Some(cached) = self.checksums.get(path) {
            return *cached;
        }
        let checksum = Checksum::compute(path, self.mode);
        self.checksums.insert(path.to_path_buf(), checksum);
        checksum
    }

    pub fn invalidate(&self, path: &Path) {
        self.checksums.remove(path);
    }

    pub fn clear(&self) {
        self.checksums.clear();
    }

    pub fn len(&self) -> usize {
        self.checksums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }
}
