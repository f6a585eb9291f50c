//! Dependency checksums.
//!
//! Stored as strings in the build state:
//!
//! | Form                          | Meaning                              |
//! |-------------------------------|--------------------------------------|
//! | `content:<blake3 hex>`        | file contents                        |
//! | `mtime:<secs>.<nanos>:<len>`  | modification time and length         |
//! | `dir:<blake3 hex>`            | sorted directory entry names         |
//! | `missing`                     | path did not exist                   |
//!
//! `missing` is a real value: a build that looked for a file which did not
//! exist goes stale once the file appears.

use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use super::hash::{ContentHash, hash_dir_listing, hash_file};
use crate::config::ChecksumMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Checksum {
    Content(ContentHash),
    Mtime { secs: u64, nanos: u32, len: u64 },
    Dir(ContentHash),
    Missing,
}

impl Checksum {
    /// Compute the live checksum of `path`.
    ///
    /// Files that cannot be read fall back to their mtime so that a
    /// permission problem does not look like "unchanged".
    pub fn compute(path: &Path, mode: ChecksumMode) -> Self {
        let Ok(meta) = path.metadata() else {
            return Self::Missing;
        };

        if meta.is_dir() {
            return hash_dir_listing(path).map_or_else(|_| Self::from_metadata(&meta), Self::Dir);
        }

        match mode {
            ChecksumMode::Content => {
                hash_file(path).map_or_else(|_| Self::from_metadata(&meta), Self::Content)
            }
            ChecksumMode::Mtime => Self::from_metadata(&meta),
        }
    }

    fn from_metadata(meta: &Metadata) -> Self {
        let (secs, nanos) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or((0, 0), |d| (d.as_secs(), d.subsec_nanos()));
        Self::Mtime {
            secs,
            nanos,
            len: meta.len(),
        }
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(hash) => write!(f, "content:{}", hash.to_hex()),
            Self::Mtime { secs, nanos, len } => write!(f, "mtime:{secs}.{nanos:09}:{len}"),
            Self::Dir(hash) => write!(f, "dir:{}", hash.to_hex()),
            Self::Missing => f.write_str("missing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid checksum `{0}`")]
pub struct InvalidChecksum(String);

impl FromStr for Checksum {
    type Err = InvalidChecksum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidChecksum(s.to_string());
        if s == "missing" {
            return Ok(Self::Missing);
        }
        let (kind, value) = s.split_once(':').ok_or_else(invalid)?;
        match kind {
            "content" => ContentHash::from_hex(value)
                .map(Self::Content)
                .ok_or_else(invalid),
            "dir" => ContentHash::from_hex(value).map(Self::Dir).ok_or_else(invalid),
            "mtime" => {
                let (time, len) = value.split_once(':').ok_or_else(invalid)?;
                let (secs, nanos) = time.split_once('.').ok_or_else(invalid)?;
                Ok(Self::Mtime {
                    secs: secs.parse().map_err(|_| invalid())?,
                    nanos: nanos.parse().map_err(|_| invalid())?,
                    len: len.parse().map_err(|_| invalid())?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_string()
    }
}

impl TryFrom<String> for Checksum {
    type Error = InvalidChecksum;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
