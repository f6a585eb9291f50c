//! Freshness detection: blake3 content hashes with an mtime fallback.

mod cache;
mod checksum;
mod hash;

pub use cache::FreshnessCache;
pub use checksum::{Checksum, InvalidChecksum};
pub use hash::{ContentHash, hash_bytes, hash_dir_listing, hash_file};
