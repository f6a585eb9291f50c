//! Path and URL helpers.
//!
//! - [`fs`]: filesystem normalization and root-relative keys
//! - [`url`]: link classification (`is_external_link`, `split_path_fragment`)

pub mod fs;
pub mod url;

pub use fs::{normalize_path, relative_slash, to_slash};
