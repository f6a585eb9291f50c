//! Address space: database paths, alternates and URLs.
//!
//! # Module Structure
//!
//! ```text
//! address/
//! ├── path.rs    # RecordPath, DbPath, MalformedPathError
//! ├── alt.rs     # Alt, AddressSpace, SourceKey
//! └── url.rs     # UrlPath, make_relative_url
//! ```

mod alt;
mod path;
mod url;

pub use alt::{AddressSpace, Alt, AltSpec, PRIMARY_ALT, SourceKey};
pub use path::{DbPath, MalformedPathError, RecordPath};
pub use self::url::{UrlPath, make_relative_url};
