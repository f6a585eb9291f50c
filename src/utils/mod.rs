//! Small shared helpers: paths, slugs, HTML escaping and MIME types.

pub mod html;
pub mod mime;
pub mod path;
pub mod slug;
