//! Link resolution against the source graph.
//!
//! Runs inside an installed [`RenderContext`](super::RenderContext). A target
//! is resolved as a database path relative to the rendering record, in the
//! record's alt unless the link carries `?alt=xx`, and rewritten to a URL
//! relative to the artifact being built.
//!
//! ```text
//! child                 -> ./child/ relative to the artifact
//! ../sibling?alt=de     -> sibling in alt de
//! /about#team           -> about page, fragment kept
//! !raw/path             -> raw/path, never resolved
//! https://example.com   -> unchanged
//! ```

use super::context::with_context;
use super::controller::LinkRewriter;
use super::{RenderError, UnresolvableLinkError};
use crate::address::{DbPath, MalformedPathError, make_relative_url};
use crate::db::{LinkPolicy, Pad};
use crate::utils::path::url::{is_passthrough_link, split_path_fragment, split_path_query};

/// Rewrites markup links through a [`Pad`].
pub struct PadLinks<'a> {
    pad: &'a Pad,
}

impl<'a> PadLinks<'a> {
    pub fn new(pad: &'a Pad) -> Self {
        Self { pad }
    }

    fn resolve(&self, base: &DbPath, alt: &str, base_url: &str, target: &str) -> Result<Option<String>, RenderError> {
        let (rest, fragment) = split_path_fragment(target);
        let (path, query) = split_path_query(rest);
        let query_alt = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("alt="))
            .filter(|a| !a.is_empty());

        let joined = match base.join(path) {
            Ok(joined) => joined,
            Err(err @ MalformedPathError::ConflictingAlt { .. }) => return Err(err.into()),
            Err(_) => return Ok(None),
        };
        let joined = self.pad.space().with_alt(joined, Some(query_alt.unwrap_or(alt)))?;

        let url = match self.pad.get_path(&joined, true)? {
            Some(source) if source.is_visible() => source.url_path(),
            _ if path.starts_with('/') => match self.pad.get_asset(path.trim_start_matches('/')) {
                Some(asset) => asset.url_path(),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        let mut out = make_relative_url(base_url, url.as_str());
        if !fragment.is_empty() {
            out.push('#');
            out.push_str(fragment);
        }
        Ok(Some(out))
    }
}

impl LinkRewriter for PadLinks<'_> {
    fn rewrite(&self, target: &str) -> Result<String, RenderError> {
        let Some((base, alt, base_url, policy)) = with_context(|ctx| {
            (
                ctx.record.clone(),
                ctx.alt.clone(),
                ctx.base_url.clone(),
                ctx.policy,
            )
        }) else {
            return Ok(target.to_string());
        };

        if policy == LinkPolicy::Never {
            return Ok(target.to_string());
        }
        if let Some(raw) = target.strip_prefix('!') {
            return Ok(raw.to_string());
        }
        if is_passthrough_link(target) {
            return Ok(target.to_string());
        }

        match self.resolve(&base, alt.as_str(), &base_url, target)? {
            Some(url) => Ok(url),
            None if policy == LinkPolicy::Always => Err(UnresolvableLinkError {
                target: target.to_string(),
                record: base.to_string(),
            }
            .into()),
            None => Ok(target.to_string()),
        }
    }
}
