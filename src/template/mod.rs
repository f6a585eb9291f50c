//! Template engines.
//!
//! The environment owns one [`TemplateEngine`]. Engines read every template
//! through [`recorder::read_to_string`](crate::build::recorder::read_to_string)
//! so templates and their includes become dependencies of the artifact being
//! built.

mod builtin;
mod value;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use thiserror::Error;

use crate::address::Alt;
use crate::db::{Pad, Source};

pub use builtin::BuiltinEngine;
pub use value::Value;

pub trait TemplateEngine: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> Result<String>;
}

/// Everything a template sees.
pub struct TemplateContext<'a> {
    pub pad: &'a Pad,
    pub this: Source,
    pub alt: Alt,
    /// URL of the artifact being rendered.
    pub base_url: String,
    pub vars: BTreeMap<String, Value>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(pad: &'a Pad, this: Source, base_url: impl Into<String>) -> Self {
        let alt = this.alt();
        Self {
            pad,
            this,
            alt,
            base_url: base_url.into(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// Top-level name lookup: `this`, `alt`, `site`, then extra variables.
    pub fn global(&self, name: &str) -> Value {
        match name {
            "this" => Value::Source(self.this.clone()),
            "alt" => Value::Str(self.alt.to_string()),
            "site" => {
                let site = &self.pad.config().site;
                let mut map = BTreeMap::new();
                map.insert("name".to_string(), Value::Str(site.name.clone()));
                map.insert(
                    "url".to_string(),
                    site.url.clone().map_or(Value::Null, Value::Str),
                );
                Value::Map(map)
            }
            _ => self.vars.get(name).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{name}` not found at `{path}`")]
    NotFound {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in `{name}`: {message}")]
    Syntax { name: String, message: String },

    #[error("include depth exceeded while rendering `{0}`")]
    IncludeDepth(String),

    #[error("`{expr}` in `{name}` is not a list")]
    NotIterable { name: String, expr: String },
}
