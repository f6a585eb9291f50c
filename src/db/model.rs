//! Data models from `models/<name>.toml`.
//!
//! ```toml
//! [model]
//! name = "Blog"
//! template = "blog.html"
//!
//! [children]
//! model = "blog-post"
//! order_by = ["-pub_date", "title"]
//!
//! [pagination]
//! enabled = true
//! per_page = 10
//!
//! [attachments]
//! thumbnails = [320, 640]
//!
//! [fields.body]
//! type = "markdown"
//! resolve_links = "always"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use super::DbError;
use crate::build::recorder;

/// Default model for records that name none.
pub const DEFAULT_MODEL: &str = "page";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: ModelSection,
    pub children: ChildrenSection,
    pub pagination: PaginationSection,
    pub attachments: AttachmentsSection,
    pub fields: BTreeMap<String, FieldSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub name: Option<String>,
    pub template: Option<String>,
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChildrenSection {
    /// Model for children that do not set `_model`.
    pub model: Option<String>,
    pub order_by: Vec<String>,
    /// Hide all children (overridable per child with `_hidden`).
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSection {
    pub enabled: bool,
    pub per_page: u32,
    pub url_suffix: String,
    /// Filter applied to the paginated children, e.g. `"status == published"`.
    pub filter: Option<String>,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            enabled: false,
            per_page: 20,
            url_suffix: "page".into(),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentsSection {
    /// Thumbnail widths generated for image attachments.
    pub thumbnails: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Text,
    Markdown,
    Boolean,
    Integer,
}

/// What to do with links that do not resolve to a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPolicy {
    /// Resolve when possible, keep the literal URL otherwise.
    #[default]
    Auto,
    /// Unresolvable links are an error.
    Always,
    /// Never resolve.
    Never,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub resolve_links: LinkPolicy,
}

/// A loaded model.
#[derive(Debug)]
pub struct DataModel {
    pub id: String,
    pub config: ModelConfig,
    /// The TOML file; recorded as a dependency even when absent.
    pub path: PathBuf,
    pub exists: bool,
}

impl DataModel {
    pub fn field(&self, name: &str) -> FieldSpec {
        self.config.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn template(&self) -> String {
        self.config
            .model
            .template
            .clone()
            .unwrap_or_else(|| format!("{}.html", self.id))
    }

    pub fn display_name(&self) -> &str {
        self.config.model.name.as_deref().unwrap_or(&self.id)
    }

    #[inline]
    pub fn paginated(&self) -> bool {
        self.config.pagination.enabled
    }
}

/// Models by id, loaded on first use.
#[derive(Debug)]
pub struct ModelRegistry {
    dir: PathBuf,
    models: RwLock<FxHashMap<String, Arc<DataModel>>>,
}

impl ModelRegistry {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            models: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.toml"))
    }

    /// Load `id`, recording the model file on the active recorder.
    pub fn get(&self, id: &str) -> Result<Arc<DataModel>, DbError> {
        let path = self.path_for(id);
        recorder::record(&path);

        if let Some(model) = self.models.read().get(id) {
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(load(id, path)?);
        self.models
            .write()
            .insert(id.to_string(), Arc::clone(&model));
        Ok(model)
    }

    pub fn clear(&self) {
        self.models.write().clear();
    }
}

fn load(id: &str, path: PathBuf) -> Result<DataModel, DbError> {
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(DataModel {
                id: id.to_string(),
                config: ModelConfig::default(),
                path,
                exists: false,
            });
        }
        Err(source) => return Err(DbError::Io { path, source }),
    };
    let config = toml::from_str(&text).map_err(|source| DbError::Model {
        path: path.clone(),
        source,
    })?;
    Ok(DataModel {
        id: id.to_string(),
        config,
        path,
        exists: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::recorder::{ActiveArtifact, Recorder};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_model() {
        let config: ModelConfig = toml::from_str(
            r#"
[model]
name = "Blog"

[children]
model = "blog-post"
order_by = ["-pub_date"]

[pagination]
enabled = true
per_page = 2

[fields.body]
type = "markdown"
resolve_links = "always"
"#,
        )
        .unwrap();
        assert_eq!(config.children.model.as_deref(), Some("blog-post"));
        assert_eq!(config.pagination.per_page, 2);
        assert_eq!(config.pagination.url_suffix, "page");
        assert_eq!(config.fields["body"].kind, FieldType::Markdown);
        assert_eq!(config.fields["body"].resolve_links, LinkPolicy::Always);
    }

    #[test]
    fn test_missing_model_is_implicit_and_recorded() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::new(dir.path());

        let rec = Recorder::install(ActiveArtifact::new("index.html", "/")).unwrap();
        let model = registry.get("page").unwrap();
        let touched = rec.finish();

        assert!(!model.exists);
        assert_eq!(model.template(), "page.html");
        assert_eq!(model.field("anything").kind, FieldType::String);
        assert!(touched.contains(&dir.path().join("page.toml")));
    }

    #[test]
    fn test_invalid_model_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.toml"), "[model\nname=").unwrap();
        let registry = ModelRegistry::new(dir.path());
        assert!(matches!(registry.get("bad"), Err(DbError::Model { .. })));
    }

    #[test]
    fn test_cached_until_cleared() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::new(dir.path());
        fs::write(dir.path().join("blog.toml"), "[model]\ntemplate = \"a.html\"").unwrap();
        assert_eq!(registry.get("blog").unwrap().template(), "a.html");

        fs::write(dir.path().join("blog.toml"), "[model]\ntemplate = \"b.html\"").unwrap();
        assert_eq!(registry.get("blog").unwrap().template(), "a.html");
        registry.clear();
        assert_eq!(registry.get("blog").unwrap().template(), "b.html");
    }
}
