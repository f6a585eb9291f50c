//! Site configuration management for `folio.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section.rs   # [site], [alternates.*], [build], [serve]
//! ├── error.rs     # ConfigError, ConfigDiagnostics
//! ├── util.rs      # find_config_file
//! └── mod.rs       # SiteConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section             | Purpose                                      |
//! |---------------------|----------------------------------------------|
//! | `[site]`            | Site name and public URL                     |
//! | `[alternates.<c>]`  | Alternates (translations) and URL prefixes   |
//! | `[build]`           | Source/output directories, checksum strategy |
//! | `[serve]`           | Development server (port, interface, watch)  |

mod error;
mod section;
mod util;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use section::{AlternateConfig, BuildSection, ChecksumMode, ServeConfig, SiteSection};
pub use util::find_config_file;

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use util::is_valid_url_prefix;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing folio.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteSection,

    #[serde(default)]
    pub alternates: BTreeMap<String, AlternateConfig>,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file.
    /// The project root is the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            return Err(ConfigError::NotFound(cli.config.clone()).into());
        };

        let mut config = Self::from_path(&config_path)?;
        config.config_path = crate::utils::path::normalize_path(&config_path);

        let root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.apply_command_options(cli);
        config.finalize(&root);
        config.validate()?;

        Ok(config)
    }

    /// Default configuration rooted at `root`, without a config file.
    pub fn for_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.finalize(root);
        config
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Resolve every configured directory against `root`.
    pub fn finalize(&mut self, root: &Path) {
        let root = crate::utils::path::normalize_path(root);
        let build = &mut self.build;
        for dir in [
            &mut build.content,
            &mut build.assets,
            &mut build.templates,
            &mut build.models,
            &mut build.output,
            &mut build.cache,
        ] {
            *dir = root.join(&*dir);
        }
        self.root = root;
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        match &cli.command {
            Commands::Build { build_args } => {
                Self::update_option(&mut self.build.prune, build_args.prune.as_ref());
            }
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
            } => {
                Self::update_option(&mut self.build.prune, build_args.prune.as_ref());
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
            }
            Commands::Prune { .. } | Commands::Clean | Commands::Query { .. } => {}
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // accessors
    // ========================================================================

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Get path relative to the site root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Hash of everything in the configuration that affects output.
    ///
    /// Covers the config file itself (or the parsed values when there is
    /// no file) and the crate version.
    pub fn config_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
        match fs::read(&self.config_path) {
            Ok(bytes) => {
                hasher.update(&bytes);
            }
            Err(_) => {
                let serialized = serde_json::to_vec(self).unwrap_or_default();
                hasher.update(&serialized);
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration, collecting all errors at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.site.validate(&mut diag);
        self.build.validate(&mut diag);
        self.validate_alternates(&mut diag);

        diag.into_result()
            .map_err(ConfigError::Diagnostics)
            .context("invalid configuration")
    }

    fn validate_alternates(&self, diag: &mut ConfigDiagnostics) {
        let primaries: Vec<_> = self
            .alternates
            .iter()
            .filter(|(_, alt)| alt.primary)
            .map(|(code, _)| code.as_str())
            .collect();
        if primaries.len() > 1 {
            diag.error_with_hint(
                "alternates",
                format!("more than one primary alternate: {}", primaries.join(", ")),
                "keep `primary = true` on a single alternate",
            );
        }

        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (code, alt) in &self.alternates {
            if code.is_empty()
                || !code
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                diag.error(
                    format!("alternates.{code}"),
                    "alternate codes may only contain ASCII letters, digits, `_` and `-`",
                );
            }
            let Some(prefix) = &alt.url_prefix else {
                continue;
            };
            if !is_valid_url_prefix(prefix) {
                diag.error_with_hint(
                    format!("alternates.{code}.url_prefix"),
                    format!("invalid URL prefix `{prefix}`"),
                    "prefixes start and end with `/`, e.g. `/de/`",
                );
            }
            if let Some(other) = seen.insert(prefix.as_str(), code.as_str()) {
                diag.error(
                    format!("alternates.{code}.url_prefix"),
                    format!("URL prefix `{prefix}` is already used by `{other}`"),
                );
            }
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config and panic on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> SiteConfig {
    let config = format!("[site]\nname = \"Test\"\n{extra}");
    let (parsed, ignored) = SiteConfig::parse_with_ignored(&config).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        let result = SiteConfig::from_str("[site\nname = \"My Site\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[site]\nname = \"Test\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = SiteConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.site.name, "Test");
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_finalize_resolves_directories() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::for_root(dir.path());
        let root = config.get_root().to_path_buf();

        assert_eq!(config.build.content, root.join("content"));
        assert_eq!(config.build.output, root.join("public"));
        assert_eq!(config.build.cache, root.join(".folio/cache"));
        assert_eq!(config.root_relative(root.join("content/a")), PathBuf::from("content/a"));
    }

    #[test]
    fn test_validate_two_primaries() {
        let config = test_parse_config(
            "[alternates.en]\nprimary = true\n[alternates.de]\nprimary = true",
        );
        let err = config.validate().unwrap_err();
        let diag = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(diag, ConfigError::Diagnostics(d) if d.len() == 1));
    }

    #[test]
    fn test_validate_url_prefixes() {
        let config = test_parse_config(
            "[alternates.en]\nurl_prefix = \"/x/\"\n[alternates.de]\nurl_prefix = \"/x/\"\n[alternates.fr]\nurl_prefix = \"fr\"",
        );
        let err = config.validate().unwrap_err();
        let Some(ConfigError::Diagnostics(diag)) = err.downcast_ref::<ConfigError>() else {
            panic!("expected diagnostics");
        };
        assert_eq!(diag.len(), 2);
    }

    #[test]
    fn test_config_hash_changes_with_config() {
        let a = test_parse_config("[serve]\nport = 9000");
        let b = test_parse_config("");
        assert_eq!(b.config_hash(), b.config_hash());
        assert_ne!(a.config_hash(), b.config_hash());
    }
}
