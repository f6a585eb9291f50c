//! Query command implementation.
//!
//! Shows what the database knows about one source: where it comes from,
//! its fields, the artifacts it declares and their recorded state.

use anyhow::{Result, bail};
use serde_json::{Map, Value as JsonValue, json};

use crate::build::ArtifactState;
use crate::build::program::ProgramRegistry;
use crate::cache::BuildState;
use crate::config::SiteConfig;
use crate::db::{FieldValue, Pad, Source};
use crate::env::Environment;
use crate::log;

/// Execute query command
pub fn run_query(config: &SiteConfig, target: &str, alt: Option<&str>, pretty: bool) -> Result<()> {
    let pad = Pad::new(Environment::new(config.clone()));
    let Some(source) = lookup(&pad, target, alt)? else {
        bail!("nothing found at `{target}`");
    };

    let build = &config.build;
    let state = match BuildState::open(&config.root, &build.cache, build.checksum) {
        Ok(state) => Some(state),
        Err(err) => {
            log!("query"; "build state unavailable: {err:#}");
            None
        }
    };

    let output = describe(&pad, &source, state.as_ref());
    let formatted = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{formatted}");
    Ok(())
}

/// Database path first, URL second.
fn lookup(pad: &Pad, target: &str, alt: Option<&str>) -> Result<Option<Source>> {
    match pad.get(target, alt, None, false) {
        Ok(Some(source)) => return Ok(Some(source)),
        Ok(None) => {}
        Err(err) => crate::debug!("query"; "`{target}` is not a database path: {err}"),
    }
    Ok(pad.resolve_url_path(target, true)?)
}

fn describe(pad: &Pad, source: &Source, state: Option<&BuildState>) -> JsonValue {
    let config = pad.config();
    let files: Vec<String> = source
        .source_filenames()
        .iter()
        .filter(|path| path.exists())
        .map(|path| config.root_relative(path).display().to_string())
        .collect();

    let mut obj = Map::new();
    obj.insert("identity".into(), source.identity().into());
    obj.insert("kind".into(), source.kind().into());
    obj.insert("url".into(), source.url_path().as_str().into());
    obj.insert("alt".into(), source.alt().to_string().into());
    obj.insert("hidden".into(), source.is_hidden().into());
    obj.insert("discoverable".into(), source.is_discoverable().into());
    obj.insert("files".into(), files.into());
    if let Some(record) = source.as_record() {
        let fields: Map<String, JsonValue> = record
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), field_json(value)))
            .collect();
        obj.insert("model".into(), record.model.id.clone().into());
        obj.insert("template".into(), record.template.clone().into());
        obj.insert("fields".into(), JsonValue::Object(fields));
    }
    obj.insert(
        "artifacts".into(),
        artifacts_json(&pad.env().programs, pad, source, state),
    );
    JsonValue::Object(obj)
}

fn field_json(value: &FieldValue) -> JsonValue {
    match value {
        FieldValue::Boolean(b) => JsonValue::Bool(*b),
        FieldValue::Integer(n) => json!(n),
        other => JsonValue::String(other.as_text().into_owned()),
    }
}

fn artifacts_json(
    programs: &ProgramRegistry,
    pad: &Pad,
    source: &Source,
    state: Option<&BuildState>,
) -> JsonValue {
    let Some(program) = programs.select(source) else {
        return JsonValue::Array(Vec::new());
    };
    program
        .declare_artifacts(pad)
        .into_iter()
        .map(|spec| {
            let status = match state.and_then(|s| s.get(&spec.name)) {
                Some(record) if record.failed => json!({ "state": ArtifactState::Failed.as_str() }),
                Some(record) => json!({
                    "state": "recorded",
                    "dependencies": record.dependencies.keys().collect::<Vec<_>>(),
                }),
                None => json!({ "state": ArtifactState::Unbuilt.as_str() }),
            };
            let mut obj = Map::new();
            obj.insert("name".into(), spec.name.into());
            obj.insert("url".into(), spec.url.as_str().into());
            if let JsonValue::Object(status) = status {
                obj.extend(status);
            }
            JsonValue::Object(obj)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::NullReporter;
    use crate::testing::TestSite;

    fn site() -> TestSite {
        TestSite::new()
            .file("content/contents.lr", "title: Home")
            .file("content/blog/contents.lr", "title: Blog\n---\ncount: 3")
            .file("models/page.toml", "[fields.count]\ntype = \"integer\"\n")
            .file("templates/page.html", "{{ this.title }}")
    }

    #[test]
    fn test_lookup_by_path_and_url() {
        let site = site();
        let pad = site.pad();
        let by_path = lookup(&pad, "/blog", None).unwrap().unwrap();
        let by_url = lookup(&pad, "/blog/", None).unwrap().unwrap();
        assert_eq!(by_path.identity(), by_url.identity());
        assert!(lookup(&pad, "/nowhere/", None).unwrap().is_none());
    }

    #[test]
    fn test_describe_unbuilt_then_recorded() {
        let site = site();
        {
            let pad = site.pad();
            let source = lookup(&pad, "/blog", None).unwrap().unwrap();
            let out = describe(&pad, &source, None);
            assert_eq!(out["kind"], "record");
            assert_eq!(out["url"], "/blog/");
            assert_eq!(out["fields"]["title"], "Blog");
            assert_eq!(out["fields"]["count"], 3);
            assert_eq!(out["files"], json!(["content/blog/contents.lr"]));
            assert_eq!(out["artifacts"][0]["name"], "blog/index.html");
            assert_eq!(out["artifacts"][0]["state"], "unbuilt");
        }

        let builder = site.builder();
        builder.build_all(&NullReporter).unwrap();
        let pad = builder.pad();
        let source = lookup(pad, "/blog/", None).unwrap().unwrap();
        let out = describe(pad, &source, Some(builder.state()));
        let artifact = &out["artifacts"][0];
        assert_eq!(artifact["state"], "recorded");
        let deps = artifact["dependencies"].as_array().unwrap();
        assert!(deps.iter().any(|d| d == "content/blog/contents.lr"), "{deps:?}");
        assert!(deps.iter().any(|d| d == "templates/page.html"), "{deps:?}");
    }
}
