use anyhow::Result;

use super::program::{BuildProgram, PageProgram};
use super::recorder::{ActiveArtifact, Recorder};
use super::{
    ArtifactSpec, ArtifactState, BufferReporter, BuildContext, BuildError, BuildEvent, Builder,
    NullReporter,
};
use crate::db::{DbError, Pad, Source};
use crate::env::Environment;
use crate::testing::{TestSite, png};

const PAGE: &str = "<h1>{{ this.title }}</h1>\
    {% for child in this.children %}<a href=\"{{ child.url }}\">{{ child.title }}</a>{% endfor %}";
const BLOG: &str = "<h1>{{ this.title }}</h1>\
    {% for post in this.children %}<li>{{ post.title }}</li>{% endfor %}";

fn site() -> TestSite {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/blog/contents.lr", "_model: blog\n---\ntitle: Blog")
        .file("content/blog/first/contents.lr", "title: First")
        .file("content/blog/second/contents.lr", "title: Second")
        .file("models/blog.toml", "[children]\norder_by = [\"title\"]\n")
        .file("templates/page.html", PAGE)
        .file("templates/blog.html", BLOG)
        .file("assets/style.css", "body {}");
    site.write_bytes("content/blog/first/photo.png", &png(4, 4));
    site
}

const ALL: [&str; 6] = [
    "blog/first/index.html",
    "blog/first/photo.png",
    "blog/index.html",
    "blog/second/index.html",
    "index.html",
    "style.css",
];

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

// ============================================================================
// incremental builds
// ============================================================================

#[test]
fn test_full_build_writes_every_artifact() {
    let site = site();
    let builder = site.builder();
    let reporter = BufferReporter::new();
    let summary = builder.build_all(&reporter).unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.built, ALL.len());
    assert_eq!(sorted(reporter.artifacts_in(ArtifactState::Built)), ALL);

    assert_eq!(site.output("index.html").unwrap(), r#"<h1>Home</h1><a href="blog/">Blog</a>"#);
    assert_eq!(
        site.output("blog/index.html").unwrap(),
        "<h1>Blog</h1><li>First</li><li>Second</li>"
    );
    assert_eq!(site.output("style.css").unwrap(), "body {}");
    assert!(site.path("public/blog/first/photo.png").is_file());
    assert_eq!(builder.state().len(), ALL.len());
}

#[test]
fn test_second_build_is_all_current() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    let reporter = BufferReporter::new();
    let summary = builder.build_all(&reporter).unwrap();
    assert_eq!(summary.built, 0);
    assert_eq!(summary.current, ALL.len());
    assert!(!reporter.events().iter().any(|e| matches!(e, BuildEvent::BuildFunc(_))));

    // State survives a restart.
    drop(builder);
    let summary = site.builder().build_all(&NullReporter).unwrap();
    assert_eq!(summary.built, 0);
    assert_eq!(summary.current, ALL.len());
}

#[test]
fn test_content_change_rebuilds_dependents() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    site.write("content/blog/second/contents.lr", "title: Zweite");
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();

    // The blog index lists the child titles; the home page does not.
    assert_eq!(
        sorted(reporter.artifacts_in(ArtifactState::Built)),
        ["blog/index.html", "blog/second/index.html"]
    );
    assert_eq!(
        site.output("blog/index.html").unwrap(),
        "<h1>Blog</h1><li>First</li><li>Zweite</li>"
    );
}

#[test]
fn test_template_change_rebuilds_its_users() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    site.write("templates/page.html", "<p>{{ this.title }}</p>");
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();

    assert_eq!(
        sorted(reporter.artifacts_in(ArtifactState::Built)),
        ["blog/first/index.html", "blog/second/index.html", "index.html"]
    );
    assert_eq!(site.output("index.html").unwrap(), "<p>Home</p>");
}

#[test]
fn test_new_child_rebuilds_listing() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    site.write("content/blog/third/contents.lr", "title: Third");
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();
    assert_eq!(
        sorted(reporter.artifacts_in(ArtifactState::Built)),
        ["blog/index.html", "blog/third/index.html"]
    );
}

#[test]
fn test_missing_output_is_rebuilt() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    site.remove("public/style.css");
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();
    assert_eq!(reporter.artifacts_in(ArtifactState::Built), ["style.css"]);
}

#[test]
fn test_config_change_rebuilds_everything() {
    let site = site();
    site.builder().build_all(&NullReporter).unwrap();

    site.write("folio.toml", "[site]\nname = \"Renamed\"\n");
    let summary = site.builder().build_all(&NullReporter).unwrap();
    assert_eq!(summary.built, ALL.len());
}

#[test]
fn test_pagination_pages_are_artifacts() {
    let site = site()
        .file(
            "models/blog.toml",
            "[children]\norder_by = [\"title\"]\n\n[pagination]\nenabled = true\nper_page = 1\n",
        )
        .file(
            "templates/blog.html",
            "{% for post in this.pagination.items %}{{ post.title }}{% endfor %}\
             {% if this.pagination.has_next %} next{% endif %}",
        );
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    assert_eq!(site.output("blog/index.html").unwrap(), "First next");
    assert_eq!(site.output("blog/page/2/index.html").unwrap(), "Second");
    assert!(site.output("blog/page/1/index.html").is_none());
}

// ============================================================================
// prune & clean
// ============================================================================

#[test]
fn test_prune_removes_hidden_and_deleted() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    site.write("content/blog/second/contents.lr", "title: Second\n---\n_hidden: yes");
    site.remove("content/blog/first/photo.png");
    builder.build_all(&NullReporter).unwrap();

    let reporter = BufferReporter::new();
    let summary = builder.prune(false, &reporter).unwrap();
    assert_eq!(
        sorted(summary.removed),
        ["blog/first/photo.png", "blog/second/index.html"]
    );
    assert!(!site.path("public/blog/second").exists());
    assert!(site.output("blog/first/index.html").is_some());
    assert!(!builder.state().contains("blog/second/index.html"));
    assert_eq!(
        reporter.events().first(),
        Some(&BuildEvent::StartBuild("prune".into()))
    );

    // Nothing left to do.
    assert!(builder.prune(false, &NullReporter).unwrap().removed.is_empty());
}

#[test]
fn test_prune_without_a_pass_checks_sources() {
    let site = site();
    site.builder().build_all(&NullReporter).unwrap();
    site.remove("content/blog/second");

    // A fresh builder has visited nothing; staleness comes from the sources.
    let builder = site.builder();
    let summary = builder.prune(false, &NullReporter).unwrap();
    assert_eq!(summary.removed, ["blog/second/index.html"]);
    assert!(site.output("blog/index.html").is_some());
}

#[test]
fn test_prune_keeps_attachments_of_live_records() {
    let site = site();
    site.builder().build_all(&NullReporter).unwrap();

    let summary = site.builder().prune(false, &NullReporter).unwrap();
    assert!(summary.removed.is_empty(), "{:?}", summary.removed);
    assert!(site.path("public/blog/first/photo.png").is_file());
}

#[test]
fn test_prune_aborts_on_lookup_error() {
    let site = site();
    site.builder().build_all(&NullReporter).unwrap();
    site.write("models/blog.toml", "[children\n");

    let err = site.builder().prune(false, &NullReporter).unwrap_err();
    assert!(matches!(err, BuildError::Lookup { .. }), "{err:?}");
    for name in ALL {
        assert!(site.path("public").join(name).is_file(), "{name} was pruned");
    }
}

#[test]
fn test_prune_all_forgets_state() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();
    builder.prune(true, &NullReporter).unwrap();

    assert!(builder.state().is_empty());
    assert!(site.output("index.html").is_some());
    // Without state everything is stale again.
    assert_eq!(builder.build_all(&NullReporter).unwrap().built, ALL.len());
}

#[test]
fn test_clean_removes_everything() {
    let site = site();
    let builder = site.builder();
    builder.build_all(&NullReporter).unwrap();

    assert_eq!(builder.clean(&NullReporter).unwrap(), ALL.len());
    assert!(builder.state().is_empty());
    for name in ALL {
        assert!(site.output(name).is_none(), "{name} survived clean");
    }
    assert!(!site.path("public/blog").exists());
}

// ============================================================================
// failures
// ============================================================================

#[test]
fn test_failure_is_isolated_and_retried() {
    let site = site().file(
        "content/blog/second/contents.lr",
        "title: Second\n---\n_template: missing.html",
    );
    let builder = site.builder();
    let reporter = BufferReporter::new();
    let summary = builder.build_all(&reporter).unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.built, ALL.len() - 1);
    let [failure] = summary.failed_artifacts.as_slice() else {
        panic!("expected one failure, got {:?}", summary.failed_artifacts);
    };
    assert_eq!(failure.artifact, "blog/second/index.html");
    assert_eq!(failure.source_id, "/blog/second+_primary");
    assert!(failure.detail().contains("missing.html"), "{}", failure.detail());
    assert_eq!(
        reporter.artifacts_in(ArtifactState::Failed),
        ["blog/second/index.html"]
    );
    assert_eq!(builder.state().failed_artifacts(), ["blog/second/index.html"]);
    assert!(site.output("blog/second/index.html").is_none());

    // Failed artifacts are never current.
    let summary = builder.build_all(&NullReporter).unwrap();
    assert_eq!(summary.failed_artifacts.len(), 1);
    assert_eq!(summary.built, 0);

    site.write("templates/missing.html", "{{ this.title }}");
    let summary = builder.build_all(&NullReporter).unwrap();
    assert!(summary.is_success());
    assert_eq!(site.output("blog/second/index.html").unwrap(), "Second");
    assert!(builder.state().failed_artifacts().is_empty());
}

#[test]
fn test_failed_write_leaves_no_partial_output() {
    let site = site().file("templates/blog.html", "{% for x in this.title %}{% endfor %}");
    let builder = site.builder();
    let summary = builder.build_all(&NullReporter).unwrap();
    assert_eq!(summary.failed_artifacts.len(), 1);
    assert!(site.output("blog/index.html").is_none());
    assert!(!site.path("public/blog/.index.html.folio-tmp").exists());
}

/// Tries to open a second recorder while the builder's is active.
struct Nested(Source);

impl BuildProgram for Nested {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn source(&self) -> &Source {
        &self.0
    }

    fn declare_artifacts(&self, _pad: &Pad) -> Vec<ArtifactSpec> {
        vec![ArtifactSpec::for_url(&self.0.url_path())]
    }

    fn build_artifact(&self, _pad: &Pad, _artifact: &ArtifactSpec, _ctx: &mut BuildContext) -> Result<()> {
        let _inner = Recorder::install(ActiveArtifact::new("inner", "/"))?;
        Ok(())
    }

    fn child_sources(&self, _pad: &Pad) -> Result<Vec<Source>, DbError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_reentrant_recording_aborts_the_pass() {
    let site = site();
    let env = Environment::builder(site.config())
        .register_program(
            |s| s.as_record().is_some_and(|r| r.is_root()),
            |s| Box::new(Nested(s.clone())),
        )
        .build();
    let builder = Builder::new(env).unwrap();
    let err = builder.build_all(&NullReporter).unwrap_err();
    assert!(matches!(err, BuildError::Reentrant(_)), "{err:?}");
    assert!(!super::recorder::is_recording());
}

// ============================================================================
// reporting, thumbnails, plugins
// ============================================================================

#[test]
fn test_reporter_brackets() {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("templates/page.html", "{{ this.title }}");
    let builder = site.builder();
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();

    let source = "/+_primary".to_string();
    let start = |is_current| BuildEvent::StartArtifact {
        artifact: "index.html".into(),
        is_current,
    };
    let finish = |state| BuildEvent::FinishArtifact {
        artifact: "index.html".into(),
        state,
    };
    let state = |state| BuildEvent::State {
        artifact: "index.html".into(),
        state,
    };
    assert_eq!(
        reporter.events(),
        [
            BuildEvent::StartBuild("build".into()),
            BuildEvent::EnterSource(source.clone()),
            state(ArtifactState::Checking),
            start(false),
            state(ArtifactState::Building),
            BuildEvent::BuildFunc("page".into()),
            finish(ArtifactState::Built),
            BuildEvent::LeaveSource(source.clone()),
            BuildEvent::FinishBuild("build".into()),
        ]
    );

    reporter.clear();
    builder.build_all(&reporter).unwrap();
    assert_eq!(
        reporter.events(),
        [
            BuildEvent::StartBuild("build".into()),
            BuildEvent::EnterSource(source.clone()),
            state(ArtifactState::Checking),
            start(true),
            finish(ArtifactState::Current),
            BuildEvent::LeaveSource(source),
            BuildEvent::FinishBuild("build".into()),
        ]
    );
}

#[test]
fn test_thumbnails_are_extra_artifacts() {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/gallery/contents.lr", "_model: gallery")
        .file("models/gallery.toml", "[attachments]\nthumbnails = [16]\n")
        .file("templates/page.html", "{{ this.title }}")
        .file("templates/gallery.html", "gallery");
    site.write_bytes("content/gallery/wide.png", &png(64, 32));
    site.write_bytes("content/gallery/tiny.png", &png(8, 8));

    let builder = site.builder();
    let summary = builder.build_all(&NullReporter).unwrap();
    assert!(summary.is_success(), "{:?}", summary.failed_artifacts);

    let wide = image::open(site.path("public/gallery/wide@16w.png")).unwrap();
    assert_eq!((wide.width(), wide.height()), (16, 8));
    // Never upscaled.
    let tiny = image::open(site.path("public/gallery/tiny@16w.png")).unwrap();
    assert_eq!((tiny.width(), tiny.height()), (8, 8));
    assert!(site.path("public/gallery/wide.png").is_file());

    // Replacing the original rebuilds its thumbnail.
    site.write_bytes("content/gallery/wide.png", &png(32, 32));
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();
    assert_eq!(
        sorted(reporter.artifacts_in(ArtifactState::Built)),
        ["gallery/wide.png", "gallery/wide@16w.png"]
    );
    let wide = image::open(site.path("public/gallery/wide@16w.png")).unwrap();
    assert_eq!((wide.width(), wide.height()), (16, 16));
}

/// Writes a fixed body but keeps the page program's children.
struct Stamp(Source);

impl BuildProgram for Stamp {
    fn name(&self) -> &'static str {
        "stamp"
    }

    fn source(&self) -> &Source {
        &self.0
    }

    fn declare_artifacts(&self, _pad: &Pad) -> Vec<ArtifactSpec> {
        vec![ArtifactSpec::for_url(&self.0.url_path())]
    }

    fn build_artifact(&self, _pad: &Pad, _artifact: &ArtifactSpec, ctx: &mut BuildContext) -> Result<()> {
        ctx.write_str("stamped")?;
        Ok(())
    }

    fn child_sources(&self, pad: &Pad) -> Result<Vec<Source>, DbError> {
        PageProgram::new(self.0.clone()).child_sources(pad)
    }
}

#[test]
fn test_plugin_programs_take_precedence() {
    let site = site();
    let env = Environment::builder(site.config())
        .register_program(
            |s| s.as_record().is_some_and(|r| r.id == "blog"),
            |s| Box::new(Stamp(s.clone())),
        )
        .build();
    let builder = Builder::new(env).unwrap();
    let reporter = BufferReporter::new();
    builder.build_all(&reporter).unwrap();

    assert_eq!(site.output("blog/index.html").unwrap(), "stamped");
    assert_eq!(site.output("blog/first/index.html").unwrap(), "<h1>First</h1>");
    assert!(reporter.events().contains(&BuildEvent::BuildFunc("stamp".into())));
}
