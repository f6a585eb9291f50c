use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::address::{Alt, MalformedPathError, RecordPath};
use crate::build::recorder::{ActiveArtifact, Recorder};
use crate::db::{DbError, FieldFilter, Pagination, PaginationPage, Source, Thumbnail};
use crate::testing::{TestSite, png};

const ALTS: &str = r#"
[alternates.en]
primary = true
url_prefix = "/"

[alternates.de]
url_prefix = "/de/"
"#;

fn text(source: &Source, field: &str) -> String {
    source
        .as_record()
        .and_then(|r| r.field(field))
        .map(|v| v.as_text().into_owned())
        .unwrap_or_default()
}

fn blog_site(posts: usize) -> TestSite {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/blog/contents.lr", "_model: blog\n---\ntitle: Blog")
        .file(
            "models/blog.toml",
            "[children]\norder_by = [\"-pub_date\"]\n\n[pagination]\nenabled = true\nper_page = 2\n",
        );
    for n in 1..=posts {
        site.write(
            &format!("content/blog/post{n}/contents.lr"),
            &format!("title: Post {n}\n---\npub_date: 2024-01-0{n}"),
        );
    }
    site
}

#[test]
fn test_alt_overlay_falls_back_per_field() {
    let site = TestSite::new()
        .file("folio.toml", ALTS)
        .file("content/contents.lr", "title: Home\n---\ntagline: Hello")
        .file("content/contents+de.lr", "title: Startseite");
    let pad = site.pad();

    let de = pad.get("/", Some("de"), None, true).unwrap().unwrap();
    assert_eq!(text(&de, "title"), "Startseite");
    assert_eq!(text(&de, "tagline"), "Hello");
    assert_eq!(de.url_path().as_str(), "/de/");

    let en = pad.get("/", None, None, true).unwrap().unwrap();
    assert_eq!(text(&en, "title"), "Home");
    assert_eq!(en.alt(), Alt::new("en"));
}

#[test]
fn test_unknown_alt_is_the_default_identity() {
    let site = TestSite::new()
        .file("folio.toml", ALTS)
        .file("content/contents.lr", "title: Home")
        .file("content/blog/contents.lr", "title: Blog");
    let pad = site.pad();

    let a = pad.get("/blog", Some("en"), None, true).unwrap().unwrap();
    let b = pad.get("/blog+en", None, None, true).unwrap().unwrap();
    let c = pad.get("/blog", Some("fr"), None, true).unwrap().unwrap();
    let d = pad.get("/blog/", None, None, true).unwrap().unwrap();
    assert_eq!(a.identity(), b.identity());
    assert_eq!(a.identity(), c.identity());
    assert_eq!(a.identity(), d.identity());

    let de = pad.get("/blog", Some("de"), None, true).unwrap().unwrap();
    assert_ne!(a.identity(), de.identity());
    assert!(pad.get("/blog+de", Some("en"), None, true).is_err());
}

#[test]
fn test_missing_record_and_missing_parent() {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/orphan/child/contents.lr", "title: Child");
    let pad = site.pad();
    assert!(pad.get("/nope", None, None, true).unwrap().is_none());
    assert!(pad.get("/orphan/child", None, None, true).unwrap().is_none());
}

#[test]
fn test_hidden_is_inherited() {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/drafts/contents.lr", "_hidden: yes")
        .file("content/drafts/wip/contents.lr", "title: WIP")
        .file("content/about/contents.lr", "_discoverable: no")
        .file("content/blog/contents.lr", "_model: blog")
        .file("content/blog/secret/contents.lr", "title: Secret")
        .file("models/blog.toml", "[children]\nhidden = true\n");
    let pad = site.pad();

    let wip = pad.get("/drafts/wip", None, None, true).unwrap().unwrap();
    assert!(wip.is_hidden());
    assert!(!wip.is_discoverable());

    let secret = pad.get("/blog/secret", None, None, true).unwrap().unwrap();
    assert!(secret.is_hidden());

    let about = pad.get("/about", None, None, true).unwrap().unwrap();
    assert!(!about.is_hidden());
    assert!(!about.is_discoverable());

    let root = pad.root(&Alt::primary()).unwrap().unwrap();
    let visible = pad.query(root.record_path(), &root.alt).all().unwrap();
    let ids: Vec<_> = visible.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["blog"]);

    let everything = pad
        .query(root.record_path(), &root.alt)
        .include_hidden(true)
        .include_undiscoverable(true)
        .count()
        .unwrap();
    assert_eq!(everything, 3);
}

#[test]
fn test_query_order_and_filter() {
    let site = blog_site(3);
    site.write("content/blog/post2/contents.lr", "title: Post 2\n---\npub_date: 2024-01-02\n---\nfeatured: yes");
    let pad = site.pad();
    let blog = pad
        .get_record(&RecordPath::from_segments(["blog"]), &Alt::primary())
        .unwrap()
        .unwrap();

    let ids: Vec<_> = pad
        .query(blog.record_path(), &blog.alt)
        .all()
        .unwrap()
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, ["post3", "post2", "post1"]);

    let ids: Vec<_> = pad
        .query(blog.record_path(), &blog.alt)
        .order_by(["title"])
        .all()
        .unwrap()
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, ["post1", "post2", "post3"]);

    let featured = pad
        .query(blog.record_path(), &blog.alt)
        .filter(FieldFilter::parse("featured").unwrap())
        .all()
        .unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].id, "post2");
}

#[test]
fn test_pagination_partitions_children() {
    let site = blog_site(5);
    let pad = site.pad();
    let blog = pad.get("/blog", None, None, true).unwrap().unwrap();
    let record = blog.as_record().unwrap();

    let canonical: Pagination = pad.pagination(record, None).unwrap();
    assert_eq!(canonical.pages, 3);
    assert_eq!(canonical.current(), 1);
    assert!(!canonical.has_prev());
    assert_eq!(canonical.next_num(), Some(2));
    assert!(canonical.for_page(0).is_none());
    assert!(canonical.for_page(4).is_none());

    let mut seen = BTreeSet::new();
    let mut total = 0;
    for page in 1..=canonical.pages {
        let items = canonical.for_page(page).unwrap().items(&pad).unwrap();
        total += items.len();
        seen.extend(items.iter().map(|r| r.id.clone()));
    }
    assert_eq!(total, 5);
    assert_eq!(seen.len(), 5);

    // The canonical view and page 1 share a URL.
    assert_eq!(canonical.url_path(), canonical.for_page(1).unwrap().url_path());
    assert_eq!(canonical.page_url(2).as_str(), "/blog/page/2/");

    let page3 = pad.get("/blog", None, Some(3), true).unwrap().unwrap();
    let page3 = page3.as_virtual::<PaginationPage>().unwrap();
    assert_eq!(page3.page, 3);
    assert!(pad.get("/blog", None, Some(4), true).unwrap().is_none());
    assert!(pad.get("/blog@4", None, None, true).unwrap().is_none());
    assert!(pad.get("/blog@2", None, Some(2), true).unwrap().is_some());
    assert!(matches!(
        pad.get("/blog@2", None, Some(3), true),
        Err(DbError::Path(MalformedPathError::ConflictingPage { found: 2, explicit: 3, .. }))
    ));

    // Pages 2..=N hang off the record.
    assert_eq!(blog.virtual_sources(&pad).unwrap().len(), 2);
}

#[test]
fn test_resolve_url_path() {
    let site = blog_site(3)
        .file("content/blog/post1/contents.lr", "title: First\n---\n_slug: articles/first")
        .file("content/blog/post1/notes.txt", "notes")
        .file("assets/static/app.css", "body {}");
    let pad = site.pad();

    let resolve = |url: &str| pad.resolve_url_path(url, true).unwrap().map(|s| s.identity());

    assert_eq!(resolve("/").as_deref(), Some("/+_primary"));
    assert_eq!(resolve("/blog/").as_deref(), Some("/blog+_primary"));
    assert_eq!(
        resolve("/blog/articles/first/").as_deref(),
        Some("/blog/post1+_primary")
    );
    assert_eq!(
        resolve("/blog/articles/first/notes.txt").as_deref(),
        Some("/blog/post1/notes.txt+_primary")
    );
    assert_eq!(resolve("/blog/page/2/").as_deref(), Some("/blog+_primary@2"));
    assert_eq!(resolve("/blog/page/1/"), None);
    assert_eq!(resolve("/blog/page/9/"), None);
    assert_eq!(resolve("/static/app.css").as_deref(), Some("asset:/static/app.css"));
    assert_eq!(resolve("/nowhere/"), None);
}

#[test]
fn test_resolve_url_path_alt_fallback() {
    let site = TestSite::new()
        .file("folio.toml", ALTS)
        .file("content/contents.lr", "title: Home")
        .file("content/blog/contents.lr", "title: Blog");
    let pad = site.pad();

    let de_blog = pad.resolve_url_path("/de/blog/", false).unwrap().unwrap();
    assert_eq!(de_blog.alt(), Alt::new("de"));
    assert_eq!(text(&de_blog, "title"), "Blog");
}

#[test]
fn test_attachment_by_path() {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/blog/contents.lr", "title: Blog")
        .file("content/blog/first/contents.lr", "title: First");
    site.write_bytes("content/blog/first/photo.png", &png(8, 8));
    let pad = site.pad();

    let photo = pad.get("/blog/first/photo.png", None, None, true).unwrap().unwrap();
    assert!(matches!(photo, Source::Attachment(_)));
    assert_eq!(photo.identity(), "/blog/first/photo.png+_primary");
    assert_eq!(photo.url_path().as_str(), "/blog/first/photo.png");

    let again = pad.get_by_identity("/blog/first/photo.png+_primary").unwrap().unwrap();
    assert_eq!(again.identity(), photo.identity());
    assert!(pad.get("/blog/first/missing.png", None, None, true).unwrap().is_none());
}

#[test]
fn test_thumbnails() {
    let site = TestSite::new()
        .file("content/contents.lr", "title: Home")
        .file("content/gallery/contents.lr", "_model: gallery")
        .file("content/gallery/readme.txt", "text")
        .file("models/gallery.toml", "[attachments]\nthumbnails = [16]\n");
    site.write_bytes("content/gallery/photo.png", &png(64, 32));
    let pad = site.pad();

    let gallery = pad.get("/gallery", None, None, true).unwrap().unwrap();
    let record = gallery.as_record().unwrap();
    let attachments = pad.attachments(record).unwrap();
    assert_eq!(attachments.len(), 2);

    let photo = Source::Attachment(attachments[0].clone());
    assert_eq!(photo.identity(), "/gallery/photo.png+_primary");
    let thumbs = photo.virtual_sources(&pad).unwrap();
    assert_eq!(thumbs.len(), 1);
    assert_eq!(thumbs[0].url_path().as_str(), "/gallery/photo@16w.png");
    assert_eq!(thumbs[0].as_virtual::<Thumbnail>().unwrap().width, 16);

    let readme = Source::Attachment(attachments[1].clone());
    assert!(readme.virtual_sources(&pad).unwrap().is_empty());

    let by_path = pad
        .get("/gallery/photo.png@thumb/16", None, None, true)
        .unwrap()
        .unwrap();
    assert_eq!(by_path.identity(), thumbs[0].identity());

    let by_url = pad
        .resolve_url_path("/gallery/photo@16w.png", false)
        .unwrap()
        .unwrap();
    assert_eq!(by_url.identity(), thumbs[0].identity());
    assert!(pad.get("/gallery/readme.txt@thumb/16", None, None, true).unwrap().is_none());
}

#[test]
fn test_lookups_record_dependencies() {
    let site = blog_site(2);
    let pad = site.pad();
    let deps = |pad: &crate::db::Pad| -> BTreeSet<PathBuf> {
        let recorder = Recorder::install(ActiveArtifact::new("blog/index.html", "/blog/")).unwrap();
        pad.get("/blog", None, None, true).unwrap().unwrap();
        recorder.finish()
    };

    let first = deps(&pad);
    assert!(first.contains(&site.path("content/blog/contents.lr")));
    assert!(first.contains(&site.path("content/contents.lr")));
    assert!(first.contains(&site.path("models/blog.toml")));

    // Cache hits record the same files.
    let second = deps(&pad);
    assert!(second.contains(&site.path("content/blog/contents.lr")));
    assert!(second.contains(&site.path("models/blog.toml")));
}

#[test]
fn test_query_records_directory_listing() {
    let site = blog_site(2);
    let pad = site.pad();
    let blog = pad.get("/blog", None, None, true).unwrap().unwrap();
    let record = blog.as_record().unwrap();

    let recorder = Recorder::install(ActiveArtifact::new("blog/index.html", "/blog/")).unwrap();
    pad.query(record.record_path(), &record.alt).all().unwrap();
    let deps = recorder.finish();
    assert!(deps.contains(&site.path("content/blog")));
    assert!(deps.contains(&site.path("content/blog/post1/contents.lr")));
}

#[test]
fn test_flush_bumps_generation() {
    let site = blog_site(1);
    let pad = site.pad();
    let before = pad.generation();
    assert_eq!(text(&pad.get("/", None, None, true).unwrap().unwrap(), "title"), "Home");

    site.write("content/contents.lr", "title: Changed");
    assert_eq!(text(&pad.get("/", None, None, true).unwrap().unwrap(), "title"), "Home");

    pad.flush();
    assert!(pad.generation() > before);
    assert_eq!(text(&pad.get("/", None, None, true).unwrap().unwrap(), "title"), "Changed");
}

#[test]
fn test_get_by_identity_roundtrips() {
    let site = blog_site(3).file("assets/logo.svg", "<svg/>");
    let pad = site.pad();
    for identity in ["/blog+_primary", "/blog+_primary@2", "/blog/post1+_primary", "asset:/logo.svg"] {
        let source = pad.get_by_identity(identity).unwrap().unwrap();
        assert_eq!(source.identity(), identity);
    }
    assert!(pad.get_by_identity("/blog/post9+_primary").unwrap().is_none());
}
