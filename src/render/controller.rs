//! Markup renderer controller.
//!
//! One controller per environment. Renderer implementations are not assumed
//! to be thread-safe: with [`RendererSharing::Shared`] one instance is used
//! under a mutex, with [`RendererSharing::PerThread`] every worker thread
//! gets its own instance, created on first use and cached here.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::Mutex;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use serde_json::{Value, json};

use super::RenderError;
use super::context::with_context;
use crate::utils::slug;

/// Rewrites link and image targets during a render.
pub trait LinkRewriter {
    fn rewrite(&self, target: &str) -> Result<String, RenderError>;
}

/// Passes targets through unchanged.
pub struct NoRewrite;

impl LinkRewriter for NoRewrite {
    fn rewrite(&self, target: &str) -> Result<String, RenderError> {
        Ok(target.to_string())
    }
}

/// A markup-to-HTML renderer. Metadata goes into the active render context.
pub trait MarkupRenderer: Send {
    fn render(&mut self, source: &str, links: &dyn LinkRewriter) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RendererSharing {
    #[default]
    Shared,
    PerThread,
}

pub type RendererFactory = Arc<dyn Fn() -> Box<dyn MarkupRenderer> + Send + Sync>;

type Instance = Arc<Mutex<Box<dyn MarkupRenderer>>>;

pub struct MarkupController {
    sharing: RendererSharing,
    factory: RendererFactory,
    shared: Mutex<Option<Instance>>,
    per_thread: DashMap<ThreadId, Instance>,
    created: AtomicUsize,
}

impl MarkupController {
    pub fn new(sharing: RendererSharing, factory: RendererFactory) -> Self {
        Self {
            sharing,
            factory,
            shared: Mutex::new(None),
            per_thread: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Controller over the built-in pulldown-cmark renderer.
    pub fn pulldown(sharing: RendererSharing) -> Self {
        Self::new(sharing, Arc::new(|| Box::new(PulldownRenderer::default())))
    }

    pub fn sharing(&self) -> RendererSharing {
        self.sharing
    }

    /// Number of renderer instances created so far.
    pub fn instances(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn render(&self, source: &str, links: &dyn LinkRewriter) -> Result<String, RenderError> {
        let instance = self.instance();
        let mut renderer = instance.lock();
        renderer.render(source, links)
    }

    fn instance(&self) -> Instance {
        match self.sharing {
            RendererSharing::Shared => {
                let mut shared = self.shared.lock();
                Arc::clone(shared.get_or_insert_with(|| self.create()))
            }
            RendererSharing::PerThread => Arc::clone(
                &self
                    .per_thread
                    .entry(thread::current().id())
                    .or_insert_with(|| self.create()),
            ),
        }
    }

    fn create(&self) -> Instance {
        self.created.fetch_add(1, Ordering::Relaxed);
        Arc::new(Mutex::new((self.factory)()))
    }
}

// ============================================================================
// pulldown-cmark
// ============================================================================

/// CommonMark with tables, footnotes, strikethrough and task lists.
///
/// Collects `headings` (`{level, text, id}`) and resolved `links` into the
/// render metadata and gives every heading an anchor id.
#[derive(Debug, Clone)]
pub struct PulldownRenderer {
    options: Options,
}

impl Default for PulldownRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_HEADING_ATTRIBUTES,
        }
    }
}

impl MarkupRenderer for PulldownRenderer {
    fn render(&mut self, source: &str, links: &dyn LinkRewriter) -> Result<String, RenderError> {
        let mut events: Vec<Event<'_>> = Vec::new();
        let mut resolved_links = Vec::new();

        for event in Parser::new_ext(source, self.options) {
            let event = match event {
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    let url = links.rewrite(&dest_url)?;
                    resolved_links.push(Value::String(url.clone()));
                    Event::Start(Tag::Link {
                        link_type,
                        dest_url: CowStr::from(url),
                        title,
                        id,
                    })
                }
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => Event::Start(Tag::Image {
                    link_type,
                    dest_url: CowStr::from(links.rewrite(&dest_url)?),
                    title,
                    id,
                }),
                other => other,
            };
            events.push(event);
        }

        let headings = anchor_headings(&mut events);

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());

        with_context(|ctx| {
            ctx.meta.insert("headings".into(), Value::Array(headings));
            ctx.meta.insert("links".into(), Value::Array(resolved_links));
        });
        Ok(out)
    }
}

/// Give headings without an explicit id one derived from their text.
fn anchor_headings(events: &mut [Event<'_>]) -> Vec<Value> {
    let mut headings = Vec::new();
    let mut idx = 0;
    while idx < events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[idx] else {
            idx += 1;
            continue;
        };
        let level = *level as usize;

        let mut text = String::new();
        let mut end = idx + 1;
        while end < events.len() && !matches!(events[end], Event::End(TagEnd::Heading(_))) {
            if let Event::Text(t) | Event::Code(t) = &events[end] {
                text.push_str(t);
            }
            end += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[idx] {
            let anchor = id
                .get_or_insert_with(|| CowStr::from(slug::anchor(&text)))
                .to_string();
            headings.push(json!({ "level": level, "text": text, "id": anchor }));
        }
        idx = end + 1;
    }
    headings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Alt, DbPath};
    use crate::db::LinkPolicy;
    use crate::render::context::{RenderContext, RenderGuard};
    use serde_json::Map;

    struct Upper;

    impl LinkRewriter for Upper {
        fn rewrite(&self, target: &str) -> Result<String, RenderError> {
            Ok(target.to_uppercase())
        }
    }

    fn guard() -> RenderGuard {
        RenderGuard::install(RenderContext {
            record: DbPath::root(),
            alt: Alt::primary(),
            base_url: "/".into(),
            policy: LinkPolicy::Auto,
            meta: Map::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_pulldown_rewrites_and_collects() {
        let guard = guard();
        let mut renderer = PulldownRenderer::default();
        let html = renderer
            .render("# Hello World\n\n[x](a/b) ![i](pic.png)\n\n## Next {#custom}\n", &Upper)
            .unwrap();
        let ctx = guard.finish().unwrap();

        assert!(html.contains(r#"<h1 id="hello-world">Hello World</h1>"#), "{html}");
        assert!(html.contains(r#"<a href="A/B">"#));
        assert!(html.contains(r#"src="PIC.PNG""#));
        assert!(html.contains(r#"id="custom""#));
        assert_eq!(ctx.meta["links"], json!(["A/B"]));
        assert_eq!(ctx.meta["headings"][0]["id"], "hello-world");
        assert_eq!(ctx.meta["headings"][1]["level"], 2);
    }

    #[test]
    fn test_shared_uses_one_instance() {
        let controller = Arc::new(MarkupController::pulldown(RendererSharing::Shared));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || controller.render("*x*", &NoRewrite).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().contains("<em>x</em>"));
        }
        assert_eq!(controller.instances(), 1);
    }

    #[test]
    fn test_per_thread_instances() {
        let controller = Arc::new(MarkupController::pulldown(RendererSharing::PerThread));
        controller.render("a", &NoRewrite).unwrap();
        controller.render("b", &NoRewrite).unwrap();
        assert_eq!(controller.instances(), 1);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || {
                    controller.render("c", &NoRewrite).unwrap();
                    controller.render("d", &NoRewrite).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(controller.instances(), 3);
    }
}
