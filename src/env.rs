//! The per-site environment.
//!
//! Holds everything that outlives a single pass over the source graph:
//! configuration, address space, template engine, markup controller, build
//! program registry, virtual-source resolvers and hooks. Pads borrow it via
//! `Arc`.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::address::AddressSpace;
use crate::build::program::{BuildProgram, ProgramRegistry};
use crate::config::SiteConfig;
use crate::db::{Source, THUMB_PREFIX, ThumbnailResolver, VirtualResolver};
use crate::hooks::{Hook, HookBus, HookRegistry};
use crate::render::{MarkupController, MarkupRenderer, RendererSharing};
use crate::template::{BuiltinEngine, TemplateEngine};

pub struct Environment {
    pub config: SiteConfig,
    pub space: AddressSpace,
    pub templates: Box<dyn TemplateEngine>,
    pub markup: MarkupController,
    pub programs: ProgramRegistry,
    pub virtuals: FxHashMap<String, Arc<dyn VirtualResolver>>,
    pub hooks: Box<dyn HookBus>,
    config_hash: String,
}

impl Environment {
    /// Environment with the built-in engine, renderer and programs.
    pub fn new(config: SiteConfig) -> Arc<Self> {
        EnvironmentBuilder::new(config).build()
    }

    pub fn builder(config: SiteConfig) -> EnvironmentBuilder {
        EnvironmentBuilder::new(config)
    }

    /// Hash of the site configuration; part of every artifact's state.
    #[inline]
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }
}

pub struct EnvironmentBuilder {
    config: SiteConfig,
    templates: Option<Box<dyn TemplateEngine>>,
    markup: Option<MarkupController>,
    programs: ProgramRegistry,
    virtuals: FxHashMap<String, Arc<dyn VirtualResolver>>,
    hooks: HookRegistry,
}

impl EnvironmentBuilder {
    pub fn new(config: SiteConfig) -> Self {
        let mut virtuals: FxHashMap<String, Arc<dyn VirtualResolver>> = FxHashMap::default();
        virtuals.insert(THUMB_PREFIX.to_string(), Arc::new(ThumbnailResolver));
        Self {
            config,
            templates: None,
            markup: None,
            programs: ProgramRegistry::with_builtins(),
            virtuals,
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_template_engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.templates = Some(Box::new(engine));
        self
    }

    pub fn with_renderer<F>(mut self, sharing: RendererSharing, factory: F) -> Self
    where
        F: Fn() -> Box<dyn MarkupRenderer> + Send + Sync + 'static,
    {
        self.markup = Some(MarkupController::new(sharing, Arc::new(factory)));
        self
    }

    /// Register a build program. Plugins are tried before the built-ins,
    /// in registration order.
    pub fn register_program<P, F>(mut self, predicate: P, factory: F) -> Self
    where
        P: Fn(&Source) -> bool + Send + Sync + 'static,
        F: Fn(&Source) -> Box<dyn BuildProgram> + Send + Sync + 'static,
    {
        self.programs.register(predicate, factory);
        self
    }

    /// Register a resolver for `@<prefix>/...` virtual paths.
    pub fn register_virtual(mut self, prefix: &str, resolver: impl VirtualResolver + 'static) -> Self {
        self.virtuals.insert(prefix.to_string(), Arc::new(resolver));
        self
    }

    pub fn register_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn build(self) -> Arc<Environment> {
        let space = AddressSpace::from_config(&self.config);
        let config_hash = self.config.config_hash();
        let templates = self
            .templates
            .unwrap_or_else(|| Box::new(BuiltinEngine::new(&self.config.build.templates)));
        let markup = self
            .markup
            .unwrap_or_else(|| MarkupController::pulldown(RendererSharing::Shared));

        Arc::new(Environment {
            config: self.config,
            space,
            templates,
            markup,
            programs: self.programs,
            virtuals: self.virtuals,
            hooks: Box::new(self.hooks),
            config_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FieldValue, Pad};
    use crate::render::{LinkRewriter, RenderError};
    use crate::template::{TemplateContext, Value};
    use crate::testing::TestSite;
    use anyhow::Result;

    struct Greeter;

    impl TemplateEngine for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> Result<String> {
            let title = ctx.global("this").attr(ctx, "title")?;
            let greeting = ctx.global("greeting");
            Ok(format!("{template}: {} {}", greeting.render(ctx), title.render(ctx)))
        }
    }

    struct Shout;

    impl MarkupRenderer for Shout {
        fn render(&mut self, source: &str, _links: &dyn LinkRewriter) -> Result<String, RenderError> {
            Ok(source.trim().to_uppercase())
        }
    }

    /// `@self/...` resolves to the owner.
    struct Itself;

    impl VirtualResolver for Itself {
        fn resolve(&self, _pad: &Pad, owner: &Source, _rest: &str) -> Result<Option<Source>, crate::db::DbError> {
            Ok(Some(owner.clone()))
        }
    }

    fn site() -> TestSite {
        TestSite::new()
            .file("content/contents.lr", "title: Home")
            .file("content/notes/contents.lr", "title: Notes\n---\nbody: quiet words")
            .file("models/page.toml", "[model]\nname = \"Page\"\n\n[fields.body]\ntype = \"markdown\"\n")
    }

    #[test]
    fn test_custom_template_engine() {
        let site = site();
        let env = Environment::builder(site.config())
            .with_template_engine(Greeter)
            .build();
        let pad = Pad::new(env);
        let notes = pad.get("/notes", None, None, false).unwrap().unwrap();

        let ctx = TemplateContext::new(&pad, notes, "/notes/").with_var("greeting", Value::Str("hi".into()));
        let out = pad.env().templates.render("page.html", &ctx).unwrap();
        assert_eq!(out, "page.html: hi Notes");
        assert_eq!(pad.env().templates.name(), "greeter");

        let model = ctx.global("this").attr(&ctx, "model_name").unwrap();
        assert_eq!(model.render(&ctx), "Page");
    }

    #[test]
    fn test_custom_renderer() {
        let site = site();
        let env = Environment::builder(site.config())
            .with_renderer(RendererSharing::PerThread, || {
                Box::new(Shout) as Box<dyn MarkupRenderer>
            })
            .build();
        assert_eq!(env.markup.sharing(), RendererSharing::PerThread);

        let pad = Pad::new(env);
        let notes = pad.get("/notes", None, None, false).unwrap().unwrap();
        let record = notes.as_record().unwrap();
        let Some(FieldValue::Markdown(body)) = record.field("body") else {
            panic!("body is not markdown");
        };
        let result = body.render(&pad, record).unwrap();
        assert!(result.html.contains("QUIET WORDS"), "{}", result.html);
        assert_eq!(pad.env().markup.instances(), 1);
    }

    #[test]
    fn test_registered_virtual_resolver() {
        let site = site();
        let pad = Pad::new(site.env());
        assert!(pad.get("/notes@self/x", None, None, false).unwrap().is_none());

        let env = Environment::builder(site.config())
            .register_virtual("self", Itself)
            .build();
        let pad = Pad::new(env);
        let found = pad.get("/notes@self/x", None, None, false).unwrap().unwrap();
        assert_eq!(found.identity(), "/notes+_primary");
    }
}
