//! Built-in template engine.
//!
//! A small tag language, enough for sites without a plugin engine:
//!
//! ```text
//! {{ this.title }}              escaped unless the value is rendered markup
//! {{ url "/blog" }}             URL of a source or asset, relative to the artifact
//! {% include "header.html" %}
//! {% for post in this.children %}...{% endfor %}
//! {% if not this.pagination.has_next %}...{% else %}...{% endif %}
//! {# comment #}
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use super::{TemplateContext, TemplateEngine, TemplateError, Value};
use crate::address::DbPath;
use crate::build::recorder;
use crate::utils::path::url::is_passthrough_link;

const MAX_INCLUDE_DEPTH: usize = 32;

// ASCII whitespace only: `regex` is built without the Unicode class tables.
static TAG: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{[ \t\r\n]*(.*?)[ \t\r\n]*\}\}|\{%[ \t\r\n]*(.*?)[ \t\r\n]*%\}|\{#.*?#\}")
});

#[derive(Debug, Clone)]
enum Expr {
    Literal(String),
    Path(Vec<String>),
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Print(Expr),
    Url(String),
    Include(String),
    For {
        var: String,
        iter: Expr,
        body: Vec<Node>,
    },
    If {
        cond: Expr,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Reads templates from the site's `templates/` directory.
#[derive(Debug, Clone)]
pub struct BuiltinEngine {
    dir: PathBuf,
}

impl BuiltinEngine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self, name: &str) -> Result<Vec<Node>> {
        let path = self.dir.join(name);
        let text = recorder::read_to_string(&path).map_err(|source| TemplateError::NotFound {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        Ok(parse(name, &text)?)
    }
}

impl TemplateEngine for BuiltinEngine {
    fn name(&self) -> &str {
        "builtin"
    }

    fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> Result<String> {
        let mut out = String::new();
        let mut eval = Evaluator {
            engine: self,
            ctx,
            scope: Vec::new(),
        };
        eval.render_template(template, 0, &mut out)?;
        Ok(out)
    }
}

// ============================================================================
// parsing
// ============================================================================

enum Frame {
    For { var: String, iter: Expr },
    If { cond: Expr, negate: bool, then: Option<Vec<Node>> },
}

fn syntax(name: &str, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        name: name.to_string(),
        message: message.into(),
    }
}

fn parse(name: &str, text: &str) -> Result<Vec<Node>, TemplateError> {
    let mut stack: Vec<(Frame, Vec<Node>)> = Vec::new();
    let mut nodes = Vec::new();
    let mut last = 0;

    // Appends to the innermost open block.
    fn current<'a>(stack: &'a mut [(Frame, Vec<Node>)], root: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
        match stack.last_mut() {
            Some((_, nodes)) => nodes,
            None => root,
        }
    }

    let tag_pattern = TAG
        .as_ref()
        .map_err(|e| syntax(name, format!("tag pattern: {e}")))?;
    for caps in tag_pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            current(&mut stack, &mut nodes).push(Node::Text(text[last..whole.start()].to_string()));
        }
        last = whole.end();

        if let Some(expr) = caps.get(1) {
            let expr = expr.as_str();
            let node = match expr.strip_prefix("url ") {
                Some(target) => Node::Url(parse_literal(name, target.trim())?),
                None => Node::Print(parse_expr(name, expr)?),
            };
            current(&mut stack, &mut nodes).push(node);
            continue;
        }
        let Some(tag) = caps.get(2) else { continue };
        let tag = tag.as_str();
        let (keyword, rest) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
        let rest = rest.trim();

        match keyword {
            "include" => {
                let node = Node::Include(parse_literal(name, rest)?);
                current(&mut stack, &mut nodes).push(node);
            }
            "for" => {
                let Some((var, iter)) = rest.split_once(" in ") else {
                    return Err(syntax(name, format!("expected `for x in expr`, got `{tag}`")));
                };
                let var = var.trim();
                if !is_ident(var) {
                    return Err(syntax(name, format!("invalid loop variable `{var}`")));
                }
                let frame = Frame::For {
                    var: var.to_string(),
                    iter: parse_expr(name, iter)?,
                };
                stack.push((frame, Vec::new()));
            }
            "endfor" => match stack.pop() {
                Some((Frame::For { var, iter }, body)) => {
                    current(&mut stack, &mut nodes).push(Node::For { var, iter, body });
                }
                _ => return Err(syntax(name, "`endfor` without `for`")),
            },
            "if" => {
                let (negate, cond) = match rest.strip_prefix("not ") {
                    Some(cond) => (true, cond),
                    None => (false, rest),
                };
                let frame = Frame::If {
                    cond: parse_expr(name, cond)?,
                    negate,
                    then: None,
                };
                stack.push((frame, Vec::new()));
            }
            "else" => match stack.last_mut() {
                Some((Frame::If { then: then @ None, .. }, body)) => {
                    *then = Some(std::mem::take(body));
                }
                _ => return Err(syntax(name, "`else` outside `if`")),
            },
            "endif" => match stack.pop() {
                Some((Frame::If { cond, negate, then }, body)) => {
                    let (then, otherwise) = match then {
                        Some(then) => (then, body),
                        None => (body, Vec::new()),
                    };
                    current(&mut stack, &mut nodes).push(Node::If {
                        cond,
                        negate,
                        then,
                        otherwise,
                    });
                }
                _ => return Err(syntax(name, "`endif` without `if`")),
            },
            other => return Err(syntax(name, format!("unknown tag `{other}`"))),
        }
    }

    if !stack.is_empty() {
        return Err(syntax(name, "unclosed block at end of template"));
    }
    if last < text.len() {
        nodes.push(Node::Text(text[last..].to_string()));
    }
    Ok(nodes)
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_literal(name: &str, raw: &str) -> Result<String, TemplateError> {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| syntax(name, format!("expected a string literal, got `{raw}`")))
}

fn parse_expr(name: &str, raw: &str) -> Result<Expr, TemplateError> {
    let raw = raw.trim();
    if raw.starts_with('"') {
        return parse_literal(name, raw).map(Expr::Literal);
    }
    let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
    if !segments.iter().all(|s| is_ident(s)) {
        return Err(syntax(name, format!("invalid expression `{raw}`")));
    }
    Ok(Expr::Path(segments))
}

// ============================================================================
// evaluation
// ============================================================================

struct Evaluator<'e, 'c> {
    engine: &'e BuiltinEngine,
    ctx: &'e TemplateContext<'c>,
    scope: Vec<(String, Value)>,
}

impl Evaluator<'_, '_> {
    fn render_template(&mut self, name: &str, depth: usize, out: &mut String) -> Result<()> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(TemplateError::IncludeDepth(name.to_string()).into());
        }
        let nodes = self.engine.load(name)?;
        self.render_nodes(name, &nodes, depth, out)
    }

    fn render_nodes(&mut self, name: &str, nodes: &[Node], depth: usize, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Print(expr) => {
                    let value = self.eval(expr)?;
                    out.push_str(&value.render(self.ctx));
                }
                Node::Url(target) => out.push_str(&self.url(target)?),
                Node::Include(include) => self.render_template(include, depth + 1, out)?,
                Node::For { var, iter, body } => {
                    let items = match self.eval(iter)? {
                        Value::List(items) => items,
                        Value::Null => Vec::new(),
                        _ => {
                            return Err(TemplateError::NotIterable {
                                name: name.to_string(),
                                expr: describe(iter),
                            }
                            .into());
                        }
                    };
                    for item in items {
                        self.scope.push((var.clone(), item));
                        let result = self.render_nodes(name, body, depth, out);
                        self.scope.pop();
                        result?;
                    }
                }
                Node::If {
                    cond,
                    negate,
                    then,
                    otherwise,
                } => {
                    let branch = if self.eval(cond)?.is_truthy() != *negate {
                        then
                    } else {
                        otherwise
                    };
                    self.render_nodes(name, branch, depth, out)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        let segments = match expr {
            Expr::Literal(s) => return Ok(Value::Str(s.clone())),
            Expr::Path(segments) => segments,
        };
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Value::Null);
        };
        let mut value = self
            .scope
            .iter()
            .rev()
            .find(|(var, _)| var == first)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.ctx.global(first));
        for attr in rest {
            value = value.attr(self.ctx, attr)?;
        }
        Ok(value)
    }

    /// Resolve `target` like a link in the current record, falling back to
    /// the asset tree. Assets found this way become dependencies.
    fn url(&self, target: &str) -> Result<String> {
        if is_passthrough_link(target) {
            return Ok(target.to_string());
        }
        let ctx = self.ctx;
        let base = ctx
            .this
            .record()
            .map_or_else(DbPath::root, |record| record.link_base());

        if let Ok(mut path) = base.join(target) {
            if path.alt.is_none() {
                path = path.with_alt_code(Some(ctx.alt.as_str()));
            }
            if let Some(source) = ctx.pad.get_path(&path, true)? {
                return Ok(ctx.relative_url(source.url_path().as_str()));
            }
        }

        if let Some(asset) = ctx.pad.get_asset(target.trim_start_matches('/')) {
            for file in asset.source_filenames() {
                recorder::record(file);
            }
            return Ok(ctx.relative_url(asset.url_path().as_str()));
        }
        Ok(target.to_string())
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Literal(s) => format!("\"{s}\""),
        Expr::Path(segments) => segments.join("."),
    }
}
