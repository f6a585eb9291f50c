//! Values visible to templates.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use super::TemplateContext;
use crate::address::make_relative_url;
use crate::db::{FieldLookup, FieldValue, Pagination, PaginationPage, Record, Source};
use crate::utils::html;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    /// Markup that is already HTML; printed without escaping.
    Html(String),
    Bool(bool),
    Int(i64),
    List(Vec<Value>),
    Source(Source),
    Pagination(Arc<Pagination>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Str(s) | Self::Html(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Source(_) | Self::Pagination(_) => true,
        }
    }

    /// Output form; strings are HTML-escaped, sources print their URL.
    pub fn render(&self, ctx: &TemplateContext<'_>) -> String {
        match self {
            Self::Null | Self::Map(_) | Self::Pagination(_) => String::new(),
            Self::Str(s) => html::escape(s).into_owned(),
            Self::Html(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::List(items) => items.iter().map(|v| v.render(ctx)).collect(),
            Self::Source(source) => {
                html::escape(&ctx.relative_url(source.url_path().as_str())).into_owned()
            }
        }
    }

    /// `value.name`. Missing attributes are `Null`.
    pub fn attr(&self, ctx: &TemplateContext<'_>, name: &str) -> Result<Value> {
        match self {
            Self::Map(map) => Ok(map.get(name).cloned().unwrap_or_default()),
            Self::Source(source) => source_attr(ctx, source, name),
            Self::Pagination(pagination) => pagination_attr(ctx, pagination, name),
            Self::List(items) => Ok(match name {
                "length" => Value::Int(items.len() as i64),
                "first" => items.first().cloned().unwrap_or_default(),
                "last" => items.last().cloned().unwrap_or_default(),
                _ => Value::Null,
            }),
            _ => Ok(Value::Null),
        }
    }

    pub fn field(ctx: &TemplateContext<'_>, record: &Record, value: FieldValue) -> Result<Value> {
        Ok(match value {
            FieldValue::Text(s) => Value::Str(s),
            FieldValue::Boolean(b) => Value::Bool(b),
            FieldValue::Integer(i) => Value::Int(i),
            FieldValue::Markdown(md) => Value::Html(md.render(ctx.pad, record)?.html.clone()),
        })
    }
}

fn records(records: Vec<Arc<Record>>) -> Value {
    Value::List(records.into_iter().map(|r| Value::Source(Source::Record(r))).collect())
}

fn source_attr(ctx: &TemplateContext<'_>, source: &Source, name: &str) -> Result<Value> {
    let pad = ctx.pad;
    match name {
        "url" => return Ok(Value::Str(ctx.relative_url(source.url_path().as_str()))),
        "url_path" => return Ok(Value::Str(source.url_path().to_string())),
        "path" => return Ok(Value::Str(source.identity())),
        "alt" => return Ok(Value::Str(source.alt().to_string())),
        "kind" => return Ok(Value::Str(source.kind().to_string())),
        "is_hidden" => return Ok(Value::Bool(source.is_hidden())),
        "is_discoverable" => return Ok(Value::Bool(source.is_discoverable())),
        "parent" => return Ok(source.parent().map(Value::Source).unwrap_or_default()),
        _ => {}
    }

    match source {
        Source::Record(record) => match name {
            "id" => Ok(Value::Str(record.id.clone())),
            "slug" => Ok(Value::Str(record.slug.clone())),
            "model" => Ok(Value::Str(record.model.id.clone())),
            "model_name" => Ok(Value::Str(record.model.display_name().to_string())),
            "children" => Ok(records(pad.query(record.record_path(), &record.alt).all()?)),
            "attachments" => Ok(Value::List(
                pad.attachments(record)?
                    .into_iter()
                    .filter(|a| !a.hidden)
                    .map(|a| Value::Source(Source::Attachment(a)))
                    .collect(),
            )),
            "pagination" if record.model.paginated() => {
                Ok(Value::Pagination(Arc::new(pad.pagination(record, None)?)))
            }
            _ => match record.lookup(name) {
                Some(value) => Value::field(ctx, record, value),
                None => Ok(Value::Null),
            },
        },
        Source::Attachment(attachment) => match name {
            "filename" => Ok(Value::Str(attachment.filename.clone())),
            "record" => Ok(Value::Source(Source::Record(Arc::clone(&attachment.record)))),
            "is_image" => Ok(Value::Bool(attachment.is_image())),
            _ => Ok(attachment
                .lookup(name)
                .map(|v| Value::Str(v.as_text().into_owned()))
                .unwrap_or_default()),
        },
        Source::Asset(asset) => match name {
            "name" => Ok(Value::Str(asset.rel.rsplit('/').next().unwrap_or("").to_string())),
            _ => Ok(Value::Null),
        },
        Source::Virtual(_) => {
            // Pages of a paginated record look like the record with their
            // own pagination view.
            if let Some(page) = source.as_virtual::<PaginationPage>() {
                if name == "pagination" {
                    let pagination = pad.pagination(&page.record, Some(page.page))?;
                    return Ok(Value::Pagination(Arc::new(pagination)));
                }
                return source_attr(ctx, &Source::Record(Arc::clone(&page.record)), name);
            }
            Ok(match name {
                "record" => source.record().map(|r| Value::Source(Source::Record(r))).unwrap_or_default(),
                _ => Value::Null,
            })
        }
    }
}

fn pagination_attr(ctx: &TemplateContext<'_>, pagination: &Pagination, name: &str) -> Result<Value> {
    let num = |n: Option<u32>| n.map_or(Value::Null, |n| Value::Int(n.into()));
    let view = |p: Option<Pagination>| p.map_or(Value::Null, |p| Value::Pagination(Arc::new(p)));
    Ok(match name {
        "items" => records(pagination.items(ctx.pad)?),
        "page" => Value::Int(pagination.current().into()),
        "pages" => Value::Int(pagination.pages.into()),
        "total" => Value::Int(pagination.total as i64),
        "per_page" => Value::Int(pagination.per_page.into()),
        "has_prev" => Value::Bool(pagination.has_prev()),
        "has_next" => Value::Bool(pagination.has_next()),
        "prev_num" => num(pagination.prev_num()),
        "next_num" => num(pagination.next_num()),
        "prev" => view(pagination.prev()),
        "next" => view(pagination.next()),
        "url" => Value::Str(ctx.relative_url(pagination.url_path().as_str())),
        "url_path" => Value::Str(pagination.url_path().to_string()),
        "record" => Value::Source(Source::Record(Arc::clone(&pagination.record))),
        _ => Value::Null,
    })
}

impl TemplateContext<'_> {
    /// `target` relative to the artifact being rendered.
    pub fn relative_url(&self, target: &str) -> String {
        make_relative_url(&self.base_url, target)
    }
}
