//! Typed field values, filters and ordering keys.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::Arc;

use super::model::{FieldSpec, FieldType};
use crate::address::{Alt, DbPath};
use crate::render::Markdown;

/// A field value after model-driven conversion.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Boolean(bool),
    Integer(i64),
    Markdown(Arc<Markdown>),
}

impl FieldValue {
    /// Convert a raw content-file value according to its field spec.
    ///
    /// Values that do not parse as their declared type are kept as text.
    pub fn from_raw(spec: &FieldSpec, raw: &str, owner: &DbPath, alt: &Alt) -> Self {
        match spec.kind {
            FieldType::String => Self::Text(raw.lines().next().unwrap_or("").trim().to_string()),
            FieldType::Text => Self::Text(raw.to_string()),
            FieldType::Boolean => parse_bool(raw).map_or_else(|| Self::Text(raw.into()), Self::Boolean),
            FieldType::Integer => raw
                .trim()
                .parse()
                .map_or_else(|_| Self::Text(raw.into()), Self::Integer),
            FieldType::Markdown => Self::Markdown(Arc::new(Markdown::new(
                raw,
                owner.clone(),
                alt.clone(),
                spec.resolve_links,
            ))),
        }
    }

    /// Plain text form; markdown yields its source.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Boolean(b) => Cow::Owned(b.to_string()),
            Self::Integer(i) => Cow::Owned(i.to_string()),
            Self::Markdown(md) => Cow::Borrowed(md.source()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Text(s) => !s.is_empty() && parse_bool(s) != Some(false),
            Self::Markdown(md) => !md.source().trim().is_empty(),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            _ => self.as_text().cmp(&other.as_text()),
        }
    }
}

/// `yes/no/true/false/1/0/on/off`, case-insensitive.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Anything a filter or ordering key can look fields up on.
pub trait FieldLookup {
    fn lookup(&self, name: &str) -> Option<FieldValue>;
}

// ============================================================================
// filters
// ============================================================================

/// Child filter: `field == value`, `field != value`, `field` or `!field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    Eq(String, String),
    Ne(String, String),
    Truthy(String),
    Falsy(String),
}

impl FieldFilter {
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }
        if let Some((field, value)) = expr.split_once("!=") {
            return Some(Self::Ne(field.trim().into(), unquote(value)));
        }
        if let Some((field, value)) = expr.split_once("==") {
            return Some(Self::Eq(field.trim().into(), unquote(value)));
        }
        match expr.strip_prefix('!') {
            Some(field) => Some(Self::Falsy(field.trim().into())),
            None => Some(Self::Truthy(expr.into())),
        }
    }

    pub fn matches(&self, item: &impl FieldLookup) -> bool {
        match self {
            Self::Eq(field, value) => item
                .lookup(field)
                .is_some_and(|v| value_eq(&v, value)),
            Self::Ne(field, value) => !item
                .lookup(field)
                .is_some_and(|v| value_eq(&v, value)),
            Self::Truthy(field) => item.lookup(field).is_some_and(|v| v.is_truthy()),
            Self::Falsy(field) => !item.lookup(field).is_some_and(|v| v.is_truthy()),
        }
    }
}

fn value_eq(value: &FieldValue, literal: &str) -> bool {
    match value {
        FieldValue::Boolean(b) => parse_bool(literal) == Some(*b),
        FieldValue::Integer(i) => literal.parse::<i64>().is_ok_and(|l| l == *i),
        _ => value.as_text().trim() == literal,
    }
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string()
}

// ============================================================================
// ordering
// ============================================================================

/// Ordering key; a leading `-` sorts descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

impl OrderKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.into(),
                descending: true,
            },
            None => Self {
                field: raw.strip_prefix('+').unwrap_or(raw).into(),
                descending: false,
            },
        }
    }

    /// Compare by this key. Missing values sort first.
    pub fn compare(&self, a: &impl FieldLookup, b: &impl FieldLookup) -> Ordering {
        let ord = match (a.lookup(&self.field), b.lookup(&self.field)) {
            (Some(a), Some(b)) => a.compare(&b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if self.descending { ord.reverse() } else { ord }
    }
}

/// Compare by each key in turn.
pub fn compare_by(keys: &[OrderKey], a: &impl FieldLookup, b: &impl FieldLookup) -> Ordering {
    keys.iter()
        .map(|key| key.compare(a, b))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}
