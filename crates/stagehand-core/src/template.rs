//! Template value resolution.
//!
//! App override values may reference global values with `{{ .Key }}` or
//! `{{ .Outer.Inner }}` placeholders. Resolution walks the YAML tree and
//! substitutes every placeholder it finds in string keys and string values:
//!
//! - a string that is exactly one placeholder becomes the referenced value,
//!   keeping its type (`replicas: "{{ .Replicas }}"` resolves to a number,
//!   `tls: "{{ .Tls }}"` can pull in a whole map);
//! - placeholders embedded in longer text are rendered as scalars;
//! - a key absent from the values is an error, never an empty string.
//!
//! `{{-` and `-}}` trim whitespace on the adjacent side, and `{{ . }}` refers
//! to the whole values map.

use crate::error::{Result, StagehandError};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    /// Dotted path, empty for `{{ . }}`.
    Field(Vec<String>),
}

static FIELD_RE: OnceLock<Regex> = OnceLock::new();

fn field_re() -> &'static Regex {
    FIELD_RE.get_or_init(|| {
        Regex::new(r"^\.$|^(\.[A-Za-z_][A-Za-z0-9_\-]*)+$").unwrap()
    })
}

fn parse(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut trim_next = false;

    while let Some(start) = rest.find(OPEN) {
        let mut text = rest[..start].to_string();
        if trim_next {
            text = text.trim_start().to_string();
        }
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            return Err(StagehandError::Template(format!(
                "unclosed action in template {template:?}"
            )));
        };

        let mut action = &after_open[..end];
        if let Some(stripped) = action.strip_prefix('-') {
            text = text.trim_end().to_string();
            action = stripped;
        }
        trim_next = false;
        if let Some(stripped) = action.strip_suffix('-') {
            trim_next = true;
            action = stripped;
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        segments.push(Segment::Field(parse_field(action.trim(), template)?));
        rest = &after_open[end + CLOSE.len()..];
    }

    let tail = if trim_next { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        segments.push(Segment::Text(tail.to_string()));
    }
    Ok(segments)
}

fn parse_field(action: &str, template: &str) -> Result<Vec<String>> {
    if action.is_empty() {
        return Err(StagehandError::Template(format!(
            "missing value for command in template {template:?}"
        )));
    }
    if !field_re().is_match(action) {
        return Err(StagehandError::Template(format!(
            "unsupported action '{action}' in template {template:?}: expected a field reference like .Name"
        )));
    }
    Ok(action
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

fn lookup<'a>(values: &'a Mapping, path: &[String]) -> Result<&'a Value> {
    let mut current: Option<&Value> = None;
    let mut map = values;
    for (i, key) in path.iter().enumerate() {
        let Some(next) = map.get(key.as_str()) else {
            return Err(StagehandError::Template(format!(
                "map has no entry for key \"{}\"",
                path[..=i].join(".")
            )));
        };
        current = Some(next);
        if i + 1 < path.len() {
            map = next.as_mapping().ok_or_else(|| {
                StagehandError::Template(format!(
                    "can't evaluate field {} in non-map value at \"{}\"",
                    path[i + 1],
                    path[..=i].join(".")
                ))
            })?;
        }
    }
    Ok(current.unwrap_or(&Value::Null))
}

fn resolve_field(values: &Mapping, path: &[String]) -> Result<Value> {
    if path.is_empty() {
        return Ok(Value::Mapping(values.clone()));
    }
    lookup(values, path).cloned()
}

fn render_scalar(value: &Value, path: &[String]) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            Err(StagehandError::Template(format!(
                "cannot embed non-scalar value \".{}\" inside text",
                path.join(".")
            )))
        }
    }
}

fn render(segments: &[Segment], values: &Mapping) -> Result<String> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Field(path) => {
                let value = resolve_field(values, path)?;
                out.push_str(&render_scalar(&value, path)?);
            }
        }
    }
    Ok(out)
}

/// Resolve placeholders in a single string.
pub fn resolve_string(template: &str, values: &Mapping) -> Result<String> {
    if !template.contains(OPEN) {
        return Ok(template.to_string());
    }
    render(&parse(template)?, values)
}

/// Resolve placeholders anywhere inside `value`.
pub fn resolve_value(value: &Value, values: &Mapping) -> Result<Value> {
    match value {
        Value::String(s) if s.contains(OPEN) => {
            let segments = parse(s)?;
            if let [Segment::Field(path)] = segments.as_slice() {
                return resolve_field(values, path);
            }
            Ok(Value::String(render(&segments, values)?))
        }
        Value::Mapping(map) => Ok(Value::Mapping(resolve(map, values)?)),
        Value::Sequence(seq) => seq
            .iter()
            .map(|item| resolve_value(item, values))
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Value::Tagged(tagged) => {
            let mut tagged = tagged.as_ref().clone();
            tagged.value = resolve_value(&tagged.value, values)?;
            Ok(Value::Tagged(Box::new(tagged)))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve every placeholder in `template` against `values`. Either the whole
/// tree resolves or an error is returned; there is no partial result.
pub fn resolve(template: &Mapping, values: &Mapping) -> Result<Mapping> {
    let mut out = Mapping::with_capacity(template.len());
    for (key, value) in template {
        let key = match key {
            Value::String(s) => Value::String(resolve_string(s, values)?),
            other => other.clone(),
        };
        let resolved = resolve_value(value, values)?;
        if out.insert(key.clone(), resolved).is_some() {
            let shown = key
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{key:?}"));
            return Err(StagehandError::Template(format!(
                "duplicate key '{shown}' after resolution"
            )));
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
