//! Bracket-aware query string grammar.
//!
//! `serde_urlencoded` handles percent-encoding of flat `key=value` pairs;
//! this module layers the nested-key grammar on top of it:
//!
//! - `a=1&a=2` keeps the last occurrence (`{a: "2"}`)
//! - `a[]=1&a[]=2` appends (`{a: ["1", "2"]}`)
//! - `a[b][c]=1` nests (`{a: {b: {c: "1"}}}`)
//!
//! Values are `serde_json::Value` so the same tree doubles as a JSON
//! payload when a request is sent with `content-type: application/json`.

use serde_json::{Map, Value};
use tracing::warn;

/// Ordered name → value tree used for query, post, server and attribute views.
pub type Params = Map<String, Value>;

/// Deserialize a raw query (or form-encoded body) into a param tree.
///
/// Malformed input never fails: undecodable input yields an empty tree.
pub fn parse_query(raw: &str) -> Params {
    let mut params = Params::new();
    let raw = raw.trim_start_matches('?');
    if raw.is_empty() {
        return params;
    }

    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(raw) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!("discarding undecodable query string: {e}");
            return params;
        }
    };

    for (key, value) in pairs {
        insert(&mut params, &key, value);
    }
    params
}

/// Serialize a param tree back into a raw query string.
///
/// Nested keys are flattened as `a[b]`, lists as `a[0]`; booleans render as
/// `1`/`0` and nulls are skipped.
pub fn build_query(params: &Params) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten(key.clone(), value, &mut pairs);
    }
    // Serializing a sequence of string pairs cannot fail.
    serde_urlencoded::to_string(&pairs).unwrap_or_default()
}

/// Render a scalar the way form encoding expects it.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{prefix}[{i}]"), item, out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                flatten(format!("{prefix}[{k}]"), v, out);
            }
        }
        scalar => {
            if let Some(s) = scalar_to_string(scalar) {
                out.push((prefix, s));
            }
        }
    }
}

/// A single step of a bracketed key path.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Push,
}

/// Split `a[b][]` into `a`, `Key(b)`, `Push`. Unbalanced brackets make the
/// whole key literal.
fn split_key(key: &str) -> (&str, Vec<Segment<'_>>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    if open == 0 {
        return (key, Vec::new());
    }

    let (base, mut rest) = key.split_at(open);
    let mut segments = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key, Vec::new());
        };
        let inner = &stripped[..close];
        segments.push(if inner.is_empty() { Segment::Push } else { Segment::Key(inner) });
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (key, Vec::new());
    }
    (base, segments)
}

fn insert(params: &mut Params, key: &str, value: String) {
    let (base, segments) = split_key(key);
    if segments.is_empty() {
        params.insert(base.to_string(), Value::String(value));
        return;
    }
    let slot = params.entry(base.to_string()).or_insert(Value::Null);
    insert_path(slot, &segments, value);
}

fn insert_path(slot: &mut Value, segments: &[Segment<'_>], value: String) {
    match segments.split_first() {
        None => *slot = Value::String(value),
        Some((first, rest)) => insert_path(child_slot(slot, first), rest, value),
    }
}

/// Resolve one segment below `slot`, reshaping `slot` when it holds the
/// wrong kind of value.
fn child_slot<'v>(slot: &'v mut Value, segment: &Segment<'_>) -> &'v mut Value {
    match (segment, slot) {
        (Segment::Push, Value::Object(map)) => {
            let next = map.len().to_string();
            map.entry(next).or_insert(Value::Null)
        }
        (Segment::Push, Value::Array(items)) => {
            items.push(Value::Null);
            let last = items.len() - 1;
            &mut items[last]
        }
        (Segment::Push, other) => {
            *other = Value::Array(Vec::new());
            child_slot(other, segment)
        }
        (Segment::Key(k), Value::Object(map)) => map.entry(k.to_string()).or_insert(Value::Null),
        (Segment::Key(_), other) => {
            *other = Value::Object(to_object(other.take()));
            child_slot(other, segment)
        }
    }
}

/// Lists keep their items under index keys when a named key joins them.
fn to_object(value: Value) -> Params {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Value::Object(map) => map,
        _ => Params::new(),
    }
}
