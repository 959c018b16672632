//! Path descriptor parsing: `"todos/1"` or `["todos", 1, {"page": {"size": 20}}]`
//! into a URL, resource id, parameters and path keys.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{display_value, is_truthy};

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").unwrap());

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .unwrap()
});

/// Encodes a parameter object into a query string (without the leading `?`).
///
/// Implementations must be deterministic: URLs double as cache keys upstream.
pub trait QueryEncoder {
    fn encode(&self, params: &Map<String, Value>) -> String;
}

impl<F> QueryEncoder for F
where
    F: Fn(&Map<String, Value>) -> String,
{
    fn encode(&self, params: &Map<String, Value>) -> String {
        self(params)
    }
}

/// Default encoder.
///
/// Keys are sorted at every level, nested objects use bracket notation
/// (`page[size]=20`), arrays are comma-joined and only values are
/// percent-encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QsEncoder;

impl QueryEncoder for QsEncoder {
    fn encode(&self, params: &Map<String, Value>) -> String {
        stringify_params(params)
    }
}

/// Encode parameters with the default [`QsEncoder`] rules.
pub fn stringify_params(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    append_object(&mut pairs, None, params);
    pairs.join("&")
}

fn append_object(pairs: &mut Vec<String>, prefix: Option<&str>, map: &Map<String, Value>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        let name = match prefix {
            Some(prefix) => format!("{}[{}]", prefix, key),
            None => key.clone(),
        };
        append_value(pairs, &name, &map[key.as_str()]);
    }
}

fn append_value(pairs: &mut Vec<String>, name: &str, value: &Value) {
    match value {
        Value::Object(map) => append_object(pairs, Some(name), map),
        Value::Array(items) if items.is_empty() => {}
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => urlencoding::encode(&display_value(other)).into_owned(),
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(format!("{}={}", name, joined));
        }
        Value::Null => pairs.push(format!("{}=", name)),
        other => pairs.push(format!(
            "{}={}",
            name,
            urlencoding::encode(&display_value(other))
        )),
    }
}

/// Result of [`parse_query_arg`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedQuery {
    /// `/`-joined path including any id, plus the encoded query string.
    pub url: String,
    /// First numeric or UUID segment.
    pub id: Option<String>,
    /// Trailing parameter object, empty when none was given.
    pub params: Map<String, Value>,
    /// Path segments that are not ids.
    pub keys: Vec<String>,
}

/// Whether a path segment looks like a numeric id (leading digit).
pub fn is_id(segment: &str) -> bool {
    ID_PATTERN.is_match(segment)
}

/// Whether a path segment is an RFC 4122 UUID.
pub fn is_uuid(segment: &str) -> bool {
    UUID_PATTERN.is_match(segment)
}

/// Parse a path descriptor with the default query encoder.
///
/// ```
/// use jsonapi_schema::parse_query_arg;
/// use serde_json::json;
///
/// let query = parse_query_arg(&json!("todos/1/relationships/user"));
/// assert_eq!(query.url, "/todos/1/relationships/user");
/// assert_eq!(query.id.as_deref(), Some("1"));
/// assert_eq!(query.keys, vec!["todos", "relationships", "user"]);
///
/// let query = parse_query_arg(&json!(["todos", { "page": { "size": 20 } }]));
/// assert_eq!(query.url, "/todos?page[size]=20");
/// ```
pub fn parse_query_arg(arg: &Value) -> ParsedQuery {
    parse_query_arg_with(arg, &QsEncoder)
}

/// Parse a path descriptor, encoding parameters with `encoder`.
///
/// Strings are split on `/` with empty segments dropped. Arrays may mix
/// strings and numbers and end with a parameter object. Falsy descriptors
/// yield an empty result.
pub fn parse_query_arg_with(arg: &Value, encoder: &dyn QueryEncoder) -> ParsedQuery {
    if !is_truthy(arg) {
        return ParsedQuery::default();
    }

    let mut tokens = Vec::new();
    match arg {
        Value::Array(items) => {
            for item in items {
                flatten_token(item, &mut tokens);
            }
        }
        other => flatten_token(other, &mut tokens),
    }

    let params = match tokens.last() {
        Some(Token::Params(_)) => match tokens.pop() {
            Some(Token::Params(map)) => Some(map),
            _ => None,
        },
        _ => None,
    };

    let segments: Vec<String> = tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Segment(segment) => Some(segment),
            Token::Params(_) => {
                debug!("ignoring parameter object that is not the last path element");
                None
            }
        })
        .collect();

    let mut url = format!("/{}", segments.join("/"));
    if let Some(params) = &params {
        let encoded = encoder.encode(params);
        if !encoded.is_empty() {
            url.push('?');
            url.push_str(&encoded);
        }
    }

    let is_identifier = |segment: &String| is_id(segment) || is_uuid(segment);
    let id = segments.iter().find(|segment| is_identifier(*segment)).cloned();
    let keys = segments
        .into_iter()
        .filter(|segment| !is_identifier(segment))
        .collect();

    ParsedQuery {
        url,
        id,
        params: params.unwrap_or_default(),
        keys,
    }
}

enum Token {
    Segment(String),
    Params(Map<String, Value>),
}

fn flatten_token(value: &Value, tokens: &mut Vec<Token>) {
    match value {
        Value::String(path) => tokens.extend(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| Token::Segment(segment.to_string())),
        ),
        Value::Object(map) => tokens.push(Token::Params(map.clone())),
        Value::Array(items) => {
            for item in items {
                flatten_token(item, tokens);
            }
        }
        Value::Null => {}
        other => tokens.push(Token::Segment(display_value(other))),
    }
}
