//! Resource types touched by a query path, its `include` parameter and a payload.
//!
//! Used upstream to key cache invalidation; nothing here fails. Unknown types
//! and relationship names simply end the walk.

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::query::ParsedQuery;
use crate::schema::{Schema, TypeConfig};
use crate::types::{display_value, is_truthy};

/// Result of [`resolve_query_type_map`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeMap {
    /// Type of the resource the query addresses.
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    /// Every other type touched, deduplicated in first-seen order.
    pub relationships: Vec<String>,
}

impl TypeMap {
    /// The base type followed by the relationship types.
    pub fn all_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.resource_type.iter().cloned().collect();
        for t in &self.relationships {
            if !types.contains(t) {
                types.push(t.clone());
            }
        }
        types
    }
}

/// Walk `segments` through the schema's relationships.
///
/// The first segment names a schema entry; each following segment must be a
/// relationship of the current entry and moves to its target type. The walk
/// stops at the first segment that does not resolve. When not even the first
/// segment is known, the first raw segment is returned.
///
/// ```
/// use jsonapi_schema::{resolve_type_chain, Schema};
/// use serde_json::json;
///
/// let schema = Schema::from_value(&json!({
///     "todos": { "relationships": { "user": "users" } },
///     "users": { "relationships": { "address": "addresses" } }
/// }));
/// assert_eq!(
///     resolve_type_chain(&["todos", "user", "address"], &schema),
///     vec!["todos", "users", "addresses"]
/// );
/// assert_eq!(resolve_type_chain(&["unknown", "x"], &schema), vec!["unknown"]);
/// ```
pub fn resolve_type_chain<S: AsRef<str>>(segments: &[S], schema: &Schema) -> Vec<String> {
    let segments: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
    let Some((&first, rest)) = segments.split_first() else {
        return Vec::new();
    };
    let Some(entry) = schema.get(first) else {
        return vec![first.to_string()];
    };

    let mut types = vec![entry.canonical_type().to_string()];
    let mut current: Option<&TypeConfig> = Some(entry);

    for &segment in rest {
        let Some(config) = current else {
            break;
        };
        let Some(target) = config
            .get_relationship(segment)
            .and_then(|rel| rel.target.fixed())
        else {
            trace!(segment, "type chain stops at unresolved segment");
            break;
        };
        types.push(target.to_string());
        current = schema.get(target);
    }

    types
}

/// Compute the base type and related types for a query.
///
/// Related types come from the path prefix, every dot-path in the `include`
/// parameter (string or list, comma-separated) and the relationships present
/// on `payload`, walked recursively.
pub fn resolve_query_type_map(
    query: &ParsedQuery,
    schema: &Schema,
    payload: Option<&Value>,
) -> TypeMap {
    let mut types = resolve_type_chain(&query.keys, schema);
    let base = types.pop();

    if let Some(base) = &base {
        for path in include_paths(query.params.get("include")) {
            let mut chain = vec![base.clone()];
            chain.extend(path.split('.').map(|segment| segment.trim().to_string()));
            types.extend(resolve_type_chain(&chain, schema).into_iter().skip(1));
        }

        if let Some(payload) = payload {
            collect_payload_types(base, payload, schema, &mut types);
        }
    }

    let mut relationships: Vec<String> = Vec::with_capacity(types.len());
    for t in types {
        if !relationships.contains(&t) {
            relationships.push(t);
        }
    }

    TypeMap {
        resource_type: base,
        relationships,
    }
}

fn include_paths(include: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match include {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(display_value).collect(),
        Some(other) => vec![display_value(other)],
    };
    raw.iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(String::from)
        .collect()
}

/// Append the target types of every relationship present on `payload`,
/// recursing into the related objects.
pub fn collect_payload_types(type_name: &str, payload: &Value, schema: &Schema, out: &mut Vec<String>) {
    if let Value::Array(items) = payload {
        for item in items {
            collect_payload_types(type_name, item, schema, out);
        }
        return;
    }

    let (Some(config), Some(attrs)) = (schema.get(type_name), payload.as_object()) else {
        return;
    };

    for (name, rel) in &config.relationships {
        let Some(value) = attrs.get(name).filter(|v| is_truthy(v)) else {
            continue;
        };
        let Some(target) = rel.target.resolve(attrs) else {
            continue;
        };
        out.push(target.clone());
        collect_payload_types(&target, value, schema, out);
    }
}
