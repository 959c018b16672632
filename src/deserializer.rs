//! Wire document -> flattened object graph.
//!
//! Every resource in `data` and `included` is flattened into a bag
//! (`{ id, ...attributes, meta }`), coerced against its schema entry and then
//! linked to the bags its relationships reference. Error documents are
//! normalized instead of linked.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::coerce::{coerce, CoerceContext};
use crate::schema::{FieldKind, TypeConfig};
use crate::serializer::Serializer;
use crate::types::{
    display_value, is_truthy, ResourceKey, DEFAULT_ERROR_STATUS, VALIDATION_ERROR_STATUS,
};

enum Link {
    One(ResourceKey),
    Many(Vec<ResourceKey>),
}

struct Node {
    key: ResourceKey,
    bag: Map<String, Value>,
    links: Vec<(String, Link)>,
}

/// Flattened records of one document plus the `(type, id)` lookup over them.
struct Graph {
    nodes: Vec<Node>,
    /// Last record wins when a key appears twice.
    lookup: HashMap<ResourceKey, usize>,
}

/// Per-document state of [`Graph::expand`].
#[derive(Default)]
struct Expansion {
    /// Resources on the path from the projected root to the current one.
    ancestors: Vec<usize>,
    /// Expanded subtrees without a cycle cut. Only those read the same from
    /// wherever they are reached.
    finished: HashMap<usize, Value>,
}

impl Graph {
    /// Materialize the bag at `index` with its relationships inlined.
    ///
    /// A link back to a resource that is still being expanded (a cycle) gets
    /// that resource's bare bag. Every other occurrence carries its links.
    /// The flag is set when a cycle was cut anywhere below `index`.
    fn expand(&self, index: usize, state: &mut Expansion) -> (Value, bool) {
        let node = &self.nodes[index];
        if state.ancestors.contains(&index) {
            trace!(key = ?node.key, "relationship cycle, inserting bare bag");
            return (Value::Object(node.bag.clone()), true);
        }
        if let Some(done) = state.finished.get(&index) {
            return (done.clone(), false);
        }

        state.ancestors.push(index);
        let mut bag = node.bag.clone();
        let mut cut = false;

        for (name, link) in &node.links {
            let value = match link {
                Link::One(key) => match self.lookup.get(key) {
                    Some(&target) => self.follow(target, state, &mut cut),
                    None => {
                        debug!(relationship = name.as_str(), ?key, "broken relationship link");
                        Value::Null
                    }
                },
                Link::Many(keys) => {
                    let mut items = Vec::with_capacity(keys.len());
                    for key in keys {
                        match self.lookup.get(key) {
                            Some(&target) => items.push(self.follow(target, state, &mut cut)),
                            None => {
                                debug!(relationship = name.as_str(), ?key, "dropping broken relationship link")
                            }
                        }
                    }
                    Value::Array(items)
                }
            };
            bag.insert(name.clone(), value);
        }
        state.ancestors.pop();

        let value = Value::Object(bag);
        if !cut {
            state.finished.insert(index, value.clone());
        }
        (value, cut)
    }

    fn follow(&self, target: usize, state: &mut Expansion, cut: &mut bool) -> Value {
        let (value, target_cut) = self.expand(target, state);
        *cut |= target_cut;
        value
    }
}

impl Serializer {
    /// Turn a wire document into plain objects with relationships inlined.
    ///
    /// * `null` and other falsy input yield `null`; non-object input is
    ///   returned as is.
    /// * Error documents are normalized: a string `error` is wrapped as
    ///   `{ error: { status, title, message } }`; from an `errors` list the
    ///   first entry that is not a validation error (`"422"`) is returned as
    ///   `{ error }`, otherwise the whole list as `{ errors }`.
    /// * Documents without truthy `data` are returned unchanged.
    ///
    /// ```
    /// use jsonapi_schema::{Schema, Serializer};
    /// use serde_json::json;
    ///
    /// let serializer = Serializer::new(Schema::from_value(&json!({
    ///     "todos": { "fields": { "done": "boolean" } }
    /// })));
    ///
    /// let result = serializer.deserialize(&json!({
    ///     "data": {
    ///         "type": "todos", "id": "1",
    ///         "attributes": { "done": "false" },
    ///         "relationships": { "user": { "data": { "type": "users", "id": "2" } } }
    ///     },
    ///     "included": [{ "type": "users", "id": "2", "attributes": { "name": "Steve" } }],
    ///     "meta": { "total": 1 }
    /// }));
    ///
    /// assert_eq!(result, json!({
    ///     "data": { "id": "1", "done": false, "user": { "id": "2", "name": "Steve" } },
    ///     "meta": { "total": 1 }
    /// }));
    /// ```
    pub fn deserialize(&self, document: &Value) -> Value {
        if !is_truthy(document) {
            return Value::Null;
        }
        let Value::Object(doc) = document else {
            return document.clone();
        };

        if let Some(normalized) = normalize_errors(document, doc) {
            return normalized;
        }

        let data = match doc.get("data") {
            Some(data) if is_truthy(data) => data,
            _ => return document.clone(),
        };

        let (primary, is_list): (Vec<&Value>, bool) = match data {
            Value::Array(items) => (items.iter().collect(), true),
            single => (vec![single], false),
        };
        let included = doc
            .get("included")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect::<Vec<_>>())
            .unwrap_or_default();

        let graph = self.build_graph(primary.iter().copied().chain(included));

        let mut state = Expansion::default();
        let projected = if is_list {
            let primary_keys: HashSet<ResourceKey> = primary.iter().map(|r| ResourceKey::of(r)).collect();
            Value::Array(
                graph
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, node)| primary_keys.contains(&node.key))
                    .map(|(index, _)| graph.expand(index, &mut state).0)
                    .collect(),
            )
        } else {
            match graph.lookup.get(&ResourceKey::of(data)) {
                Some(&index) => graph.expand(index, &mut state).0,
                None => Value::Null,
            }
        };

        let mut result = Map::new();
        result.insert("data".to_string(), projected);
        for (key, value) in doc {
            if key != "data" && key != "included" {
                result.insert(key.clone(), value.clone());
            }
        }
        Value::Object(result)
    }

    fn build_graph<'v>(&self, records: impl Iterator<Item = &'v Value>) -> Graph {
        let mut graph = Graph {
            nodes: Vec::new(),
            lookup: HashMap::new(),
        };
        for record in records {
            let key = ResourceKey::of(record);
            let bag = self.flatten_record(record, key.resource_type.as_deref());
            graph.lookup.insert(key.clone(), graph.nodes.len());
            graph.nodes.push(Node {
                key,
                bag,
                links: record_links(record),
            });
        }
        graph
    }

    fn flatten_record(&self, record: &Value, wire_type: Option<&str>) -> Map<String, Value> {
        let mut bag = Map::new();
        if let Some(id) = record.get("id") {
            bag.insert("id".to_string(), id.clone());
        }
        if let Some(Value::Object(attributes)) = record.get("attributes") {
            for (name, value) in attributes {
                bag.insert(name.clone(), value.clone());
            }
        }
        if let Some(meta) = record.get("meta").filter(|meta| !meta.is_null()) {
            bag.insert("meta".to_string(), meta.clone());
        }

        if let Some(wire_type) = wire_type {
            for config in self.entries_for(wire_type) {
                apply_fields(&mut bag, config, record, wire_type);
            }
        }
        bag
    }
}

/// Coerce and resolve the declared fields of one schema entry.
///
/// Type-kind fields are always assigned. Other fields only when present on
/// the bag or when they carry a resolve hook.
fn apply_fields(bag: &mut Map<String, Value>, config: &TypeConfig, record: &Value, parent_type: &str) {
    for (name, field) in config.fields.iter().filter(|(_, field)| field.is_type_field()) {
        let context = CoerceContext {
            parent_type: Some(parent_type),
            field: Some(field),
        };
        if let Some(value) = coerce(bag.get(name), &FieldKind::Type, &context) {
            bag.insert(name.clone(), value);
        }
    }

    for (name, field) in config.fields.iter().filter(|(_, field)| !field.is_type_field()) {
        if !bag.contains_key(name) && field.resolve.is_none() {
            continue;
        }
        let context = CoerceContext {
            parent_type: Some(parent_type),
            field: Some(field),
        };
        let mut value = bag.get(name).cloned();
        if let Some(kind) = &field.kind {
            value = coerce(value.as_ref(), kind, &context);
        }
        if let Some(resolve) = &field.resolve {
            value = Some(resolve(value.as_ref(), &*bag, record));
        }
        if let Some(value) = value {
            bag.insert(name.clone(), value);
        }
    }
}

fn record_links(record: &Value) -> Vec<(String, Link)> {
    let Some(Value::Object(relationships)) = record.get("relationships") else {
        return Vec::new();
    };
    relationships
        .iter()
        .filter_map(|(name, relationship)| {
            let link = match relationship.get("data") {
                Some(Value::Array(refs)) => Link::Many(refs.iter().map(ResourceKey::of).collect()),
                Some(reference) if is_truthy(reference) => Link::One(ResourceKey::of(reference)),
                _ => return None,
            };
            Some((name.clone(), link))
        })
        .collect()
}

fn normalize_errors(document: &Value, doc: &Map<String, Value>) -> Option<Value> {
    if let Some(error) = doc.get("error").filter(|error| is_truthy(error)) {
        if error.is_object() {
            return Some(document.clone());
        }
        let status = doc
            .get("status")
            .filter(|status| is_truthy(status))
            .map(display_value)
            .unwrap_or_else(|| DEFAULT_ERROR_STATUS.to_string());
        debug!(status = status.as_str(), "wrapping error document");
        return Some(json!({
            "error": { "status": status, "title": error, "message": error }
        }));
    }

    let errors = doc.get("errors").filter(|errors| is_truthy(errors))?;
    let first_non_validation = errors.as_array().and_then(|items| {
        items
            .iter()
            .find(|item| item.get("status").and_then(Value::as_str) != Some(VALIDATION_ERROR_STATUS))
    });
    Some(match first_non_validation {
        Some(error) => json!({ "error": error }),
        None => json!({ "errors": errors }),
    })
}
