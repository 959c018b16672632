//! Canonical schema model and the normalizer for loosely-shaped configuration.
//!
//! A schema maps a type name to a [`TypeConfig`]. Configuration arrives either
//! as JSON (shorthand strings or objects) or through the builder API; both end
//! up in the same canonical shape so nothing downstream branches on the
//! original form.
//!
//! ```
//! use jsonapi_schema::{FieldKind, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::from_value(&json!({
//!     "todos": {
//!         "fields": { "title": "string", "created": { "type": "date", "readOnly": true } },
//!         "relationships": { "user": "users" }
//!     },
//!     "broken": "not an object"
//! }));
//!
//! let todos = schema.get("todos").unwrap();
//! assert_eq!(todos.types, vec!["todos".to_string()]);
//! assert_eq!(todos.get_field("title").unwrap().kind, Some(FieldKind::String));
//! assert!(todos.get_field("created").unwrap().read_only);
//! assert!(schema.get("broken").is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{is_truthy_opt, json_type_name};

/// Hook applied to a field value while serializing: `(value, attributes) -> value`.
pub type SerializeHook = Arc<dyn Fn(&Value, &Map<String, Value>) -> Value + Send + Sync>;

/// Hook applied to a field while deserializing: `(value, flattened bag, raw record) -> value`.
pub type ResolveHook =
    Arc<dyn Fn(Option<&Value>, &Map<String, Value>, &Value) -> Value + Send + Sync>;

/// Computes a relationship's target type from the owning resource's attributes.
pub type TargetResolver = Arc<dyn Fn(&Map<String, Value>) -> Option<String> + Send + Sync>;

/// Declared kind of a field, used by the value coercer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Number,
    Float,
    Date,
    Boolean,
    /// Holds the owning resource's own (possibly polymorphic) type name.
    Type,
    /// Any other tag. Values pass through unchanged.
    Other(String),
}

impl FieldKind {
    /// Parse a kind tag. Unknown tags are kept as [`FieldKind::Other`].
    pub fn parse(tag: &str) -> Self {
        match tag {
            "string" => FieldKind::String,
            "number" => FieldKind::Number,
            "float" => FieldKind::Float,
            "date" => FieldKind::Date,
            "boolean" => FieldKind::Boolean,
            "type" => FieldKind::Type,
            other => FieldKind::Other(other.to_string()),
        }
    }

    /// Returns the tag this kind was parsed from.
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Float => "float",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
            FieldKind::Type => "type",
            FieldKind::Other(tag) => tag,
        }
    }
}

/// Declaration of a single attribute.
#[derive(Clone, Default)]
pub struct FieldSpec {
    /// Coercion kind. Fields without a kind are never coerced.
    pub kind: Option<FieldKind>,
    /// Read-only fields are dropped from serialized output.
    pub read_only: bool,
    /// Set by the `"type"` shorthand. Carried for consumers, not interpreted here.
    pub always_declared: bool,
    pub serialize: Option<SerializeHook>,
    pub resolve: Option<ResolveHook>,
}

impl FieldSpec {
    /// A field coerced as `kind`.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A field without a kind; only hooks and `read_only` apply.
    pub fn untyped() -> Self {
        Self::default()
    }

    /// Normalize the shorthand form, e.g. `"date"`.
    ///
    /// The `"type"` shorthand additionally marks the field as always declared.
    pub fn shorthand(tag: &str) -> Self {
        let kind = FieldKind::parse(tag);
        Self {
            always_declared: kind == FieldKind::Type,
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn serialize_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(hook));
        self
    }

    pub fn resolve_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&Value>, &Map<String, Value>, &Value) -> Value + Send + Sync + 'static,
    {
        self.resolve = Some(Arc::new(hook));
        self
    }

    /// True when the field mirrors the owning resource's type name.
    pub fn is_type_field(&self) -> bool {
        self.kind == Some(FieldKind::Type)
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            kind: obj.get("type").and_then(Value::as_str).map(FieldKind::parse),
            read_only: is_truthy_opt(obj.get("readOnly")),
            always_declared: is_truthy_opt(obj.get("alwaysDeclared"))
                || is_truthy_opt(obj.get("alwaysInclude")),
            serialize: None,
            resolve: None,
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("kind", &self.kind)
            .field("read_only", &self.read_only)
            .field("always_declared", &self.always_declared)
            .field("serialize", &self.serialize.is_some())
            .field("resolve", &self.resolve.is_some())
            .finish()
    }
}

/// Where a relationship points.
#[derive(Clone)]
pub enum RelTarget {
    /// A fixed type name.
    Fixed(String),
    /// Computed from the owning resource's remaining attributes.
    Dynamic(TargetResolver),
    /// No target configured. References carry a `null` type unless the
    /// related object overrides it.
    Unknown,
}

impl RelTarget {
    /// Resolve the target type for a resource with the given attributes.
    pub fn resolve(&self, attrs: &Map<String, Value>) -> Option<String> {
        match self {
            RelTarget::Fixed(name) => Some(name.clone()),
            RelTarget::Dynamic(resolver) => resolver(attrs),
            RelTarget::Unknown => None,
        }
    }

    /// The target type when it is known without any attributes.
    pub fn fixed(&self) -> Option<&str> {
        match self {
            RelTarget::Fixed(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for RelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelTarget::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            RelTarget::Dynamic(_) => f.write_str("Dynamic(..)"),
            RelTarget::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Declaration of a relationship.
#[derive(Debug, Clone)]
pub struct RelSpec {
    pub target: RelTarget,
    /// Read-only relationships are stripped from attributes but never emitted.
    pub read_only: bool,
}

impl RelSpec {
    /// Relationship to a fixed type.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: RelTarget::Fixed(target.into()),
            read_only: false,
        }
    }

    /// Relationship whose target is computed per resource.
    pub fn dynamic<F>(resolver: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            target: RelTarget::Dynamic(Arc::new(resolver)),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let target = match obj.get("type") {
            Some(Value::String(name)) => RelTarget::Fixed(name.clone()),
            Some(Value::Array(names)) => names
                .iter()
                .find_map(Value::as_str)
                .map(|name| RelTarget::Fixed(name.to_string()))
                .unwrap_or(RelTarget::Unknown),
            _ => RelTarget::Unknown,
        };
        Self {
            target,
            read_only: is_truthy_opt(obj.get("readOnly")),
        }
    }
}

/// Canonical configuration for one schema entry.
#[derive(Debug, Clone)]
pub struct TypeConfig {
    /// Wire type names matched by this entry. Never empty; more than one
    /// member makes the entry polymorphic.
    pub types: Vec<String>,
    pub fields: Vec<(String, FieldSpec)>,
    pub relationships: Vec<(String, RelSpec)>,
}

impl TypeConfig {
    /// Entry matching a single wire type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            types: vec![type_name.into()],
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Entry matching a set of wire types. Falls back to `fallback` when the
    /// set is empty.
    pub fn polymorphic<I, S>(types: I, fallback: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut types: Vec<String> = types.into_iter().map(Into::into).collect();
        if types.is_empty() {
            types.push(fallback.to_string());
        }
        Self {
            types,
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Add or replace a field declaration.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.set_field(name, spec);
        self
    }

    /// Add or replace a relationship declaration.
    pub fn relationship(mut self, name: impl Into<String>, spec: RelSpec) -> Self {
        self.set_relationship(name, spec);
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, spec: FieldSpec) {
        upsert(&mut self.fields, name.into(), spec);
    }

    pub fn set_relationship(&mut self, name: impl Into<String>, spec: RelSpec) {
        upsert(&mut self.relationships, name.into(), spec);
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        lookup(&self.fields, name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldSpec> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| spec)
    }

    pub fn get_relationship(&self, name: &str) -> Option<&RelSpec> {
        lookup(&self.relationships, name)
    }

    /// The name used when this entry is referenced by type (first member).
    pub fn canonical_type(&self) -> &str {
        &self.types[0]
    }

    pub fn is_polymorphic(&self) -> bool {
        self.types.len() > 1
    }

    /// Whether a resource of `wire_type` is described by this entry.
    pub fn matches(&self, wire_type: &str) -> bool {
        self.types.iter().any(|t| t == wire_type)
    }

    fn from_config(key: &str, obj: &Map<String, Value>) -> Self {
        let mut config = match obj.get("type") {
            Some(Value::Array(names)) => {
                TypeConfig::polymorphic(names.iter().filter_map(Value::as_str), key)
            }
            Some(Value::String(name)) if !name.is_empty() => TypeConfig::new(name.as_str()),
            _ => TypeConfig::new(key),
        };

        if let Some(fields) = obj.get("fields").and_then(Value::as_object) {
            for (name, item) in fields {
                match item {
                    Value::Object(spec) => config.set_field(name, FieldSpec::from_object(spec)),
                    Value::String(tag) => config.set_field(name, FieldSpec::shorthand(tag)),
                    other => debug!(
                        entry = key,
                        field = name.as_str(),
                        actual = json_type_name(other),
                        "skipping malformed field declaration"
                    ),
                }
            }
        }

        if let Some(relationships) = obj.get("relationships").and_then(Value::as_object) {
            for (name, item) in relationships {
                match item {
                    Value::Object(spec) => config.set_relationship(name, RelSpec::from_object(spec)),
                    Value::String(target) => config.set_relationship(name, RelSpec::to(target.as_str())),
                    other => debug!(
                        entry = key,
                        relationship = name.as_str(),
                        actual = json_type_name(other),
                        "skipping malformed relationship declaration"
                    ),
                }
            }
        }

        config
    }
}

fn upsert<T>(items: &mut Vec<(String, T)>, name: String, value: T) {
    match items.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, slot)) => *slot = value,
        None => items.push((name, value)),
    }
}

fn lookup<'a, T>(items: &'a [(String, T)], name: &str) -> Option<&'a T> {
    items
        .iter()
        .find(|(existing, _)| existing == name)
        .map(|(_, value)| value)
}

/// Canonical schema: entry key -> [`TypeConfig`], in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entries: Vec<(String, TypeConfig)>,
    positions: HashMap<String, usize>,
}

impl Schema {
    /// Empty schema. Every type is handled in passthrough mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a configuration map.
    ///
    /// Never fails: a non-object configuration yields an empty schema and
    /// non-object entries, fields and relationships are skipped.
    pub fn from_value(config: &Value) -> Self {
        let mut schema = Schema::new();
        let Some(map) = config.as_object() else {
            debug!(
                actual = json_type_name(config),
                "schema configuration is not an object, using empty schema"
            );
            return schema;
        };

        for (key, entry) in map {
            match entry {
                Value::Object(obj) => schema.insert(key.clone(), TypeConfig::from_config(key, obj)),
                other => debug!(
                    entry = key.as_str(),
                    actual = json_type_name(other),
                    "skipping non-object schema entry"
                ),
            }
        }

        schema
    }

    /// Builder form of [`Schema::insert`].
    pub fn with_type(mut self, key: impl Into<String>, config: TypeConfig) -> Self {
        self.insert(key, config);
        self
    }

    /// Add or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, config: TypeConfig) {
        let key = key.into();
        match self.positions.get(&key) {
            Some(&index) => self.entries[index].1 = config,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, config));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&TypeConfig> {
        self.positions.get(key).map(|&index| &self.entries[index].1)
    }

    /// Mutable access, e.g. to attach hooks to an entry loaded from JSON.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut TypeConfig> {
        match self.positions.get(key) {
            Some(&index) => Some(&mut self.entries[index].1),
            None => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeConfig)> {
        self.entries.iter().map(|(key, config)| (key.as_str(), config))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
