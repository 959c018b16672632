//! Object -> wire document serialization.
//!
//! ```
//! use jsonapi_schema::{Schema, Serializer};
//! use serde_json::json;
//!
//! let serializer = Serializer::new(Schema::from_value(&json!({
//!     "todos": { "relationships": { "user": "users" } }
//! })));
//!
//! let doc = serializer
//!     .serialize("todos", &json!({ "id": 1, "title": "Clean", "user": { "id": 2 } }))
//!     .unwrap();
//!
//! assert_eq!(doc, json!({
//!     "data": {
//!         "type": "todos",
//!         "id": "1",
//!         "attributes": { "title": "Clean" },
//!         "relationships": { "user": { "data": { "type": "users", "id": "2" } } }
//!     }
//! }));
//! ```

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::trace;

use crate::error::SerializeError;
use crate::schema::{Schema, TypeConfig};
use crate::types::{display_value, is_truthy, json_type_name, TYPE_OVERRIDE_KEY};

/// Converts between application objects and wire documents for one schema.
///
/// The schema and the wire-type index derived from it are fixed at
/// construction; serializing and deserializing only read them, so a single
/// instance can be shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    pub(crate) schema: Schema,
    /// Wire type name -> keys of the entries whose fields apply to incoming
    /// records. A single-type entry matches its own key, a polymorphic entry
    /// every member of its type set.
    pub(crate) field_index: HashMap<String, Vec<String>>,
    /// Polymorphic member name -> keys of the entries declaring it. Used to
    /// serialize a member type that has no entry of its own.
    pub(crate) member_index: HashMap<String, Vec<String>>,
}

/// A resource being assembled by [`Serializer::parse_resource`].
struct Envelope {
    resource_type: Option<String>,
    id: Option<String>,
    attributes: Map<String, Value>,
    relationships: Map<String, Value>,
    schemaless: bool,
}

impl Envelope {
    fn into_value(self) -> Value {
        let mut resource = Map::new();
        resource.insert(
            "type".to_string(),
            self.resource_type.map(Value::String).unwrap_or(Value::Null),
        );
        if let Some(id) = self.id {
            resource.insert("id".to_string(), Value::String(id));
        }
        if self.schemaless || !self.attributes.is_empty() {
            resource.insert("attributes".to_string(), Value::Object(self.attributes));
        }
        if !self.relationships.is_empty() {
            resource.insert("relationships".to_string(), Value::Object(self.relationships));
        }
        Value::Object(resource)
    }

    fn into_reference(self) -> Value {
        json!({
            "type": self.resource_type,
            "id": self.id,
        })
    }
}

impl Serializer {
    pub fn new(schema: Schema) -> Self {
        let mut field_index = HashMap::new();
        let mut member_index = HashMap::new();
        for (key, config) in schema.iter() {
            if config.is_polymorphic() {
                for member in &config.types {
                    index_entry(&mut field_index, member, key);
                    index_entry(&mut member_index, member, key);
                }
            } else {
                index_entry(&mut field_index, key, key);
            }
        }
        Self {
            schema,
            field_index,
            member_index,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Schema entries whose fields apply to incoming records of `wire_type`,
    /// in declaration order.
    pub fn entries_for<'a>(&'a self, wire_type: &str) -> impl Iterator<Item = &'a TypeConfig> + 'a {
        self.indexed(&self.field_index, wire_type)
    }

    /// Entry used to serialize `resource_type`: the entry under that key,
    /// else the first polymorphic entry whose type set contains it.
    pub fn config_for(&self, resource_type: &str) -> Option<&TypeConfig> {
        self.schema
            .get(resource_type)
            .or_else(|| self.indexed(&self.member_index, resource_type).next())
    }

    fn indexed<'a>(
        &'a self,
        index: &'a HashMap<String, Vec<String>>,
        name: &str,
    ) -> impl Iterator<Item = &'a TypeConfig> + 'a {
        index
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(move |key| self.schema.get(key))
    }

    /// Build a wire document for one object, a list of objects or nothing.
    ///
    /// A falsy `attrs` (e.g. `null`) yields `{ "type": .., "data": null }`.
    ///
    /// # Errors
    ///
    /// Returns `SerializeError::InvalidResource` when a resource or related
    /// resource is neither an object nor `null`.
    pub fn serialize(&self, resource_type: &str, attrs: &Value) -> Result<Value, SerializeError> {
        if !is_truthy(attrs) {
            return Ok(json!({ "type": resource_type, "data": null }));
        }

        let data = match attrs {
            Value::Array(items) => {
                let mut resources = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let path = format!("/data/{}", i);
                    resources.push(self.resource_value(Some(resource_type), item, &path)?);
                }
                Value::Array(resources)
            }
            other => self.resource_value(Some(resource_type), other, "/data")?,
        };

        Ok(json!({ "data": data }))
    }

    /// Build a single wire resource. `null` yields `null`.
    pub fn parse_resource(&self, resource_type: &str, attrs: &Value) -> Result<Value, SerializeError> {
        self.resource_value(Some(resource_type), attrs, "")
    }

    /// Reduce an object to a bare `{ type, id }` reference. `null` yields `null`.
    pub fn parse_relationship(
        &self,
        resource_type: Option<&str>,
        attrs: &Value,
    ) -> Result<Value, SerializeError> {
        Ok(self
            .build_resource(resource_type, attrs, "")?
            .map(Envelope::into_reference)
            .unwrap_or(Value::Null))
    }

    fn resource_value(
        &self,
        resource_type: Option<&str>,
        attrs: &Value,
        path: &str,
    ) -> Result<Value, SerializeError> {
        Ok(self
            .build_resource(resource_type, attrs, path)?
            .map(Envelope::into_value)
            .unwrap_or(Value::Null))
    }

    fn build_resource(
        &self,
        resource_type: Option<&str>,
        attrs: &Value,
        path: &str,
    ) -> Result<Option<Envelope>, SerializeError> {
        let mut attrs = match attrs {
            Value::Null => return Ok(None),
            Value::Object(map) => map.clone(),
            other => {
                return Err(SerializeError::InvalidResource {
                    path: if path.is_empty() { "/".to_string() } else { path.to_string() },
                    actual: json_type_name(other).to_string(),
                })
            }
        };

        let mut resource_type = resource_type.map(String::from);
        if let Some(override_type) = attrs.shift_remove(TYPE_OVERRIDE_KEY) {
            if is_truthy(&override_type) {
                resource_type = Some(display_value(&override_type));
            }
        }

        let id = match attrs.shift_remove("id") {
            None | Some(Value::Null) => None,
            Some(id) => Some(display_value(&id)),
        };

        let Some(config) = resource_type.as_deref().and_then(|t| self.config_for(t)) else {
            trace!(resource_type = ?resource_type, "no schema entry, passing attributes through");
            return Ok(Some(Envelope {
                resource_type,
                id,
                attributes: attrs,
                relationships: Map::new(),
                schemaless: true,
            }));
        };

        let mut relationships = Map::new();
        for (name, rel) in &config.relationships {
            let Some(value) = attrs.shift_remove(name) else {
                continue;
            };
            if rel.read_only {
                continue;
            }
            let target = rel.target.resolve(&attrs);

            let rel_path = format!("{}/{}", path, name);
            let data = match &value {
                Value::Array(items) => {
                    let mut refs = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        let item_path = format!("{}/{}", rel_path, i);
                        if let Some(envelope) = self.build_resource(target.as_deref(), item, &item_path)? {
                            refs.push(envelope.into_reference());
                        }
                    }
                    Value::Array(refs)
                }
                other => self
                    .build_resource(target.as_deref(), other, &rel_path)?
                    .map(Envelope::into_reference)
                    .unwrap_or(Value::Null),
            };
            relationships.insert(name.clone(), json!({ "data": data }));
        }

        let snapshot = attrs.clone();
        for (name, field) in &config.fields {
            if field.read_only {
                attrs.shift_remove(name);
                continue;
            }
            let Some(hook) = &field.serialize else {
                continue;
            };
            if let Some(current) = attrs.get_mut(name) {
                let serialized = hook(&*current, &snapshot);
                *current = serialized;
            }
        }

        Ok(Some(Envelope {
            resource_type,
            id,
            attributes: attrs,
            relationships,
            schemaless: false,
        }))
    }
}

fn index_entry(index: &mut HashMap<String, Vec<String>>, name: &str, key: &str) {
    let keys = index.entry(name.to_string()).or_default();
    if !keys.iter().any(|existing| existing == key) {
        keys.push(key.to_string());
    }
}

impl From<Schema> for Serializer {
    fn from(schema: Schema) -> Self {
        Serializer::new(schema)
    }
}
