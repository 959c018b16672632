//! JSON:API Schema Serializer
//!
//! Schema-driven conversion between JSON:API wire documents and nested
//! application objects.
//!
//! A schema describes, per resource type, which attributes are coerced to
//! which kind and which keys are relationships to other types. The
//! [`Serializer`] uses it in both directions: [`Serializer::serialize`]
//! splits an object into attributes and `{type, id}` references, and
//! [`Serializer::deserialize`] flattens a document (primary data plus
//! `included`) back into objects with relationships inlined.
//!
//! # Example
//!
//! ```
//! use jsonapi_schema::{Schema, Serializer};
//! use serde_json::json;
//!
//! let schema = Schema::from_value(&json!({
//!     "todos": {
//!         "fields": {
//!             "created": { "type": "date", "readOnly": true },
//!             "done": "boolean"
//!         },
//!         "relationships": { "user": "users" }
//!     },
//!     "users": { "fields": { "age": "number" } }
//! }));
//! let serializer = Serializer::new(schema);
//!
//! // Outgoing: read-only fields are dropped and related objects become references.
//! let doc = serializer
//!     .serialize("todos", &json!({
//!         "id": 1, "done": true, "created": "2022-01-01", "user": { "id": 7 }
//!     }))
//!     .unwrap();
//! assert_eq!(doc["data"]["attributes"], json!({ "done": true }));
//! assert_eq!(doc["data"]["relationships"]["user"]["data"], json!({ "type": "users", "id": "7" }));
//!
//! // Incoming: attributes are coerced and references resolved against `included`.
//! let objects = serializer.deserialize(&json!({
//!     "data": {
//!         "type": "todos", "id": "1",
//!         "attributes": { "done": "false", "created": "2022-01-01" },
//!         "relationships": { "user": { "data": { "type": "users", "id": "7" } } }
//!     },
//!     "included": [{ "type": "users", "id": "7", "attributes": { "age": "42" } }]
//! }));
//! assert_eq!(objects["data"], json!({
//!     "id": "1",
//!     "done": false,
//!     "created": "2022-01-01T00:00:00.000Z",
//!     "user": { "id": "7", "age": 42 }
//! }));
//! ```
//!
//! # Field Kinds
//!
//! | Kind | Incoming value |
//! |------|----------------|
//! | `"string"` | text form, `""` for null |
//! | `"number"` | leading integer |
//! | `"float"` | leading float |
//! | `"date"` | RFC 3339 UTC timestamp, `null` when unparseable |
//! | `"boolean"` | truthiness, with `"false"` as `false` |
//! | `"type"` | the resource's own wire type |
//!
//! # Paths
//!
//! [`parse_query_arg`] turns `"todos/1"` or `["todos", 1, { "include": "user" }]`
//! into a URL, id and parameters; [`resolve_query_type_map`] lists the
//! resource types such a request touches.

mod coerce;
mod deserializer;
mod error;
mod loader;
mod mutation;
mod query;
mod schema;
mod serializer;
mod type_map;
mod types;

pub use coerce::{coerce, format_date, parse_date, parse_float_prefix, parse_int_prefix, CoerceContext};
pub use error::{LoadError, SerializeError};
pub use loader::{load_json, load_json_auto, load_json_str, load_schema, STDIN_SOURCE};
pub use mutation::{complete_mutation, plan_mutation, Method, MutationOptions, MutationRequest};
pub use query::{
    is_id, is_uuid, parse_query_arg, parse_query_arg_with, stringify_params, ParsedQuery,
    QsEncoder, QueryEncoder,
};
pub use schema::{
    FieldKind, FieldSpec, RelSpec, RelTarget, ResolveHook, Schema, SerializeHook, TargetResolver,
    TypeConfig,
};
pub use serializer::Serializer;
pub use type_map::{collect_payload_types, resolve_query_type_map, resolve_type_chain, TypeMap};
pub use types::{display_value, is_truthy, json_type_name, ResourceKey};
