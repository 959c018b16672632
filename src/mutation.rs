//! Request planning for create/update/delete calls.
//!
//! Nothing here performs I/O. [`plan_mutation`] produces the URL, method and
//! body a transport should send plus the resource types whose cached queries
//! become stale; [`complete_mutation`] turns the transport's response back
//! into plain objects.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SerializeError;
use crate::query::parse_query_arg;
use crate::serializer::Serializer;
use crate::type_map::resolve_query_type_map;

/// HTTP method of a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(format!(
                "unsupported method '{}', expected POST, PATCH, PUT or DELETE",
                s
            )),
        }
    }
}

/// Caller choices for [`plan_mutation`].
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    pub method: Method,
    /// Extra type names to invalidate after the mutation succeeds.
    pub invalidate: Vec<String>,
}

impl MutationOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn invalidate(mut self, type_name: impl Into<String>) -> Self {
        self.invalidate.push(type_name.into());
        self
    }
}

/// A planned mutation, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRequest {
    pub url: String,
    pub method: Method,
    /// Compact JSON text of the serialized document.
    pub body: String,
    /// Resource types whose cached queries are stale once the call succeeds.
    /// The mutated type comes first.
    pub invalidates: Vec<String>,
}

/// Plan a mutation of the resource addressed by `descriptor`.
///
/// The resource type is the base type of the descriptor's type map, and
/// `attrs` is serialized with it. Invalidation covers the resource type,
/// every related type from the path, `include` and payload, then
/// `options.invalidate`, without duplicates.
///
/// ```
/// use jsonapi_schema::{plan_mutation, Method, MutationOptions, Schema, Serializer};
/// use serde_json::json;
///
/// let serializer = Serializer::new(Schema::from_value(&json!({ "todos": {} })));
/// let request = plan_mutation(
///     &serializer,
///     &json!(["todos"]),
///     &json!({ "title": "New Todo" }),
///     &MutationOptions::default().method(Method::Patch).invalidate("users"),
/// )
/// .unwrap();
///
/// assert_eq!(request.url, "/todos");
/// assert_eq!(request.method, Method::Patch);
/// assert_eq!(request.body, r#"{"data":{"type":"todos","attributes":{"title":"New Todo"}}}"#);
/// assert_eq!(request.invalidates, vec!["todos", "users"]);
/// ```
///
/// # Errors
///
/// `SerializeError::UnresolvedType` when the descriptor names no type, and
/// `SerializeError::InvalidResource` when `attrs` is not resource-shaped.
pub fn plan_mutation(
    serializer: &Serializer,
    descriptor: &Value,
    attrs: &Value,
    options: &MutationOptions,
) -> Result<MutationRequest, SerializeError> {
    let query = parse_query_arg(descriptor);
    let type_map = resolve_query_type_map(&query, serializer.schema(), Some(attrs));
    let Some(resource_type) = type_map.resource_type.as_deref() else {
        return Err(SerializeError::UnresolvedType {
            descriptor: descriptor.to_string(),
        });
    };

    let document = serializer.serialize(resource_type, attrs)?;

    let mut invalidates = type_map.all_types();
    for name in &options.invalidate {
        if !invalidates.contains(name) {
            invalidates.push(name.clone());
        }
    }

    debug!(
        url = query.url.as_str(),
        method = options.method.as_str(),
        invalidates = ?invalidates,
        "planned mutation"
    );

    Ok(MutationRequest {
        url: query.url,
        method: options.method,
        body: document.to_string(),
        invalidates,
    })
}

/// Interpret a transport response to a mutation.
///
/// An empty response (absent or `null`) means success without content.
pub fn complete_mutation(serializer: &Serializer, response: Option<&Value>) -> Value {
    match response {
        None | Some(Value::Null) => json!({ "success": true }),
        Some(document) => serializer.deserialize(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn serializer() -> Serializer {
        Serializer::new(Schema::from_value(&json!({
            "todos": { "relationships": { "user": "users" } },
            "users": {}
        })))
    }

    #[test]
    fn method_parsing() {
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert_eq!("DELETE".parse::<Method>(), Ok(Method::Delete));
        assert!("GET".parse::<Method>().is_err());
        assert_eq!(Method::default(), Method::Post);
        assert_eq!(serde_json::to_value(Method::Put).unwrap(), json!("PUT"));
    }

    #[test]
    fn default_plan_posts_to_collection() {
        let request = plan_mutation(
            &serializer(),
            &json!(["todos"]),
            &json!({ "title": "New Todo" }),
            &MutationOptions::default(),
        )
        .unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "/todos");
        assert_eq!(request.invalidates, vec!["todos"]);
    }

    #[test]
    fn payload_relationships_are_invalidated() {
        let request = plan_mutation(
            &serializer(),
            &json!("todos/1"),
            &json!({ "id": 1, "user": { "id": 2 } }),
            &MutationOptions::default().method(Method::Patch).invalidate("todos"),
        )
        .unwrap();
        assert_eq!(request.url, "/todos/1");
        assert_eq!(request.invalidates, vec!["todos", "users"]);
        assert_eq!(
            request.body,
            r#"{"data":{"type":"todos","id":"1","relationships":{"user":{"data":{"type":"users","id":"2"}}}}}"#
        );
    }

    #[test]
    fn empty_descriptor_has_no_type() {
        let err = plan_mutation(&serializer(), &json!(""), &json!({}), &MutationOptions::default())
            .unwrap_err();
        assert!(matches!(err, SerializeError::UnresolvedType { .. }));
    }

    #[test]
    fn empty_response_is_success() {
        assert_eq!(complete_mutation(&serializer(), None), json!({ "success": true }));
        assert_eq!(
            complete_mutation(&serializer(), Some(&Value::Null)),
            json!({ "success": true })
        );
    }

    #[test]
    fn response_is_deserialized() {
        let response = json!({ "data": { "type": "todos", "id": "2", "attributes": { "title": "New" } } });
        assert_eq!(
            complete_mutation(&serializer(), Some(&response)),
            json!({ "data": { "id": "2", "title": "New" } })
        );
    }
}
