//! Shared value helpers and resource identity.

use serde_json::{Number, Value};

/// Attribute key that overrides the resource type during serialization.
pub const TYPE_OVERRIDE_KEY: &str = "_type";

/// Status used for wrapped `error` documents that carry no status of their own.
pub const DEFAULT_ERROR_STATUS: &str = "400";

/// Status of validation errors, which are returned as a list rather than a single error.
pub const VALIDATION_ERROR_STATUS: &str = "422";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Loose truthiness used throughout the wire format.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy. Everything else, including
/// empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Same as [`is_truthy`] but treats a missing value as falsy.
pub fn is_truthy_opt(value: Option<&Value>) -> bool {
    value.map(is_truthy).unwrap_or(false)
}

/// Render a value the way it appears when embedded in text (ids, URLs, statuses).
///
/// Strings are returned verbatim, integral numbers lose their fractional part,
/// arrays are joined with commas and objects render as `[object Object]`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn display_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Build a JSON number from a float, mapping non-finite results to `null`.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Identity of a resource within a document: the `(type, id)` pair.
///
/// Both parts are rendered with [`display_value`] so numeric and string ids
/// compare equal. A missing or `null` part is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub resource_type: Option<String>,
    pub id: Option<String>,
}

impl ResourceKey {
    /// Key of a resource or resource reference object.
    pub fn of(resource: &Value) -> Self {
        Self {
            resource_type: key_part(resource.get("type")),
            id: key_part(resource.get("id")),
        }
    }
}

fn key_part(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(display_value(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy_opt(None));
    }

    #[test]
    fn display_values() {
        assert_eq!(display_value(&json!("abc")), "abc");
        assert_eq!(display_value(&json!(12)), "12");
        assert_eq!(display_value(&json!(1.0)), "1");
        assert_eq!(display_value(&json!(3.5)), "3.5");
        assert_eq!(display_value(&json!([1, "a", null])), "1,a,");
        assert_eq!(display_value(&json!({"a": 1})), "[object Object]");
        assert_eq!(display_value(&json!(true)), "true");
    }

    #[test]
    fn number_values() {
        assert_eq!(number_value(3.0), json!(3));
        assert_eq!(number_value(3.25), json!(3.25));
        assert_eq!(number_value(f64::NAN), Value::Null);
        assert_eq!(number_value(f64::INFINITY), Value::Null);
    }

    #[test]
    fn resource_keys_ignore_id_representation() {
        let a = ResourceKey::of(&json!({"type": "users", "id": 1}));
        let b = ResourceKey::of(&json!({"type": "users", "id": "1"}));
        assert_eq!(a, b);

        let missing = ResourceKey::of(&json!({"type": "users"}));
        assert_eq!(missing.id, None);
    }
}
