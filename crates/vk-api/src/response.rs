//! Untyped response tree
//!
//! `VkResponse` wraps the `response` subtree of a successful call. Indexing a
//! missing key or index yields a null node, so chained lookups never fail;
//! the typed accessors are where shape errors surface, as
//! `Error::TypeMismatch`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::json::DeserializeOptions;

/// JSON type name for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::TypeMismatch {
        expected,
        found: type_name(value),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VkResponse {
    value: Value,
    raw_json: Option<String>,
}

impl VkResponse {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            raw_json: None,
        }
    }

    /// Response that remembers the body it was parsed from.
    pub fn with_raw(value: Value, raw_json: impl Into<String>) -> Self {
        Self {
            value,
            raw_json: Some(raw_json.into()),
        }
    }

    /// Full response body, kept only on the root node.
    pub fn raw_json(&self) -> Option<&str> {
        self.raw_json.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Child under `key`; null when absent or when this node is not an
    /// object.
    pub fn get(&self, key: &str) -> VkResponse {
        VkResponse::new(self.value.get(key).cloned().unwrap_or(Value::Null))
    }

    /// Element at `index`; null when out of range or not an array.
    pub fn at(&self, index: usize) -> VkResponse {
        VkResponse::new(self.value.get(index).cloned().unwrap_or(Value::Null))
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.value.get(key).is_some()
    }

    /// `true`/`false`, or the integers `1`/`0` VK uses for flags.
    pub fn as_bool(&self) -> Result<bool> {
        match &self.value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.value
            .as_i64()
            .ok_or_else(|| mismatch("integer", &self.value))
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.value
            .as_u64()
            .ok_or_else(|| mismatch("unsigned integer", &self.value))
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.value
            .as_f64()
            .ok_or_else(|| mismatch("number", &self.value))
    }

    pub fn as_str(&self) -> Result<&str> {
        self.value
            .as_str()
            .ok_or_else(|| mismatch("string", &self.value))
    }

    pub fn as_array(&self) -> Result<Vec<VkResponse>> {
        match &self.value {
            Value::Array(items) => Ok(items.iter().cloned().map(VkResponse::new).collect()),
            other => Err(mismatch("array", other)),
        }
    }

    /// Run the converter pipeline and deserialize into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self, options: &DeserializeOptions) -> Result<T> {
        options.deserialize(self.value.clone())
    }
}

impl From<Value> for VkResponse {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> VkResponse {
        VkResponse::new(json!({
            "count": 2,
            "items": [{"id": 1, "text": "a"}, {"id": 2, "text": "b"}],
            "can_post": 1,
            "rating": 4.5
        }))
    }

    #[test]
    fn missing_keys_are_null() {
        let r = sample();
        assert!(r.get("nope").is_null());
        assert!(r.get("nope").get("deeper").is_null());
        assert!(r.get("items").at(7).is_null());
    }

    #[test]
    fn typed_accessors() {
        let r = sample();
        assert_eq!(r.get("count").as_i64().unwrap(), 2);
        assert_eq!(r.get("count").as_u64().unwrap(), 2);
        assert!(r.get("can_post").as_bool().unwrap());
        assert_eq!(r.get("rating").as_f64().unwrap(), 4.5);
        let items = r.get("items").as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get("text").as_str().unwrap(), "b");
    }

    #[test]
    fn accessors_do_not_coerce() {
        let r = VkResponse::new(json!({"id": "15", "flag": "1", "n": 2}));
        assert!(matches!(
            r.get("id").as_i64(),
            Err(Error::TypeMismatch {
                expected: "integer",
                found: "string"
            })
        ));
        assert!(r.get("flag").as_bool().is_err());
        assert!(r.get("n").as_bool().is_err());
        assert!(matches!(
            r.get("missing").as_str(),
            Err(Error::TypeMismatch { found: "null", .. })
        ));
    }

    #[test]
    fn deserializes_through_pipeline() {
        #[derive(serde::Deserialize)]
        struct Item {
            id: i64,
        }
        let r = VkResponse::new(json!([{"Id": 4}]));
        let items: Vec<Item> = r.deserialize(&DeserializeOptions::default()).unwrap();
        assert_eq!(items[0].id, 4);
    }

    #[test]
    fn raw_json_only_on_root() {
        let r = VkResponse::with_raw(json!({"a": 1}), r#"{"response":{"a":1}}"#);
        assert_eq!(r.raw_json(), Some(r#"{"response":{"a":1}}"#));
        assert!(r.get("a").raw_json().is_none());
    }
}
