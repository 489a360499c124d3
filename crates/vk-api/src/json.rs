//! JSON helpers and the typed-response converter pipeline
//!
//! Typed calls run the `response` subtree through a fixed sequence of
//! `JsonConverter`s before handing it to serde. The sequence is assembled per
//! call in a `DeserializeOptions` value; nothing here is global or mutable.
//!
//! Order: caller converters, then `SnakeCaseKeys`, `UnixTimestamps`,
//! `AttachmentResolver`. Field-level tolerance (unknown enum strings,
//! timestamp fields) is handled by the serde helpers `tolerant_enum` and
//! `unix_time`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::constants::HIDDEN_KEYS;
use crate::error::{Error, Result};

const HIDDEN: &str = "***HIDDEN***";

/// One step of the pre-deserialization pipeline.
pub trait JsonConverter: Send + Sync {
    fn name(&self) -> &'static str;
    fn convert(&self, value: Value) -> Result<Value>;
}

/// Rewrites every object key to snake_case.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseKeys;

impl JsonConverter for SnakeCaseKeys {
    fn name(&self) -> &'static str {
        "snake_case_keys"
    }

    fn convert(&self, value: Value) -> Result<Value> {
        Ok(map_objects(value, &mut |object| {
            object
                .into_iter()
                .map(|(k, v)| (to_snake_case(&k), v))
                .collect()
        }))
    }
}

/// Turns numeric strings under date-like keys (`date`, `*_date`, `*_time`,
/// `*_at`) into integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixTimestamps;

impl UnixTimestamps {
    fn is_timestamp_key(key: &str) -> bool {
        key == "date" || key.ends_with("_date") || key.ends_with("_time") || key.ends_with("_at")
    }
}

impl JsonConverter for UnixTimestamps {
    fn name(&self) -> &'static str {
        "unix_timestamps"
    }

    fn convert(&self, value: Value) -> Result<Value> {
        Ok(map_objects(value, &mut |object| {
            object
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) if Self::is_timestamp_key(&k) => {
                            match s.trim().parse::<i64>() {
                                Ok(n) => Value::from(n),
                                Err(_) => Value::String(s),
                            }
                        }
                        other => other,
                    };
                    (k, v)
                })
                .collect()
        }))
    }
}

/// Inside `attachments` arrays, moves the payload stored under the key named
/// by `type` to `content`, so attachments deserialize as an adjacently
/// tagged enum (`#[serde(tag = "type", content = "content")]`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentResolver;

impl AttachmentResolver {
    fn resolve(item: Value) -> Value {
        let Value::Object(mut object) = item else {
            return item;
        };
        let kind = object.get("type").and_then(Value::as_str).map(str::to_string);
        if let Some(kind) = kind {
            if let Some(content) = object.remove(&kind) {
                object.insert("content".to_string(), content);
            }
        }
        Value::Object(object)
    }
}

impl JsonConverter for AttachmentResolver {
    fn name(&self) -> &'static str {
        "attachment_resolver"
    }

    fn convert(&self, value: Value) -> Result<Value> {
        Ok(map_objects(value, &mut |object| {
            object
                .into_iter()
                .map(|(k, v)| match (k.as_str(), v) {
                    ("attachments", Value::Array(items)) => (
                        k,
                        Value::Array(items.into_iter().map(Self::resolve).collect()),
                    ),
                    (_, v) => (k, v),
                })
                .collect()
        }))
    }
}

/// Apply `f` to every object in the tree, children first.
fn map_objects(value: Value, f: &mut dyn FnMut(Map<String, Value>) -> Map<String, Value>) -> Value {
    match value {
        Value::Object(object) => {
            let children: Map<String, Value> = object
                .into_iter()
                .map(|(k, v)| (k, map_objects(v, f)))
                .collect();
            Value::Object(f(children))
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| map_objects(v, f)).collect()),
        other => other,
    }
}

/// Converter pipeline for one typed call.
#[derive(Clone)]
pub struct DeserializeOptions {
    converters: Vec<Arc<dyn JsonConverter>>,
}

impl DeserializeOptions {
    /// Caller converters followed by the built-in pipeline.
    pub fn pipeline(caller: Vec<Arc<dyn JsonConverter>>) -> Self {
        let mut converters = caller;
        converters.push(Arc::new(SnakeCaseKeys));
        converters.push(Arc::new(UnixTimestamps));
        converters.push(Arc::new(AttachmentResolver));
        Self { converters }
    }

    pub fn converter_names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        self.converters.iter().try_fold(value, |v, c| c.convert(v))
    }

    pub fn deserialize<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        let value = self.apply(value)?;
        serde_json::from_value(value).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self::pipeline(Vec::new())
    }
}

impl std::fmt::Debug for DeserializeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeserializeOptions")
            .field("converters", &self.converter_names())
            .finish()
    }
}

/// `PascalCase`/`camelCase` to `snake_case`. Already snake_case input is
/// returned unchanged.
pub fn to_snake_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if c.is_uppercase() {
            if prev.is_some_and(|p| p != '_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// Join the non-blank items with `separator`.
pub fn join_non_empty<I, S>(items: I, separator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .filter(|s| !s.as_ref().trim().is_empty())
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Indented JSON with credentials hidden. Non-JSON input is returned as is.
pub fn pretty_print_json(json: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(json) else {
        return json.to_string();
    };
    if let Value::Object(object) = &mut value {
        for key in HIDDEN_KEYS {
            if let Some(v) = object.get_mut(*key) {
                *v = Value::String(HIDDEN.to_string());
            }
        }
    }
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| json.to_string())
}

/// Deserialize an enum field, mapping values the enum does not know to
/// `None` instead of failing the whole response.
///
/// Use with `#[serde(default, deserialize_with = "tolerant_enum")]`.
pub fn tolerant_enum<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Unix timestamp (seconds) as `SystemTime`. Accepts numbers and numeric
/// strings.
pub mod unix_time {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let seconds = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| D::Error::custom("expected a unix timestamp"))?;
        Ok(UNIX_EPOCH + Duration::from_secs(seconds))
    }

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let seconds = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        serializer.serialize_u64(seconds)
    }
}
