//! Remote error envelope
//!
//! A failed method call answers `{"error": {...}}` instead of
//! `{"response": ...}`. `parse_envelope` turns the raw body into either the
//! parsed JSON object or a classified `Error::Api`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::classify::classify;
use crate::error::{Error, Result};

/// One entry of the `request_params` echo in an error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParam {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Error object reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(rename = "error_code")]
    pub code: i64,
    #[serde(rename = "error_msg", default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_params: Vec<RequestParam>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub captcha_sid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_params: Vec::new(),
            captcha_sid: None,
            captcha_img: None,
            redirect_uri: None,
        }
    }

    /// Serialize as a complete failure envelope, `{"error": {...}}`.
    pub fn to_envelope(&self) -> Value {
        serde_json::json!({ "error": self })
    }
}

/// `captcha_sid` is sent as a number by most methods and as a string by some.
fn lenient_u64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parse a raw response body.
///
/// Returns the root object on success. Invalid JSON and non-object roots are
/// `MalformedResponse`; an `error` object is classified and returned as
/// `Error::Api`.
pub fn parse_envelope(body: &str) -> Result<Value> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {e}")))?;

    let Value::Object(ref root) = json else {
        return Err(Error::MalformedResponse(format!(
            "expected a JSON object, got {}",
            crate::response::type_name(&json)
        )));
    };

    if let Some(error) = root.get("error") {
        let remote: RemoteError = serde_json::from_value(error.clone())
            .map_err(|e| Error::MalformedResponse(format!("invalid error object: {e}")))?;
        return Err(Error::Api(classify(remote)));
    }

    Ok(json)
}
