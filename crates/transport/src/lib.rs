//! HTTP transport abstraction for VK API calls
//!
//! Defines the `Transport` trait that decouples the invocation engine from the
//! HTTP client. `HttpTransport` is the reqwest-backed implementation; tests
//! and embedders can plug in anything that can POST a form and hand back text.

pub mod http;

pub use http::HttpTransport;

use std::future::Future;
use std::pin::Pin;

/// Outcome of a single POST round trip.
///
/// `message` carries an HTTP-layer failure description. The invoker gives it
/// priority over `value`, so a transport failure flows through the same parse
/// path as a normal body and surfaces as a malformed response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportResponse {
    pub is_success: bool,
    pub value: Option<String>,
    pub message: Option<String>,
}

impl TransportResponse {
    pub fn success(value: impl Into<String>) -> Self {
        Self {
            is_success: true,
            value: Some(value.into()),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            value: None,
            message: Some(message.into()),
        }
    }

    /// The text the invoker should parse: `message` if present, else `value`.
    pub fn body(&self) -> &str {
        self.message
            .as_deref()
            .or(self.value.as_deref())
            .unwrap_or_default()
    }
}

/// Errors constructing a transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Result alias for transport construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Form-POST transport used by the invoker for method and long-poll calls.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Transport>`). Dropping the returned future abandons the request.
pub trait Transport: Send + Sync {
    /// POST `fields` as `application/x-www-form-urlencoded` to `url`.
    fn post<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = TransportResponse> + Send + 'a>>;
}
