//! Pluggable authorization flow and validation seams
//!
//! The session delegates the network part of a login to an
//! `AuthorizationFlow`. `DirectAuthFlow` (in `token`) is the shipped
//! implementation; an HTML-form implicit flow or a test double plugs in the
//! same way.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::AuthParams;

/// Answer to a captcha challenge: the challenge id and the recognized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaAnswer {
    pub sid: u64,
    pub key: String,
}

/// Successful login as reported by the token endpoint.
///
/// `expires_in` is a delta in seconds; `0` means the token does not expire
/// (the `offline` scope).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub expires_in: u64,
}

/// Exchanges login credentials for an access token.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn AuthorizationFlow>`).
pub trait AuthorizationFlow: Send + Sync {
    /// Run one login attempt. `captcha` is set only on the retry that follows
    /// a `CaptchaNeeded` error.
    fn authorize<'a>(
        &'a self,
        params: &'a AuthParams,
        captcha: Option<&'a CaptchaAnswer>,
    ) -> Pin<Box<dyn Future<Output = Result<AuthorizationResult>> + Send + 'a>>;
}

/// New token obtained by passing a validation (phone/device confirmation).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub access_token: String,
    pub user_id: Option<i64>,
}

/// Completes a validation redirect, typically by driving a browser or asking
/// the user to confirm on another device.
pub trait ValidationHandler: Send + Sync {
    fn validate<'a>(
        &'a self,
        redirect_uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ValidationResult>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_result_deserializes_token_response() {
        let json = r#"{"access_token":"vk1.a.abc","expires_in":86400,"user_id":42}"#;
        let result: AuthorizationResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.access_token, "vk1.a.abc");
        assert_eq!(result.expires_in, 86400);
        assert_eq!(result.user_id, Some(42));
    }

    #[test]
    fn missing_fields_default() {
        let result: AuthorizationResult = serde_json::from_str("{}").unwrap();
        assert!(result.access_token.is_empty());
        assert_eq!(result.expires_in, 0);
        assert!(result.user_id.is_none());
    }
}
