//! Error types for API invocation

use crate::classify::ApiError;

/// Errors from API calls and session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call that needs a token was made while the session is unauthorized.
    #[error("access denied: session is not authorized")]
    AccessDenied,

    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Error object returned by the remote API, classified by code.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("authorization flow error: {0}")]
    Auth(#[from] vk_auth::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("failed to deserialize response: {0}")]
    Deserialize(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("captcha solver failed: {0}")]
    CaptchaSolver(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Captcha challenge carried by this error, from either the API envelope
    /// or the OAuth endpoint.
    pub fn captcha_challenge(&self) -> Option<(u64, &str)> {
        match self {
            Error::Api(ApiError::CaptchaNeeded {
                captcha_sid,
                captcha_img,
                ..
            }) => Some((*captcha_sid, captcha_img.as_str())),
            Error::Auth(vk_auth::Error::CaptchaNeeded {
                captcha_sid,
                captcha_img,
            }) => Some((*captcha_sid, captcha_img.as_str())),
            _ => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Error::AccessDenied => "access_denied",
            Error::AuthorizationFailed(_) => "authorization_failed",
            Error::Api(e) => e.kind().label(),
            Error::Auth(_) => "auth",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Deserialize(_) => "deserialize",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::Config(_) => "config",
            Error::CaptchaSolver(_) => "captcha_solver",
            Error::Cancelled => "cancelled",
        }
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;
