//! Error types for VK authorization flows

/// Errors from authorization flows and validation handlers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("captcha needed (sid {captcha_sid})")]
    CaptchaNeeded {
        captcha_sid: u64,
        captcha_img: String,
    },

    #[error("validation needed at {redirect_uri}")]
    NeedValidation {
        redirect_uri: String,
        validation_type: Option<String>,
    },

    #[error("two-factor provider failed: {0}")]
    TwoFactor(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
