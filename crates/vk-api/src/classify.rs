//! Remote error classification
//!
//! Maps the numeric `error_code` of a failure envelope to the most specific
//! `ApiError` variant. The mapping is a closed table of `Registration`s, each
//! declaring the codes its kind owns. The lookup map is built once on first
//! use and is read-only afterwards.
//!
//! Codes nobody registered classify to `ApiError::Generic`, which carries the
//! remote code and message unchanged.

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::warn;

use crate::remote::RemoteError;

/// Classified remote error. Every variant carries the original payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("captcha needed (sid {captcha_sid}): {}", .remote.message)]
    CaptchaNeeded {
        remote: RemoteError,
        captcha_sid: u64,
        captcha_img: String,
    },

    #[error("validation required, continue at {redirect_uri}")]
    ValidationRequired {
        remote: RemoteError,
        redirect_uri: String,
    },

    #[error("user authorization failed: {}", .0.message)]
    TokenInvalid(RemoteError),

    #[error("too many requests ({}): {}", .0.code, .0.message)]
    RateLimited(RemoteError),

    #[error("flood control: {}", .0.message)]
    FloodControl(RemoteError),

    #[error("post limit exceeded: {}", .0.message)]
    PostLimitExceeded(RemoteError),

    #[error("permission denied ({}): {}", .0.code, .0.message)]
    PermissionDenied(RemoteError),

    #[error("unknown method: {}", .0.message)]
    UnknownMethod(RemoteError),

    #[error("invalid parameter ({}): {}", .0.code, .0.message)]
    InvalidParameter(RemoteError),

    #[error("user was banned: {}", .0.message)]
    UserBanned(RemoteError),

    #[error("server error ({}): {}", .0.code, .0.message)]
    ServerError(RemoteError),

    #[error("remote error {}: {}", .0.code, .0.message)]
    Generic(RemoteError),
}

/// Discriminant of `ApiError`, usable as a map key or metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CaptchaNeeded,
    ValidationRequired,
    TokenInvalid,
    RateLimited,
    FloodControl,
    PostLimitExceeded,
    PermissionDenied,
    UnknownMethod,
    InvalidParameter,
    UserBanned,
    ServerError,
    Generic,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::CaptchaNeeded => "captcha_needed",
            ErrorKind::ValidationRequired => "validation_required",
            ErrorKind::TokenInvalid => "token_invalid",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::FloodControl => "flood_control",
            ErrorKind::PostLimitExceeded => "post_limit_exceeded",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::UnknownMethod => "unknown_method",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::UserBanned => "user_banned",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Generic => "generic",
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::CaptchaNeeded { .. } => ErrorKind::CaptchaNeeded,
            ApiError::ValidationRequired { .. } => ErrorKind::ValidationRequired,
            ApiError::TokenInvalid(_) => ErrorKind::TokenInvalid,
            ApiError::RateLimited(_) => ErrorKind::RateLimited,
            ApiError::FloodControl(_) => ErrorKind::FloodControl,
            ApiError::PostLimitExceeded(_) => ErrorKind::PostLimitExceeded,
            ApiError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ApiError::UnknownMethod(_) => ErrorKind::UnknownMethod,
            ApiError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            ApiError::UserBanned(_) => ErrorKind::UserBanned,
            ApiError::ServerError(_) => ErrorKind::ServerError,
            ApiError::Generic(_) => ErrorKind::Generic,
        }
    }

    /// The payload this error was built from.
    pub fn remote(&self) -> &RemoteError {
        match self {
            ApiError::CaptchaNeeded { remote, .. }
            | ApiError::ValidationRequired { remote, .. } => remote,
            ApiError::TokenInvalid(r)
            | ApiError::RateLimited(r)
            | ApiError::FloodControl(r)
            | ApiError::PostLimitExceeded(r)
            | ApiError::PermissionDenied(r)
            | ApiError::UnknownMethod(r)
            | ApiError::InvalidParameter(r)
            | ApiError::UserBanned(r)
            | ApiError::ServerError(r)
            | ApiError::Generic(r) => r,
        }
    }

    pub fn code(&self) -> i64 {
        self.remote().code
    }

    pub fn message(&self) -> &str {
        &self.remote().message
    }

    /// A validation-required error for a redirect that did not produce a
    /// token.
    pub fn validation_required(redirect_uri: impl Into<String>) -> Self {
        let redirect_uri = redirect_uri.into();
        let mut remote = RemoteError::new(17, "Validation required");
        remote.redirect_uri = Some(redirect_uri.clone());
        ApiError::ValidationRequired {
            remote,
            redirect_uri,
        }
    }
}

/// How a registered kind is built from its payload.
enum Builder {
    Simple(fn(RemoteError) -> ApiError),
    /// May reject the payload (missing context fields); the payload is handed
    /// back for the generic fallback.
    Checked(fn(RemoteError) -> Result<ApiError, RemoteError>),
}

struct Registration {
    kind: ErrorKind,
    codes: &'static [i64],
    builder: Builder,
}

const REGISTRATIONS: &[Registration] = &[
    Registration {
        kind: ErrorKind::CaptchaNeeded,
        codes: &[14],
        builder: Builder::Checked(build_captcha),
    },
    Registration {
        kind: ErrorKind::ValidationRequired,
        codes: &[17],
        builder: Builder::Checked(build_validation),
    },
    Registration {
        kind: ErrorKind::TokenInvalid,
        codes: &[5],
        builder: Builder::Simple(ApiError::TokenInvalid),
    },
    Registration {
        kind: ErrorKind::RateLimited,
        codes: &[6, 29],
        builder: Builder::Simple(ApiError::RateLimited),
    },
    Registration {
        kind: ErrorKind::FloodControl,
        codes: &[9],
        builder: Builder::Simple(ApiError::FloodControl),
    },
    Registration {
        kind: ErrorKind::PostLimitExceeded,
        codes: &[214],
        builder: Builder::Simple(ApiError::PostLimitExceeded),
    },
    Registration {
        kind: ErrorKind::PermissionDenied,
        codes: &[7, 15],
        builder: Builder::Simple(ApiError::PermissionDenied),
    },
    Registration {
        kind: ErrorKind::UnknownMethod,
        codes: &[3],
        builder: Builder::Simple(ApiError::UnknownMethod),
    },
    Registration {
        kind: ErrorKind::InvalidParameter,
        codes: &[100, 113],
        builder: Builder::Simple(ApiError::InvalidParameter),
    },
    Registration {
        kind: ErrorKind::UserBanned,
        codes: &[18],
        builder: Builder::Simple(ApiError::UserBanned),
    },
    Registration {
        kind: ErrorKind::ServerError,
        codes: &[1, 10],
        builder: Builder::Simple(ApiError::ServerError),
    },
    // Generic owns no codes; it is the fallback.
    Registration {
        kind: ErrorKind::Generic,
        codes: &[],
        builder: Builder::Simple(ApiError::Generic),
    },
];

static REGISTRY: LazyLock<HashMap<i64, &'static Registration>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for registration in REGISTRATIONS {
        for &code in registration.codes {
            if let Some(existing) = map.insert(code, registration) {
                warn!(
                    code,
                    kept = registration.kind.label(),
                    replaced = existing.kind.label(),
                    "error code registered twice"
                );
            }
        }
    }
    map
});

fn build_captcha(remote: RemoteError) -> Result<ApiError, RemoteError> {
    match (remote.captcha_sid, remote.captcha_img.clone()) {
        (Some(captcha_sid), Some(captcha_img)) => Ok(ApiError::CaptchaNeeded {
            remote,
            captcha_sid,
            captcha_img,
        }),
        _ => Err(remote),
    }
}

fn build_validation(remote: RemoteError) -> Result<ApiError, RemoteError> {
    match remote.redirect_uri.clone() {
        Some(redirect_uri) => Ok(ApiError::ValidationRequired {
            remote,
            redirect_uri,
        }),
        None => Err(remote),
    }
}

/// Classify a remote error by its code.
pub fn classify(remote: RemoteError) -> ApiError {
    let Some(registration) = REGISTRY.get(&remote.code) else {
        return ApiError::Generic(remote);
    };
    match registration.builder {
        Builder::Simple(build) => build(remote),
        Builder::Checked(build) => build(remote).unwrap_or_else(|remote| {
            warn!(
                code = remote.code,
                kind = registration.kind.label(),
                "error payload lacks required fields, using generic kind"
            );
            ApiError::Generic(remote)
        }),
    }
}
