//! VK API invocation and authorization engine
//!
//! `VkApi` issues method calls against the VK API with client-side rate
//! limiting, captcha challenge-response retry and typed error classification.
//! Its `Session` owns the access token, obtains it through a pluggable
//! `vk_auth::AuthorizationFlow` or accepts one from the caller, and renews or
//! clears it from a background alarm when it expires.
//!
//! Call lifecycle:
//! 1. Caller builds `VkParameters` and calls `VkApi::call` (or `invoke`,
//!    `call_typed`, a category façade)
//! 2. Session supplies the token; none → `Error::AccessDenied`, no request
//! 3. `RateLimiter` grants a permit
//! 4. `transport::Transport` POSTs the form
//! 5. Failure envelopes are classified into `ApiError`
//! 6. A captcha challenge is solved and the call repeated once

mod alarm;
pub mod api;
pub mod captcha;
pub mod categories;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod json;
pub mod language;
pub mod metrics;
pub mod params;
pub mod rate_limit;
pub mod remote;
pub mod response;
pub mod session;

#[cfg(test)]
mod test_support;

pub use api::{VkApi, VkApiBuilder};
pub use captcha::{CaptchaHandler, CaptchaSolver};
pub use classify::{ApiError, ErrorKind, classify};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use json::{DeserializeOptions, JsonConverter};
pub use language::Language;
pub use params::VkParameters;
pub use rate_limit::RateLimiter;
pub use remote::{RemoteError, RequestParam, parse_envelope};
pub use response::VkResponse;
pub use session::{Session, SessionEvent, SessionStatus};
