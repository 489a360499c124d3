//! VK authorization library
//!
//! Provides the authorization parameters, the pluggable flow and validation
//! seams, and the direct (password grant) flow used by the `vk-api` session.
//! This crate has no dependency on the invocation engine and can be tested and
//! used on its own.
//!
//! Login flow:
//! 1. Caller builds `params::AuthParams` (token or login/password)
//! 2. Session hands the params to a `flow::AuthorizationFlow`
//! 3. `token::DirectAuthFlow` POSTs the password grant, answering 2FA
//!    challenges with the params' `TwoFactorProvider`
//! 4. Captcha challenges come back as `Error::CaptchaNeeded`; the session
//!    solves them and calls the flow again with a `CaptchaAnswer`
//! 5. Validation redirects are completed by a `flow::ValidationHandler`

pub mod constants;
pub mod error;
pub mod flow;
pub mod params;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use flow::{
    AuthorizationFlow, AuthorizationResult, CaptchaAnswer, ValidationHandler, ValidationResult,
};
pub use params::{AuthParams, TwoFactorProvider};
pub use token::{DirectAuthFlow, form_fields, parse_token_response};
