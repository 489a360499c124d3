//! VK OAuth endpoints and wire constants
//!
//! The client id/secret pair is supplied by the embedding application; none
//! are baked in here.

/// Token endpoint for the direct (password) grant
pub const TOKEN_ENDPOINT: &str = "https://oauth.vk.com/token";

/// Grant type for direct authorization with login and password
pub const PASSWORD_GRANT: &str = "password";

/// Asks the endpoint to answer `need_validation` instead of failing outright
/// when the account has two-factor authentication enabled.
pub const TWO_FACTOR_SUPPORTED: &str = "2fa_supported";

/// OAuth error code for a captcha challenge
pub const ERROR_NEED_CAPTCHA: &str = "need_captcha";

/// OAuth error code for device/phone or 2FA confirmation
pub const ERROR_NEED_VALIDATION: &str = "need_validation";

/// Prefix of `validation_type` values that a one-time code can satisfy
/// (`2fa_sms`, `2fa_app`).
pub const TWO_FACTOR_VALIDATION_PREFIX: &str = "2fa";
