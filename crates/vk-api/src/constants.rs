//! VK API endpoint and standard parameter names

use std::time::Duration;

/// Method dispatch URL; the method name is appended.
pub const API_URL: &str = "https://api.vk.com/method/";

/// Protocol version sent as `v` on every method call.
pub const API_VERSION: &str = "5.199";

pub const VERSION_PARAM: &str = "v";
pub const ACCESS_TOKEN_PARAM: &str = "access_token";
pub const LANGUAGE_PARAM: &str = "lang";
pub const CAPTCHA_SID_PARAM: &str = "captcha_sid";
pub const CAPTCHA_KEY_PARAM: &str = "captcha_key";

/// VK allows three requests per second for user tokens.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 3;

/// Subtracted from the reported token lifetime when arming the expiry alarm.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(10);

/// Keys hidden in pretty-printed responses.
pub const HIDDEN_KEYS: &[&str] = &["access_token", "new_password", "old_password"];
