//! Client metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.
//!
//! - `vk_api_calls_total` (counter): labels `method`, `outcome`
//! - `vk_api_errors_total` (counter): label `kind`
//! - `vk_captcha_retries_total` (counter)
//! - `vk_token_refresh_total` (counter): label `outcome`
//! - `vk_rate_limit_wait_seconds` (histogram)

use std::time::Duration;

/// Record a finished method call. `outcome` is `ok` or an error label.
pub fn record_call(method: &str, outcome: &'static str) {
    metrics::counter!("vk_api_calls_total", "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("vk_api_errors_total", "kind" => kind).increment(1);
}

pub fn record_captcha_retry() {
    metrics::counter!("vk_captcha_retries_total").increment(1);
}

pub fn record_token_refresh(outcome: &'static str) {
    metrics::counter!("vk_token_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limit_wait(waited: Duration) {
    metrics::histogram!("vk_rate_limit_wait_seconds").record(waited.as_secs_f64());
}
