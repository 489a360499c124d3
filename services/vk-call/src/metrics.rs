//! Prometheus rendering of the client metrics
//!
//! `vk_api::metrics` records through the `metrics` facade. With `--metrics`
//! the binary installs a Prometheus recorder and prints the text exposition
//! to stderr after the call.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::Result;

/// Rate limiter waits range from a few milliseconds to a full window.
const WAIT_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

fn builder() -> Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("vk_rate_limit_wait_seconds".to_string()),
        WAIT_BUCKETS,
    )?)
}

/// Install the Prometheus recorder globally and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}
