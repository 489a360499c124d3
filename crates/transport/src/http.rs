//! reqwest-backed transport
//!
//! Every request is a form POST. Non-2xx statuses and connection failures are
//! reported through `TransportResponse::message` rather than as Rust errors,
//! so the invoker sees a single channel for bodies and HTTP-layer failures.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{Error, Result, Transport, TransportResponse};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Form-POST transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with its own client and the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shares its connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = TransportResponse> + Send + 'a>> {
        Box::pin(async move {
            let response = match self.client.post(url).form(fields).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "request failed before a response arrived");
                    return TransportResponse::failure(format!("request failed: {e}"));
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(%status, error = %e, "failed to read response body");
                    return TransportResponse::failure(format!("reading response body: {e}"));
                }
            };

            if !status.is_success() {
                debug!(%status, "non-success HTTP status");
                return TransportResponse {
                    is_success: false,
                    value: Some(body),
                    message: Some(format!("HTTP {status}")),
                };
            }

            TransportResponse::success(body)
        })
    }
}
