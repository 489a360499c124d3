//! Method invocation
//!
//! `VkApi` composes the session, rate limiter, transport and captcha handler.
//! One method call:
//! 1. refuse with `AccessDenied` if a token is needed and the session has none
//! 2. add `v`, `access_token` and `lang` unless the caller set them
//! 3. wait for a rate limit permit
//! 4. POST the form to `{url}{method}`
//! 5. parse the body; an `error` object becomes a classified `Error::Api`
//!
//! Steps 1-5 run under the captcha handler, which repeats them once with
//! `captcha_sid`/`captcha_key` added when the remote side asks for a captcha.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use transport::{HttpTransport, Transport};
use vk_auth::{AuthParams, AuthorizationFlow, DirectAuthFlow, TwoFactorProvider, ValidationHandler};

use crate::captcha::{CaptchaHandler, CaptchaSolver};
use crate::config::ClientConfig;
use crate::constants::{
    ACCESS_TOKEN_PARAM, CAPTCHA_KEY_PARAM, CAPTCHA_SID_PARAM, LANGUAGE_PARAM, VERSION_PARAM,
};
use crate::error::{Error, Result};
use crate::json::{DeserializeOptions, JsonConverter, pretty_print_json};
use crate::language::Language;
use crate::params::VkParameters;
use crate::rate_limit::RateLimiter;
use crate::remote::parse_envelope;
use crate::response::VkResponse;
use crate::session::{Session, SessionEvent, SessionStatus};

/// Builder for `VkApi`. Unset collaborators default to the reqwest transport
/// and the direct password flow sharing one HTTP client.
#[derive(Default)]
pub struct VkApiBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    flow: Option<Arc<dyn AuthorizationFlow>>,
    captcha_solver: Option<Arc<dyn CaptchaSolver>>,
    validation: Option<Arc<dyn ValidationHandler>>,
}

impl VkApiBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn flow(mut self, flow: Arc<dyn AuthorizationFlow>) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn captcha_solver(mut self, solver: Arc<dyn CaptchaSolver>) -> Self {
        self.captcha_solver = Some(solver);
        self
    }

    pub fn validation_handler(mut self, handler: Arc<dyn ValidationHandler>) -> Self {
        self.validation = Some(handler);
        self
    }

    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.config.requests_per_second = rps;
        self
    }

    pub fn build(self) -> Result<VkApi> {
        self.config.validate()?;

        let (transport, flow) = match (self.transport, self.flow) {
            (Some(transport), Some(flow)) => (transport, flow),
            (transport, flow) => {
                let client = reqwest::Client::builder()
                    .timeout(self.config.timeout())
                    .build()
                    .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;
                let transport = transport.unwrap_or_else(|| {
                    Arc::new(HttpTransport::with_client(client.clone())) as Arc<dyn Transport>
                });
                let flow = flow.unwrap_or_else(|| {
                    Arc::new(DirectAuthFlow::new(client)) as Arc<dyn AuthorizationFlow>
                });
                (transport, flow)
            }
        };

        let captcha = CaptchaHandler::new(self.captcha_solver);
        let session = Session::new(flow, captcha.clone(), self.validation);
        let limiter = RateLimiter::new(self.config.requests_per_second, Duration::from_secs(1))?;

        Ok(VkApi {
            transport,
            session,
            captcha,
            limiter,
            language: RwLock::new(self.config.language),
            last_invoke: Mutex::new(None),
            config: self.config,
        })
    }
}

/// VK API client.
pub struct VkApi {
    transport: Arc<dyn Transport>,
    session: Session,
    captcha: CaptchaHandler,
    limiter: RateLimiter,
    config: ClientConfig,
    language: RwLock<Option<Language>>,
    last_invoke: Mutex<Option<(SystemTime, Instant)>>,
}

impl VkApi {
    pub fn builder() -> VkApiBuilder {
        VkApiBuilder::default()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Session

    pub async fn authorize(&self, params: AuthParams) -> Result<()> {
        self.session.authorize(params).await
    }

    pub async fn refresh_token(&self, two_factor: Option<TwoFactorProvider>) -> Result<()> {
        self.session.refresh_token(two_factor).await
    }

    pub async fn logout(&self) {
        self.session.logout().await
    }

    pub async fn validate(&self, redirect_uri: &str) -> Result<()> {
        self.session.validate(redirect_uri).await
    }

    pub async fn is_authorized(&self) -> bool {
        self.session.is_authorized().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.status().await
    }

    pub async fn user_id(&self) -> Option<i64> {
        self.session.user_id().await
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    // Settings

    pub fn set_language(&self, language: Option<Language>) {
        *self.language.write().unwrap_or_else(|e| e.into_inner()) = language;
    }

    pub fn language(&self) -> Option<Language> {
        *self.language.read().unwrap_or_else(|e| e.into_inner())
    }

    /// At most `permits` calls per `window`; `0` disables the limit.
    pub async fn set_rate(&self, permits: u32, window: Duration) -> Result<()> {
        self.limiter.set_rate(permits, window).await
    }

    pub async fn set_requests_per_second(&self, rps: u32) -> Result<()> {
        self.limiter.set_rate(rps, Duration::from_secs(1)).await
    }

    /// Wall-clock time the last request was sent.
    pub fn last_invoke_time(&self) -> Option<SystemTime> {
        self.last_invoke_guard().map(|(at, _)| at)
    }

    pub fn since_last_invoke(&self) -> Option<Duration> {
        self.last_invoke_guard().map(|(_, at)| at.elapsed())
    }

    fn last_invoke_guard(&self) -> Option<(SystemTime, Instant)> {
        *self.last_invoke.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch_last_invoke(&self) {
        *self.last_invoke.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((SystemTime::now(), Instant::now()));
    }

    // Calls

    /// Call `method` and return the raw response body.
    pub async fn invoke(
        &self,
        method: &str,
        params: VkParameters,
        skip_authorization: bool,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let (body, _) = self
            .invoke_method(method, params, skip_authorization, cancel)
            .await?;
        Ok(body)
    }

    /// Call `method` and return its `response` subtree.
    pub async fn call(
        &self,
        method: &str,
        params: VkParameters,
        skip_authorization: bool,
        cancel: &CancellationToken,
    ) -> Result<VkResponse> {
        let (body, root) = self
            .invoke_method(method, params, skip_authorization, cancel)
            .await?;
        let response = root.get("response").cloned().unwrap_or(Value::Null);
        Ok(VkResponse::with_raw(response, body))
    }

    /// Call `method` and deserialize its `response` subtree. `converters` run
    /// before the built-in pipeline.
    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: VkParameters,
        skip_authorization: bool,
        converters: Vec<Arc<dyn JsonConverter>>,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let response = self.call(method, params, skip_authorization, cancel).await?;
        response.deserialize(&DeserializeOptions::pipeline(converters))
    }

    /// Query a long-poll server. No standard parameters are added and the
    /// whole root object is returned.
    pub async fn call_long_poll(
        &self,
        server: &str,
        params: VkParameters,
        cancel: &CancellationToken,
    ) -> Result<VkResponse> {
        if server.trim().is_empty() {
            return Err(Error::Config("long poll server URL is empty".into()));
        }
        let (body, root) = self.send(server, &params, cancel).await?;
        Ok(VkResponse::with_raw(root, body))
    }

    pub async fn call_long_poll_typed<T: DeserializeOwned>(
        &self,
        server: &str,
        params: VkParameters,
        converters: Vec<Arc<dyn JsonConverter>>,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let response = self.call_long_poll(server, params, cancel).await?;
        response.deserialize(&DeserializeOptions::pipeline(converters))
    }

    async fn invoke_method(
        &self,
        method: &str,
        params: VkParameters,
        skip_authorization: bool,
        cancel: &CancellationToken,
    ) -> Result<(String, Value)> {
        let url = format!("{}{}", self.config.url, method);
        let result = self
            .captcha
            .perform(|answer| {
                let mut attempt = params.clone();
                if let Some(answer) = answer {
                    attempt.insert(CAPTCHA_SID_PARAM, answer.sid.to_string());
                    attempt.insert(CAPTCHA_KEY_PARAM, answer.key);
                }
                let url = url.as_str();
                async move {
                    self.invoke_once(url, method, attempt, skip_authorization, cancel)
                        .await
                }
            })
            .await;

        match &result {
            Ok(_) => crate::metrics::record_call(method, "ok"),
            Err(e) => {
                crate::metrics::record_call(method, e.label());
                if let Error::Api(api) = e {
                    crate::metrics::record_error(api.kind().label());
                    debug!(method, code = api.code(), kind = api.kind().label(), "remote error");
                }
            }
        }
        result
    }

    async fn invoke_once(
        &self,
        url: &str,
        method: &str,
        mut params: VkParameters,
        skip_authorization: bool,
        cancel: &CancellationToken,
    ) -> Result<(String, Value)> {
        // Calls that skip authorization must not wait behind a login that
        // may itself be blocked on a prompt.
        let token = if skip_authorization {
            self.session.current_token().await
        } else {
            Some(self.session.access_token().await.ok_or(Error::AccessDenied)?)
        };

        params.insert_if_absent(VERSION_PARAM, self.config.version.as_str());
        if let Some(token) = token {
            params.insert_if_absent(ACCESS_TOKEN_PARAM, token);
        }
        if let Some(language) = self.language() {
            params.insert_if_absent(LANGUAGE_PARAM, language.code());
        }

        debug!(method, params = %params.loggable(), "invoking method");
        self.send(url, &params, cancel).await
    }

    /// Rate limit, transport round trip and envelope parsing.
    async fn send(
        &self,
        url: &str,
        params: &VkParameters,
        cancel: &CancellationToken,
    ) -> Result<(String, Value)> {
        self.limiter.acquire(cancel).await?;
        self.touch_last_invoke();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.transport.post(url, params.as_form()) => response,
        };
        let body = response.body().to_string();
        trace!(url, response = %pretty_print_json(&body), "response received");

        let root = parse_envelope(&body)?;
        Ok((body, root))
    }
}

impl std::fmt::Debug for VkApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VkApi")
            .field("config", &self.config)
            .field("captcha", &self.captcha)
            .finish_non_exhaustive()
    }
}
