//! Authorization session
//!
//! Owns the credential and drives it through
//! `Unauthorized -> Authorizing -> Authorized -> Refreshing -> Authorized | Unauthorized`.
//!
//! Login paths:
//! - external token: no network, `Authorized` immediately, alarm armed when a
//!   lifetime was supplied
//! - login and password: the `AuthorizationFlow` runs under the captcha
//!   handler; the reported lifetime minus a safety margin arms the alarm
//!
//! When the alarm fires the session either repeats the credential login
//! (auto refresh with stored login and password) or clears itself. Outcomes are
//! published as `SessionEvent`s on a broadcast channel; nothing is returned to
//! a caller from the alarm path.
//!
//! Transitions are serialized by `transition`. `access_token` takes the same
//! lock, so a reader never sees a token that is being replaced.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vk_auth::{AuthParams, AuthorizationFlow, TwoFactorProvider, ValidationHandler};

use crate::alarm::AlarmSlot;
use crate::captcha::CaptchaHandler;
use crate::classify::ApiError;
use crate::constants::EXPIRY_SAFETY_MARGIN;
use crate::error::{Error, Result};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthorized,
    Authorizing,
    Authorized,
    Refreshing,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Unauthorized => "unauthorized",
            SessionStatus::Authorizing => "authorizing",
            SessionStatus::Authorized => "authorized",
            SessionStatus::Refreshing => "refreshing",
        }
    }
}

/// Notifications from the alarm path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The token expired and could not be renewed automatically.
    TokenExpired,
    /// The token was renewed automatically by repeating the login.
    TokenRefreshed { user_id: Option<i64> },
    /// Automatic renewal was attempted and failed; the session is now
    /// unauthorized.
    RefreshFailed { error: String },
}

#[derive(Clone)]
struct Credential {
    token: Secret<String>,
    user_id: Option<i64>,
    expires_at: Option<Instant>,
}

struct State {
    status: SessionStatus,
    credential: Option<Credential>,
    params: Option<AuthParams>,
    generation: u64,
}

impl State {
    fn clear(&mut self) {
        self.status = SessionStatus::Unauthorized;
        self.credential = None;
    }
}

pub(crate) struct SessionInner {
    state: RwLock<State>,
    transition: Mutex<()>,
    flow: Arc<dyn AuthorizationFlow>,
    captcha: CaptchaHandler,
    validation: Option<Arc<dyn ValidationHandler>>,
    events: broadcast::Sender<SessionEvent>,
    alarm: AlarmSlot,
}

/// Shared handle to one authorization session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(
        flow: Arc<dyn AuthorizationFlow>,
        captcha: CaptchaHandler,
        validation: Option<Arc<dyn ValidationHandler>>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(State {
                    status: SessionStatus::Unauthorized,
                    credential: None,
                    params: None,
                    generation: 0,
                }),
                transition: Mutex::new(()),
                flow,
                captcha,
                validation,
                events,
                alarm: AlarmSlot::default(),
            }),
        }
    }

    /// Log in with an external token or with login and password.
    ///
    /// Fails with `Error::Config` before any state change when the params
    /// carry neither a non-empty token nor login credentials.
    pub async fn authorize(&self, params: AuthParams) -> Result<()> {
        let _guard = self.inner.transition.lock().await;
        self.inner.authorize_locked(params).await
    }

    /// Repeat the credential login now, optionally with a fresh two-factor
    /// provider.
    pub async fn refresh_token(&self, two_factor: Option<TwoFactorProvider>) -> Result<()> {
        let _guard = self.inner.transition.lock().await;
        let stored = self.inner.state.read().await.params.clone();
        let Some(mut params) = stored.filter(AuthParams::has_login_credentials) else {
            return Err(Error::Config(
                "token refresh requires a stored login and password".into(),
            ));
        };
        if two_factor.is_some() {
            params.two_factor = two_factor;
        }
        let result = self.inner.login_with_credentials(params, SessionStatus::Refreshing).await;
        crate::metrics::record_token_refresh(if result.is_ok() { "ok" } else { "failed" });
        result
    }

    /// Forget the credential and stored params and cancel the alarm.
    pub async fn logout(&self) {
        let _guard = self.inner.transition.lock().await;
        self.inner.alarm.disarm();
        let mut state = self.inner.state.write().await;
        state.generation += 1;
        state.clear();
        state.params = None;
        info!("logged out");
    }

    /// Complete a validation redirect through the configured handler.
    ///
    /// An empty token from the handler leaves the session unauthorized and
    /// fails with `ApiError::ValidationRequired` for the same redirect.
    pub async fn validate(&self, redirect_uri: &str) -> Result<()> {
        let Some(handler) = self.inner.validation.clone() else {
            return Err(Error::Config("no validation handler configured".into()));
        };
        let _guard = self.inner.transition.lock().await;
        self.inner.alarm.disarm();
        self.inner.state.write().await.generation += 1;

        let outcome = handler.validate(redirect_uri).await;
        let mut state = self.inner.state.write().await;
        match outcome {
            Ok(result) if !result.access_token.trim().is_empty() => {
                state.credential = Some(Credential {
                    token: Secret::new(result.access_token),
                    user_id: result.user_id,
                    expires_at: None,
                });
                state.status = SessionStatus::Authorized;
                info!(user_id = ?result.user_id, "session validated");
                Ok(())
            }
            Ok(_) => {
                state.clear();
                warn!(redirect_uri, "validation returned no token");
                Err(Error::Api(ApiError::validation_required(redirect_uri)))
            }
            Err(e) => {
                state.clear();
                Err(Error::Auth(e))
            }
        }
    }

    /// Current token, waiting for an in-flight transition to finish.
    pub async fn access_token(&self) -> Option<String> {
        let _guard = self.inner.transition.lock().await;
        self.current_token().await
    }

    /// Current token without waiting for a transition. A login in progress
    /// reads as no token.
    pub async fn current_token(&self) -> Option<String> {
        let state = self.inner.state.read().await;
        if state.status != SessionStatus::Authorized {
            return None;
        }
        state
            .credential
            .as_ref()
            .filter(|c| !c.token.is_blank())
            .map(|c| c.token.expose().clone())
    }

    pub async fn is_authorized(&self) -> bool {
        let state = self.inner.state.read().await;
        state.status == SessionStatus::Authorized
            && state.credential.as_ref().is_some_and(|c| !c.token.is_blank())
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.state.read().await.status
    }

    pub async fn user_id(&self) -> Option<i64> {
        let state = self.inner.state.read().await;
        state.credential.as_ref().and_then(|c| c.user_id)
    }

    /// Instant the expiry alarm is set for, if one is armed.
    pub async fn alarm_deadline(&self) -> Option<Instant> {
        if !self.inner.alarm.is_armed() {
            return None;
        }
        let state = self.inner.state.read().await;
        state.credential.as_ref().and_then(|c| c.expires_at)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// Alarm instant for a token living `lifetime` from `now`. Zero lifetime means
/// the token does not expire. A lifetime inside the safety margin arms no
/// alarm; the next call after expiry fails with an auth error instead.
fn expiry(now: Instant, lifetime: Duration) -> Option<Instant> {
    if lifetime <= EXPIRY_SAFETY_MARGIN {
        return None;
    }
    Some(now + (lifetime - EXPIRY_SAFETY_MARGIN))
}

impl SessionInner {
    async fn authorize_locked(self: &Arc<Self>, params: AuthParams) -> Result<()> {
        if let Some(token) = params.access_token.clone() {
            if token.is_blank() {
                return Err(Error::Config("access token is empty".into()));
            }
            self.alarm.disarm();
            let expires_at = params.token_expires_in.and_then(|d| expiry(Instant::now(), d));
            let user_id = params.user_id;
            let mut state = self.state.write().await;
            state.generation += 1;
            state.credential = Some(Credential {
                token,
                user_id,
                expires_at,
            });
            state.params = Some(params);
            state.status = SessionStatus::Authorized;
            if let Some(deadline) = expires_at {
                self.alarm.arm(Arc::downgrade(self), deadline, state.generation);
            }
            info!(?user_id, expires = expires_at.is_some(), "authorized with external token");
            return Ok(());
        }

        if !params.has_login_credentials() {
            return Err(Error::Config(
                "authorization requires an access token or login and password".into(),
            ));
        }
        self.login_with_credentials(params, SessionStatus::Authorizing).await
    }

    /// Run the authorization flow and install its token. Caller holds
    /// `transition`.
    async fn login_with_credentials(
        self: &Arc<Self>,
        params: AuthParams,
        phase: SessionStatus,
    ) -> Result<()> {
        self.alarm.disarm();
        {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.status = phase;
        }
        debug!(
            status = phase.label(),
            application_id = params.application_id,
            "running authorization flow"
        );

        let flow = &self.flow;
        let attempt = &params;
        let outcome = self
            .captcha
            .perform(move |answer| async move {
                flow.authorize(attempt, answer.as_ref())
                    .await
                    .map_err(Error::from)
            })
            .await;

        let mut state = self.state.write().await;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                state.clear();
                return Err(e);
            }
        };
        if result.access_token.trim().is_empty() {
            state.clear();
            return Err(Error::AuthorizationFailed(
                "authorization flow returned an empty access token".into(),
            ));
        }

        let expires_at = expiry(Instant::now(), Duration::from_secs(result.expires_in));
        state.credential = Some(Credential {
            token: Secret::new(result.access_token),
            user_id: result.user_id,
            expires_at,
        });
        state.params = Some(params);
        state.status = SessionStatus::Authorized;
        if let Some(deadline) = expires_at {
            self.alarm.arm(Arc::downgrade(self), deadline, state.generation);
        }
        info!(user_id = ?result.user_id, expires_in = result.expires_in, "authorized");
        Ok(())
    }

    /// Entry point of the alarm task.
    pub(crate) async fn on_alarm(self: &Arc<Self>, generation: u64) {
        self.alarm.detach();
        let _guard = self.transition.lock().await;

        let params = {
            let state = self.state.read().await;
            if state.generation != generation || state.status != SessionStatus::Authorized {
                debug!(generation, "stale expiry alarm ignored");
                return;
            }
            state.params.clone()
        };

        match params.filter(|p| p.auto_refresh && p.has_login_credentials()) {
            Some(params) => {
                info!("access token expiring, refreshing automatically");
                match self.login_with_credentials(params, SessionStatus::Refreshing).await {
                    Ok(()) => {
                        crate::metrics::record_token_refresh("ok");
                        let user_id = self
                            .state
                            .read()
                            .await
                            .credential
                            .as_ref()
                            .and_then(|c| c.user_id);
                        let _ = self.events.send(SessionEvent::TokenRefreshed { user_id });
                    }
                    Err(e) => {
                        crate::metrics::record_token_refresh("failed");
                        warn!(
                            error = %e,
                            "automatic token refresh failed, session is unauthorized"
                        );
                        let _ = self.events.send(SessionEvent::RefreshFailed {
                            error: e.to_string(),
                        });
                    }
                }
            }
            None => {
                let mut state = self.state.write().await;
                state.generation += 1;
                state.clear();
                warn!("access token expired and cannot be refreshed, session is unauthorized");
                let _ = self.events.send(SessionEvent::TokenExpired);
            }
        }
    }
}
