//! Authorization parameters
//!
//! `AuthParams` describes one login attempt: either an externally supplied
//! token, or a login/password pair for a flow to exchange. The session keeps
//! the params of the last successful `authorize` call so the expiry alarm can
//! repeat the login without the caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;

use crate::error::{Error, Result};

/// Boxed future yielding a one-time code.
pub type CodeFuture = Pin<Box<dyn Future<Output = String> + Send>>;

/// Source of two-factor codes, asked only when the remote side demands one.
#[derive(Clone)]
pub enum TwoFactorProvider {
    /// Blocking callback (e.g. reads a code from a terminal prompt).
    Sync(Arc<dyn Fn() -> String + Send + Sync>),
    /// Callback producing a future (e.g. waits for an SMS webhook).
    Async(Arc<dyn Fn() -> CodeFuture + Send + Sync>),
}

impl TwoFactorProvider {
    pub fn from_fn(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self::Async(Arc::new(move || Box::pin(f())))
    }

    /// Obtain a code from whichever kind of provider this is. A sync
    /// provider that panics yields `Error::TwoFactor`.
    pub async fn code(&self) -> Result<String> {
        match self {
            Self::Sync(f) => {
                let f = Arc::clone(f);
                // A sync provider may block on user input; keep it off the
                // async worker threads.
                tokio::task::spawn_blocking(move || f())
                    .await
                    .map_err(|e| Error::TwoFactor(e.to_string()))
            }
            Self::Async(f) => Ok(f().await),
        }
    }
}

impl fmt::Debug for TwoFactorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "TwoFactorProvider::Sync"),
            Self::Async(_) => write!(f, "TwoFactorProvider::Async"),
        }
    }
}

/// Parameters for one authorization attempt.
#[derive(Debug, Clone, Default)]
pub struct AuthParams {
    pub login: Option<String>,
    pub password: Option<Secret<String>>,
    /// VK application (client) id
    pub application_id: u64,
    pub client_secret: Option<Secret<String>>,
    /// Comma separated scope list, e.g. `wall,offline`
    pub scope: Option<String>,
    pub two_factor: Option<TwoFactorProvider>,
    /// Externally obtained token. When set, no flow is run.
    pub access_token: Option<Secret<String>>,
    pub user_id: Option<i64>,
    /// Lifetime of `access_token` as reported by whoever issued it
    pub token_expires_in: Option<Duration>,
    /// Re-run the login path automatically when the token expires
    pub auto_refresh: bool,
}

impl AuthParams {
    /// Params for a token obtained outside this library.
    pub fn with_token(
        token: impl Into<String>,
        user_id: Option<i64>,
        expires_in: Option<Duration>,
    ) -> Self {
        Self {
            access_token: Some(Secret::new(token.into())),
            user_id,
            token_expires_in: expires_in,
            ..Self::default()
        }
    }

    /// Params for a login/password exchange against `application_id`.
    pub fn with_password(
        application_id: u64,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            application_id,
            login: Some(login.into()),
            password: Some(Secret::new(password.into())),
            ..Self::default()
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(Secret::new(secret.into()));
        self
    }

    pub fn two_factor(mut self, provider: TwoFactorProvider) -> Self {
        self.two_factor = Some(provider);
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Whether both login and password are present and non-blank. Only such
    /// params can be replayed to refresh a token.
    pub fn has_login_credentials(&self) -> bool {
        let login = self.login.as_deref().is_some_and(|l| !l.trim().is_empty());
        let password = self.password.as_ref().is_some_and(|p| !p.is_blank());
        login && password
    }
}
