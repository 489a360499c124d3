//! Direct authorization (password grant)
//!
//! POSTs login and password to `TOKEN_ENDPOINT` with `grant_type=password`.
//! The endpoint answers either a token or an OAuth error object:
//! - `need_captcha` carries a captcha sid and image, surfaced as
//!   `Error::CaptchaNeeded` for the session's captcha handler.
//! - `need_validation` with a `2fa_*` type is answered here by asking the
//!   two-factor provider for a code and retrying once with `code` set.
//! - anything else is `InvalidCredentials` with the endpoint's description.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, info};

use crate::constants::{
    ERROR_NEED_CAPTCHA, ERROR_NEED_VALIDATION, PASSWORD_GRANT, TOKEN_ENDPOINT,
    TWO_FACTOR_SUPPORTED, TWO_FACTOR_VALIDATION_PREFIX,
};
use crate::error::{Error, Result};
use crate::flow::{AuthorizationFlow, AuthorizationResult, CaptchaAnswer};
use crate::params::AuthParams;

/// Error object returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    captcha_sid: Option<serde_json::Value>,
    #[serde(default)]
    captcha_img: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    validation_type: Option<String>,
}

/// Password-grant flow against the VK OAuth endpoint.
#[derive(Debug, Clone)]
pub struct DirectAuthFlow {
    client: reqwest::Client,
    endpoint: String,
}

impl DirectAuthFlow {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, TOKEN_ENDPOINT)
    }

    /// Point the flow at a different token endpoint (staging, local stub).
    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn request(
        &self,
        params: &AuthParams,
        captcha: Option<&CaptchaAnswer>,
        code: Option<&str>,
    ) -> Result<AuthorizationResult> {
        let fields = form_fields(params, captcha, code)?;
        let response = self
            .client
            .post(&self.endpoint)
            .form(&fields)
            .send()
            .await
            .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading token response: {e}")))?;

        parse_token_response(status.as_u16(), &body)
    }
}

impl AuthorizationFlow for DirectAuthFlow {
    fn authorize<'a>(
        &'a self,
        params: &'a AuthParams,
        captcha: Option<&'a CaptchaAnswer>,
    ) -> Pin<Box<dyn Future<Output = Result<AuthorizationResult>> + Send + 'a>> {
        Box::pin(async move {
            debug!(application_id = params.application_id, "direct authorization");
            match self.request(params, captcha, None).await {
                Err(Error::NeedValidation {
                    validation_type: Some(kind),
                    redirect_uri,
                }) if kind.starts_with(TWO_FACTOR_VALIDATION_PREFIX) => {
                    let Some(provider) = params.two_factor.as_ref() else {
                        return Err(Error::NeedValidation {
                            redirect_uri,
                            validation_type: Some(kind),
                        });
                    };
                    info!(validation_type = %kind, "two-factor code requested");
                    let code = provider.code().await?;
                    self.request(params, captcha, Some(code.trim())).await
                }
                other => other,
            }
        })
    }
}

/// Build the form body for one token request.
///
/// Fails with `MissingCredentials` when login or password is absent, before
/// any network activity.
pub fn form_fields(
    params: &AuthParams,
    captcha: Option<&CaptchaAnswer>,
    code: Option<&str>,
) -> Result<Vec<(String, String)>> {
    if !params.has_login_credentials() {
        return Err(Error::MissingCredentials(
            "direct authorization requires login and password".into(),
        ));
    }
    let login = params.login.clone().unwrap_or_default();
    let password = params
        .password
        .as_ref()
        .map(|p| p.expose().clone())
        .unwrap_or_default();

    let mut fields = vec![
        ("grant_type".to_string(), PASSWORD_GRANT.to_string()),
        ("client_id".to_string(), params.application_id.to_string()),
        ("username".to_string(), login),
        ("password".to_string(), password),
        (TWO_FACTOR_SUPPORTED.to_string(), "1".to_string()),
    ];
    if let Some(secret) = params.client_secret.as_ref() {
        fields.push(("client_secret".to_string(), secret.expose().clone()));
    }
    if let Some(scope) = params.scope.as_ref() {
        fields.push(("scope".to_string(), scope.clone()));
    }
    if let Some(code) = code {
        fields.push(("code".to_string(), code.to_string()));
    }
    if let Some(answer) = captcha {
        fields.push(("captcha_sid".to_string(), answer.sid.to_string()));
        fields.push(("captcha_key".to_string(), answer.key.clone()));
    }
    Ok(fields)
}

/// Interpret a token endpoint response.
///
/// VK answers OAuth errors with 401 and a JSON `error` object; the object is
/// checked before the status so that captcha and validation challenges are
/// recognized regardless of the status code used.
pub fn parse_token_response(status: u16, body: &str) -> Result<AuthorizationResult> {
    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        Error::TokenExchange(format!("token endpoint returned {status} with invalid JSON: {e}"))
    })?;

    if json.get("error").is_some() {
        let err: OAuthError = serde_json::from_value(json)
            .map_err(|e| Error::TokenExchange(format!("invalid error response: {e}")))?;
        return Err(oauth_error(err));
    }

    if !(200..300).contains(&status) {
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    serde_json::from_value(json)
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

fn oauth_error(err: OAuthError) -> Error {
    let description = err.error_description.clone().unwrap_or_else(|| err.error.clone());
    match err.error.as_str() {
        ERROR_NEED_CAPTCHA => {
            let sid = err.captcha_sid.as_ref().and_then(captcha_sid);
            match (sid, err.captcha_img) {
                (Some(captcha_sid), Some(captcha_img)) => Error::CaptchaNeeded {
                    captcha_sid,
                    captcha_img,
                },
                _ => Error::TokenExchange(format!("incomplete captcha challenge: {description}")),
            }
        }
        ERROR_NEED_VALIDATION => Error::NeedValidation {
            redirect_uri: err.redirect_uri.unwrap_or_default(),
            validation_type: err.validation_type,
        },
        _ => Error::InvalidCredentials(description),
    }
}

/// `captcha_sid` arrives as a string or a number depending on the endpoint.
fn captcha_sid(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
