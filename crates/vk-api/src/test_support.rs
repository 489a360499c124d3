//! Fakes for the transport, flow, solver and validation seams.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use transport::{Transport, TransportResponse};
use vk_auth::{
    AuthParams, AuthorizationFlow, AuthorizationResult, CaptchaAnswer, ValidationHandler,
    ValidationResult,
};

use crate::captcha::CaptchaSolver;
use crate::classify::classify;
use crate::error::{Error, Result};
use crate::remote::RemoteError;

/// A classified captcha error for `sid`.
pub(crate) fn captcha_error(sid: u64) -> Error {
    let mut remote = RemoteError::new(14, "Captcha needed");
    remote.captcha_sid = Some(sid);
    remote.captcha_img = Some(format!("https://api.vk.com/captcha.php?sid={sid}"));
    Error::Api(classify(remote))
}

/// Failure envelope body for `code`.
pub(crate) fn error_body(code: i64, message: &str) -> String {
    RemoteError::new(code, message).to_envelope().to_string()
}

/// A recorded transport request.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl Recorded {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses and records every request. An empty queue answers
/// `{"response":1}`.
#[derive(Default)]
pub(crate) struct FakeTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: TransportResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_body(&self, body: impl Into<String>) {
        self.push(TransportResponse::success(body));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for FakeTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = TransportResponse> + Send + 'a>> {
        self.requests.lock().unwrap().push(Recorded {
            url: url.to_string(),
            fields: fields.to_vec(),
        });
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TransportResponse::success(r#"{"response":1}"#));
        Box::pin(async move { response })
    }
}

/// Returns queued results in order; an empty queue yields a non-expiring
/// token.
#[derive(Default)]
pub(crate) struct FakeFlow {
    results: Mutex<VecDeque<vk_auth::Result<AuthorizationResult>>>,
    answers: Mutex<Vec<Option<CaptchaAnswer>>>,
    calls: AtomicUsize,
}

impl FakeFlow {
    pub fn with_results(results: Vec<vk_auth::Result<AuthorizationResult>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn captcha_answers(&self) -> Vec<Option<CaptchaAnswer>> {
        self.answers.lock().unwrap().clone()
    }
}

impl AuthorizationFlow for FakeFlow {
    fn authorize<'a>(
        &'a self,
        _params: &'a AuthParams,
        captcha: Option<&'a CaptchaAnswer>,
    ) -> Pin<Box<dyn Future<Output = vk_auth::Result<AuthorizationResult>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers.lock().unwrap().push(captcha.cloned());
        let result = self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(AuthorizationResult {
                access_token: "fake-token".into(),
                user_id: Some(1),
                expires_in: 0,
            })
        });
        Box::pin(async move { result })
    }
}

/// Blocks inside `authorize` until `release` is called, then returns a
/// non-expiring token.
#[derive(Default)]
pub(crate) struct GatedFlow {
    entered: Notify,
    release: Notify,
}

impl GatedFlow {
    /// Wait until a login is blocked inside the flow.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl AuthorizationFlow for GatedFlow {
    fn authorize<'a>(
        &'a self,
        _params: &'a AuthParams,
        _captcha: Option<&'a CaptchaAnswer>,
    ) -> Pin<Box<dyn Future<Output = vk_auth::Result<AuthorizationResult>> + Send + 'a>> {
        Box::pin(async move {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(AuthorizationResult {
                access_token: "gated-token".into(),
                user_id: Some(1),
                expires_in: 0,
            })
        })
    }
}

/// Answers every captcha with the same text.
pub(crate) struct FakeSolver {
    answer: String,
    solves: AtomicUsize,
    incorrect: AtomicUsize,
    last_image: Mutex<Option<String>>,
}

impl FakeSolver {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            solves: AtomicUsize::new(0),
            incorrect: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    pub fn solves(&self) -> usize {
        self.solves.load(Ordering::SeqCst)
    }

    pub fn incorrect_reports(&self) -> usize {
        self.incorrect.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<String> {
        self.last_image.lock().unwrap().clone()
    }
}

impl CaptchaSolver for FakeSolver {
    fn solve<'a>(
        &'a self,
        image_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.solves.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image_url.to_string());
        let answer = self.answer.clone();
        Box::pin(async move { Ok(answer) })
    }

    fn report_incorrect(&self) {
        self.incorrect.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns a fixed validation outcome.
pub(crate) struct FakeValidation {
    result: vk_auth::Result<ValidationResult>,
    last_redirect: Mutex<Option<String>>,
}

impl FakeValidation {
    pub fn new(result: ValidationResult) -> Self {
        Self::with_outcome(Ok(result))
    }

    pub fn failing(error: vk_auth::Error) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(result: vk_auth::Result<ValidationResult>) -> Self {
        Self {
            result,
            last_redirect: Mutex::new(None),
        }
    }

    pub fn last_redirect(&self) -> Option<String> {
        self.last_redirect.lock().unwrap().clone()
    }
}

impl ValidationHandler for FakeValidation {
    fn validate<'a>(
        &'a self,
        redirect_uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = vk_auth::Result<ValidationResult>> + Send + 'a>> {
        *self.last_redirect.lock().unwrap() = Some(redirect_uri.to_string());
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}
