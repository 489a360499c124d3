//! Captcha challenge-response retry
//!
//! `CaptchaHandler::perform` runs an operation without a captcha answer. If it
//! fails with a captcha challenge and a solver is configured, the image is
//! solved and the operation runs exactly once more with the answer. The
//! retry's outcome is final; a second challenge means the answer was wrong
//! and the solver is told so.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};
use vk_auth::CaptchaAnswer;

use crate::error::Result;

/// Turns a captcha image into text.
pub trait CaptchaSolver: Send + Sync {
    fn solve<'a>(
        &'a self,
        image_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Called when the last answer was rejected by the remote side.
    fn report_incorrect(&self) {}
}

/// Wraps operations with a single captcha retry.
#[derive(Clone, Default)]
pub struct CaptchaHandler {
    solver: Option<Arc<dyn CaptchaSolver>>,
}

impl CaptchaHandler {
    pub fn new(solver: Option<Arc<dyn CaptchaSolver>>) -> Self {
        Self { solver }
    }

    /// Run `op`, retrying once with a solved captcha when challenged.
    ///
    /// Without a solver, or for errors other than a captcha challenge, the
    /// first error is returned unchanged.
    pub async fn perform<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(Option<CaptchaAnswer>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let err = match op(None).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let Some(solver) = self.solver.as_ref() else {
            return Err(err);
        };
        let challenge = err
            .captcha_challenge()
            .map(|(sid, img)| (sid, img.to_string()));
        let Some((sid, image_url)) = challenge else {
            return Err(err);
        };

        debug!(captcha_sid = sid, "captcha requested, solving");
        let key = solver.solve(&image_url).await?;
        crate::metrics::record_captcha_retry();

        let result = op(Some(CaptchaAnswer { sid, key })).await;
        if let Err(e) = &result {
            if e.captcha_challenge().is_some() {
                warn!(captcha_sid = sid, "captcha answer rejected");
                solver.report_incorrect();
            }
        }
        result
    }
}

impl std::fmt::Debug for CaptchaHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaHandler")
            .field("solver", &self.solver.is_some())
            .finish()
    }
}
