//! Token expiry alarm
//!
//! A one-shot tokio task that sleeps until the credential's expiry instant and
//! then hands control back to the session. The task holds only a `Weak`
//! reference, so an armed alarm never keeps a dropped session alive.
//!
//! Each alarm carries the session generation it was armed for. Any transition
//! (login, logout, validation) bumps the generation, so an alarm that wakes
//! after being superseded does nothing.

use std::sync::{Mutex, Weak};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::session::SessionInner;

/// Holds the handle of the currently armed alarm task.
#[derive(Default)]
pub(crate) struct AlarmSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AlarmSlot {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn an alarm for `deadline`, aborting any previously armed one.
    pub(crate) fn arm(&self, session: Weak<SessionInner>, deadline: Instant, generation: u64) {
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            session.on_alarm(generation).await;
        });
        if let Some(previous) = self.slot().replace(task) {
            previous.abort();
        }
        debug!(
            generation,
            in_secs = deadline.saturating_duration_since(Instant::now()).as_secs(),
            "expiry alarm armed"
        );
    }

    /// Abort the armed alarm, if any.
    pub(crate) fn disarm(&self) {
        if let Some(task) = self.slot().take() {
            task.abort();
        }
    }

    /// Forget the armed alarm without aborting it. Called by the alarm task
    /// itself before it re-enters the session, so that a re-login arming a
    /// new alarm does not abort the task doing the re-login.
    pub(crate) fn detach(&self) {
        self.slot().take();
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.slot().as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AlarmSlot {
    fn drop(&mut self) {
        if let Some(task) = self.slot().take() {
            task.abort();
        }
    }
}
