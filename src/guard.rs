//! Duplicate-submission guard and "harmless late response" subscriptions.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    /// The same action is already in flight; the control stays disabled
    #[error("'{action}' is already in progress")]
    Busy { action: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Keys of mutations currently in flight. Guards are per action, not global:
/// saving a seed does not block deleting a tool.
#[derive(Clone, Default)]
pub struct ActionGuard {
    busy: Arc<Mutex<HashSet<String>>>,
}

impl ActionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `action`; the claim is released when the returned token drops,
    /// whether the mutation succeeded, failed or was abandoned.
    pub fn try_begin(&self, action: impl Into<String>) -> Result<InFlight, GuardError> {
        let action = action.into();
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(action.clone()) {
            debug!(%action, "duplicate submission rejected");
            return Err(GuardError::Busy { action });
        }
        Ok(InFlight {
            busy: self.busy.clone(),
            action,
        })
    }

    /// Whether the control for `action` should render disabled.
    pub fn is_busy(&self, action: &str) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(action)
    }

    /// Runs `mutation` under the `action` claim.
    pub async fn run<T, F>(&self, action: impl Into<String>, mutation: F) -> Result<T, GuardError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let _claim = self.try_begin(action)?;
        Ok(mutation.await?)
    }
}

#[must_use = "the action is released as soon as this is dropped"]
pub struct InFlight {
    busy: Arc<Mutex<HashSet<String>>>,
    action: String,
}

impl InFlight {
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.action);
    }
}

/// Interest of one page in its in-flight queries.
///
/// Leaving the page calls [`cancel`](Self::cancel); requests are not aborted,
/// their results are just dropped instead of being applied to a view that is
/// gone.
#[derive(Clone, Default)]
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    /// Awaits `future`; `None` if interest was cancelled before it finished.
    pub async fn watch<F: Future>(&self, future: F) -> Option<F::Output> {
        let output = future.await;
        if self.is_active() {
            Some(output)
        } else {
            debug!("late response dropped");
            None
        }
    }
}
