//! Routes errors to where the user sees them.
//!
//! Server and network failures become dismissible notifications that expire
//! on their own; validation errors go back to the form; 404s are ignorable and
//! 401s belong to the session controller.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::guard::GuardError;
use crate::validation::FieldErrors;

pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    created_at: Instant,
}

/// What happened to a reported error.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Notified(u64),
    /// Show these next to the form fields
    Inline(FieldErrors),
    Ignored,
    /// Already turned into a login redirect
    HandledBySession,
}

pub struct Notifications {
    items: Vec<Notification>,
    next_id: u64,
    timeout: Duration,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(NOTIFICATION_TIMEOUT)
    }
}

impl Notifications {
    pub fn new(timeout: Duration) -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
            timeout,
        }
    }

    pub fn report(&mut self, err: &ApiError) -> Disposition {
        match err {
            ApiError::Validation(errors) => Disposition::Inline(errors.clone()),
            ApiError::NotFound { message } => {
                debug!(%message, "not found, ignored");
                Disposition::Ignored
            }
            ApiError::Unauthorized => Disposition::HandledBySession,
            other => {
                error!(error = %other, "request failed");
                Disposition::Notified(self.push(other.to_string()))
            }
        }
    }

    /// Like [`report`](Self::report); a rejected duplicate submission shows nothing.
    pub fn report_guarded(&mut self, err: &GuardError) -> Disposition {
        match err {
            GuardError::Busy { .. } => Disposition::Ignored,
            GuardError::Api(err) => self.report(err),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notification {
            id,
            message: message.into(),
            created_at: Instant::now(),
        });
        id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    /// Visible notifications, oldest first; expired ones are dropped.
    pub fn active(&mut self) -> &[Notification] {
        let timeout = self.timeout;
        self.items.retain(|n| n.created_at.elapsed() < timeout);
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn server_errors_notify_and_expire() {
        let mut notifications = Notifications::default();
        let disposition = notifications.report(&ApiError::Unprocessable {
            message: "amount must be positive".into(),
        });
        assert_eq!(disposition, Disposition::Notified(0));
        assert_eq!(notifications.active().len(), 1);
        assert!(notifications.active()[0].message.contains("amount must be positive"));

        tokio::time::advance(Duration::from_secs(4)).await;
        notifications.push("network error: connection refused");
        tokio::time::advance(Duration::from_secs(2)).await;

        let active = notifications.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[test]
    fn routing_by_error_kind() {
        let mut notifications = Notifications::default();
        let mut errors = FieldErrors::new();
        errors.add("email", "Invalid email");

        assert_eq!(
            notifications.report(&ApiError::Validation(errors.clone())),
            Disposition::Inline(errors)
        );
        assert_eq!(
            notifications.report(&ApiError::NotFound {
                message: "Seed not found".into()
            }),
            Disposition::Ignored
        );
        assert_eq!(
            notifications.report(&ApiError::Unauthorized),
            Disposition::HandledBySession
        );
        assert!(matches!(
            notifications.report(&ApiError::Network("timeout".into())),
            Disposition::Notified(_)
        ));
        assert_eq!(
            notifications.report_guarded(&GuardError::Busy {
                action: "seed:save".into()
            }),
            Disposition::Ignored
        );
    }

    #[test]
    fn dismiss_removes_once() {
        let mut notifications = Notifications::default();
        let id = notifications.push("boom");
        assert!(notifications.dismiss(id));
        assert!(!notifications.dismiss(id));
    }
}
