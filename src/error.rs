//! Error taxonomy for the garden client.
//!
//! Every remote call resolves to an [`ApiError`]; page-level code decides what to
//! show with [`crate::notify::Notifications::report`]:
//! - `Validation`: caught before submission, rendered inline per field
//! - `Unprocessable` (422) / `Http` / `Network`: dismissible notification
//! - `NotFound` (404): ignorable in several flows
//! - `Unauthorized` (401): owned by the session controller

use serde_json::Value;
use thiserror::Error;

use crate::transport::ApiResponse;
use crate::validation::FieldErrors;

/// Shared result alias for the client.
pub type ApiResult<T> = Result<T, ApiError>;

/// Typed errors for remote calls and local plumbing.
///
/// `Clone` is required because refresh and cached reads are shared futures whose
/// output is handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Client-side validation failed; nothing was sent
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Server-side validation failure (422)
    #[error("unprocessable entity: {message}")]
    Unprocessable { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    /// Session is gone; the controller already cleared tokens
    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Maps a non-success response to its error variant.
    pub fn from_response(response: &ApiResponse) -> Self {
        let message = error_message(&response.body)
            .unwrap_or_else(|| format!("request failed with status {}", response.status));
        match response.status {
            401 => Self::Unauthorized,
            404 => Self::NotFound { message },
            409 => Self::Conflict { message },
            422 => Self::Unprocessable { message },
            status => Self::Http { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unprocessable(&self) -> bool {
        matches!(self, Self::Unprocessable { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Treats a 404 as "nothing there".
pub fn ignore_not_found<T>(result: ApiResult<T>) -> ApiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Treats a 422 as "nothing happened".
pub fn ignore_unprocessable<T>(result: ApiResult<T>) -> ApiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_unprocessable() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Pulls a readable message out of an error body.
///
/// Domain errors come as `{"message": "..."}`, framework validation errors as
/// `{"detail": [{"loc": [...], "msg": "..."}]}` or `{"detail": "..."}`.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            return (!text.is_empty()).then_some(text);
        }
    };

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg").and_then(Value::as_str)?;
                    let loc = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .map(|field| field.to_string().trim_matches('"').to_string());
                    Some(match loc {
                        Some(field) => format!("{field}: {msg}"),
                        None => msg.to_string(),
                    })
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        other => Some(other.to_string()),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<sled::Error> for ApiError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}
