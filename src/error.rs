//! Authentication error taxonomy.
//!
//! DESIGN
//! ======
//! One enum covers both what the identity service can report and what the
//! controller itself rejects. `user_message` is the only text that ever
//! reaches a view; the `Display` impl is for logs.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::collections::BTreeMap;

use crate::session::SessionStatus;

/// Per-field validation messages keyed by field name (`email`, `password`, ...).
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Transport failure or timeout talking to the identity service.
    #[error("network error: {0}")]
    Network(String),

    /// The service rejected the email/password pair or the token.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Input rejected, either locally before sending or by the service.
    #[error("validation failed: {message}")]
    Validation { message: String, fields: FieldErrors },

    /// 5xx, unexpected status, or a success body that could not be decoded.
    #[error("server error (status {status:?}): {message}")]
    Server { status: Option<u16>, message: String },

    /// A login/register call is already in flight on this controller.
    #[error("a sign-in request is already in progress")]
    ConcurrentRequest,

    /// The operation is not allowed from the current session status.
    #[error("operation not allowed while {0}")]
    InvalidTransition(SessionStatus),

    /// The reply arrived after a newer state change and was discarded.
    #[error("request superseded by a newer session change")]
    Superseded,
}

pub const NETWORK_MESSAGE: &str = "Unable to reach the server. Please check your connection and try again.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Incorrect email or password";
pub const SERVER_MESSAGE: &str = "Something went wrong on our side. Please try again later.";
pub const CONCURRENT_MESSAGE: &str = "A request is already in progress.";

impl AuthError {
    /// Build a validation error from a single field message.
    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_owned(), message.clone());
        Self::Validation { message, fields }
    }

    /// Text suitable for `Session::last_error` and toasts.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => NETWORK_MESSAGE.to_owned(),
            Self::InvalidCredentials(_) => INVALID_CREDENTIALS_MESSAGE.to_owned(),
            Self::Validation { message, fields } => {
                if message.is_empty() {
                    fields.values().next().cloned().unwrap_or_else(|| "Please check the form and try again.".to_owned())
                } else {
                    message.clone()
                }
            }
            Self::Server { .. } => SERVER_MESSAGE.to_owned(),
            Self::ConcurrentRequest => CONCURRENT_MESSAGE.to_owned(),
            Self::InvalidTransition(status) => format!("Not available while {status}."),
            Self::Superseded => "The request was cancelled.".to_owned(),
        }
    }

    /// Field-scoped messages; `None` for non-validation errors.
    #[must_use]
    pub fn fields(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Whether this error should be recorded as the session's `last_error`.
    ///
    /// Rejections of the call itself leave the session untouched.
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        !matches!(self, Self::ConcurrentRequest | Self::InvalidTransition(_) | Self::Superseded)
    }
}
