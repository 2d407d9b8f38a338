//! Typed request/response records for the identity service.
//!
//! DESIGN
//! ======
//! Form input is collected into these records and validated locally before
//! any network call, so the service only ever sees well-formed requests.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, FieldErrors};
use crate::session::{Role, User};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Email + password for `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into().trim().to_owned(), password: password.into() }
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] listing every offending field.
    pub fn validate(&self) -> Result<(), AuthError> {
        let mut fields = FieldErrors::new();
        check_email(&self.email, &mut fields);
        if self.password.is_empty() {
            fields.insert("password".to_owned(), "Enter your password".to_owned());
        }
        finish(fields)
    }
}

/// Full sign-up form for `POST /auth/register`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: Role,
}

impl RegistrationPayload {
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] listing every offending field.
    pub fn validate(&self) -> Result<(), AuthError> {
        let mut fields = FieldErrors::new();
        if self.name.trim().is_empty() {
            fields.insert("name".to_owned(), "Enter your full name".to_owned());
        }
        check_email(&self.email, &mut fields);
        check_phone(&self.phone, &mut fields);
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            fields.insert(
                "password".to_owned(),
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
        finish(fields)
    }

    /// Trim the free-text fields the way the form submits them.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_owned();
        self.email = self.email.trim().to_owned();
        self.phone = self.phone.trim().to_owned();
        self
    }
}

// Passwords stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("email", &self.email).finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RegistrationPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationPayload")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Successful login/register body.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthSuccess {
    pub token: String,
    pub user: User,
}

impl AuthSuccess {
    /// A blank token cannot be persisted or presented, so the reply is malformed.
    ///
    /// # Errors
    ///
    /// `Server` carrying `status` when the token is empty or whitespace.
    pub fn verified(self, status: Option<u16>) -> Result<Self, AuthError> {
        if self.token.trim().is_empty() {
            return Err(AuthError::Server { status, message: "malformed response: empty token".to_owned() });
        }
        Ok(self)
    }
}

// =============================================================================
// FIELD CHECKS
// =============================================================================

fn check_email(email: &str, fields: &mut FieldErrors) {
    if email.is_empty() {
        fields.insert("email".to_owned(), "Enter your email".to_owned());
    } else if !is_plausible_email(email) {
        fields.insert("email".to_owned(), "Enter a valid email address".to_owned());
    }
}

/// Free text: extensions, short local numbers and labels are all accepted.
fn check_phone(phone: &str, fields: &mut FieldErrors) {
    if phone.trim().is_empty() {
        fields.insert("phone".to_owned(), "Enter your phone number".to_owned());
    }
}

/// `local@domain.tld` with no whitespace; the service does the real check.
pub(crate) fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty() && !host.starts_with('.') && !host.ends_with('.')
}

fn finish(fields: FieldErrors) -> Result<(), AuthError> {
    if fields.is_empty() {
        return Ok(());
    }
    let message = if fields.len() == 1 {
        fields.values().next().cloned().unwrap_or_default()
    } else {
        "Please correct the highlighted fields.".to_owned()
    };
    Err(AuthError::Validation { message, fields })
}
