//! Session model shared by the controller, store, guard and views.
//!
//! DESIGN
//! ======
//! `Session` fields are private and only built through the state
//! constructors below, so a token/user pair can exist only in the
//! `Authenticated` state. Views read it through accessors and never mutate it.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// USER
// =============================================================================

/// Portal role label attached to every account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Player,
    Coach,
    Official,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Player, Role::Coach, Role::Official, Role::Viewer];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Coach => "coach",
            Self::Official => "official",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role `{0}` (expected player, coach, official or viewer)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| UnknownRole(raw.to_owned()))
    }
}

/// An account as returned by the identity service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Service-assigned identifier (UUID string).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Contact phone number as entered at registration.
    pub phone: String,
    /// Portal role.
    #[serde(default)]
    pub role: Role,
    /// Account creation timestamp (ISO 8601), if the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// =============================================================================
// SESSION
// =============================================================================

/// Lifecycle state of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Hydration from the session store has not finished yet.
    Initializing,
    Unauthenticated,
    /// A login or register call is in flight.
    Authenticating,
    Authenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initializing => "initializing",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
        })
    }
}

/// The current authentication state of the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
    status: SessionStatus,
    last_error: Option<String>,
}

impl Session {
    /// Session at application start, before hydration.
    #[must_use]
    pub fn initializing() -> Self {
        Self { token: None, user: None, status: SessionStatus::Initializing, last_error: None }
    }

    #[must_use]
    pub fn unauthenticated(last_error: Option<String>) -> Self {
        Self { token: None, user: None, status: SessionStatus::Unauthenticated, last_error }
    }

    #[must_use]
    pub fn authenticating() -> Self {
        Self { token: None, user: None, status: SessionStatus::Authenticating, last_error: None }
    }

    #[must_use]
    pub fn authenticated(token: String, user: User) -> Self {
        Self { token: Some(token), user: Some(user), status: SessionStatus::Authenticated, last_error: None }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// User-facing message from the most recent failed operation.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Drop the error message, keeping everything else.
    pub(crate) fn dismiss_error(&mut self) -> bool {
        self.last_error.take().is_some()
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.last_error = Some(message);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initializing()
    }
}
