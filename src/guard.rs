//! Route guard for the portal's views.
//!
//! `evaluate` is a pure function of the session status and the requested
//! route. Callers re-run it whenever the session changes; `settle` waits out
//! the transient states first so a protected view is never decided mid-flight.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use tokio::sync::watch;

use crate::session::{Session, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Login,
    Register,
    Dashboard,
}

impl Route {
    pub const ALL: [Self; 4] = [Self::Root, Self::Login, Self::Register, Self::Dashboard];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Dashboard => "/dashboard",
        }
    }

    /// Match a request path. A trailing slash is ignored; unknown paths are `None`.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" if trimmed.starts_with('/') => "/",
            other => other,
        };
        Self::ALL.into_iter().find(|route| route.path() == normalized)
    }

    #[must_use]
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Dashboard)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Route),
    Redirect(Route),
    /// Hydration has not finished; show a placeholder and re-evaluate.
    Loading,
}

#[must_use]
pub fn evaluate(status: SessionStatus, route: Route) -> GuardDecision {
    if route == Route::Root {
        return GuardDecision::Redirect(Route::Login);
    }
    if !route.is_protected() {
        return GuardDecision::Render(route);
    }
    match status {
        SessionStatus::Initializing => GuardDecision::Loading,
        SessionStatus::Authenticated => GuardDecision::Render(route),
        SessionStatus::Unauthenticated | SessionStatus::Authenticating => GuardDecision::Redirect(Route::Login),
    }
}

/// Wait until the session leaves `Initializing`/`Authenticating`, then decide.
/// If the controller is gone the last known status is used.
pub async fn settle(session: &mut watch::Receiver<Session>, route: Route) -> GuardDecision {
    let settled = |s: &Session| !matches!(s.status(), SessionStatus::Initializing | SessionStatus::Authenticating);
    let waited = session.wait_for(settled).await.map(|current| current.status());
    let status = match waited {
        Ok(status) => status,
        Err(closed) => {
            tracing::debug!(%closed, "session channel closed while settling");
            session.borrow().status()
        }
    };
    let decision = evaluate(status, route);
    tracing::debug!(%route, %status, ?decision, "route guard settled");
    decision
}
