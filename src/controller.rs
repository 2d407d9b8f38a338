//! Auth controller: the session state machine.
//!
//! SYSTEM CONTEXT
//! ==============
//! Constructed once at bootstrap and shared by reference with every view.
//! It is the only writer of the `Session`; views and the route guard read it
//! through `subscribe()` (latest value) or `transitions()` (every commit, in
//! order).
//!
//! DESIGN
//! ======
//! Every state change goes through the watch channel's `send_if_modified`,
//! which serializes commits. Store writes happen inside that commit, so a
//! transition is persisted before any observer can see it, and the lock is
//! never held across an `.await`.
//!
//! Outbound login/register/validate calls are tagged with the generation
//! current when they started. `logout()` and `teardown()` bump it, so a reply
//! that lands afterwards no longer matches and is dropped instead of
//! resurrecting a cleared session.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, watch};

use crate::error::AuthError;
use crate::identity::{AuthSuccess, Credentials, IdentityApi, RegistrationPayload};
use crate::session::{Session, SessionStatus, User};
use crate::store::SessionStore;

const TRANSITION_BUFFER: usize = 64;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// What `init()` does with a token found in the session store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HydrationPolicy {
    /// Accept the stored session without contacting the identity service.
    Trust,
    /// Confirm the token with `validate_token` before accepting it.
    #[default]
    Validate,
}

enum Attempt {
    Login(Credentials),
    Register(RegistrationPayload),
}

impl Attempt {
    fn kind(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Register(_) => "register",
        }
    }

    fn email(&self) -> &str {
        match self {
            Self::Login(credentials) => &credentials.email,
            Self::Register(payload) => &payload.email,
        }
    }

    fn validate(&self) -> Result<(), AuthError> {
        match self {
            Self::Login(credentials) => credentials.validate(),
            Self::Register(payload) => payload.validate(),
        }
    }
}

pub struct AuthController {
    api: Arc<dyn IdentityApi>,
    store: Arc<dyn SessionStore>,
    policy: HydrationPolicy,
    state: watch::Sender<Session>,
    transitions: broadcast::Sender<Session>,
    generation: AtomicU64,
}

impl AuthController {
    /// Create a controller in `Initializing`. Call [`AuthController::init`]
    /// next to hydrate from the store.
    #[must_use]
    pub fn new(api: Arc<dyn IdentityApi>, store: Arc<dyn SessionStore>, policy: HydrationPolicy) -> Self {
        let (state, _) = watch::channel(Session::initializing());
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self { api, store, policy, state, transitions, generation: AtomicU64::new(0) }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    /// Latest-value view of the session, for guards and views that re-render.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Every committed session, in commit order, from now on.
    #[must_use]
    pub fn transitions(&self) -> broadcast::Receiver<Session> {
        self.transitions.subscribe()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Hydrate from the session store. Only acts while `Initializing`.
    pub async fn init(&self) {
        let Some(generation) = self.claim_initialization() else {
            tracing::warn!(status = %self.status(), "init called after hydration; ignoring");
            return;
        };

        let Some(stored) = self.store.load() else {
            tracing::info!("no stored session");
            self.commit(generation, |session| *session = Session::unauthenticated(None));
            return;
        };

        match self.policy {
            HydrationPolicy::Trust => {
                tracing::info!(email = %stored.user.email, "restored session from store");
                self.commit(generation, |session| *session = Session::authenticated(stored.token, stored.user));
            }
            HydrationPolicy::Validate => {
                let reply = self.api.validate_token(&stored.token).await;
                let committed = self.commit(generation, |session| match reply {
                    Ok(user) => {
                        tracing::info!(email = %user.email, "stored session validated");
                        self.persist(&stored.token, &user);
                        *session = Session::authenticated(stored.token, user);
                    }
                    Err(AuthError::InvalidCredentials(reason)) => {
                        tracing::info!(%reason, "stored token rejected; clearing it");
                        self.forget();
                        *session = Session::unauthenticated(Some(SESSION_EXPIRED_MESSAGE.to_owned()));
                    }
                    Err(error) => {
                        tracing::warn!(%error, "could not validate stored session; keeping it for next start");
                        *session = Session::unauthenticated(Some(error.user_message()));
                    }
                });
                if !committed {
                    tracing::info!("hydration superseded; discarding validation reply");
                }
            }
        }
    }

    /// End of the controller's life. Replies still in flight are discarded;
    /// the persisted session is left as it is.
    pub fn teardown(&self) {
        self.state.send_if_modified(|_| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            false
        });
        tracing::info!("auth controller torn down");
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Sign in with email + password.
    ///
    /// # Errors
    ///
    /// `ConcurrentRequest` while another attempt is in flight,
    /// `InvalidTransition` outside `Unauthenticated`, `Validation` for bad
    /// input (no network call), `Superseded` if a logout overtook the reply,
    /// or the identity service's error.
    pub async fn login(&self, credentials: Credentials) -> Result<User, AuthError> {
        self.authenticate(Attempt::Login(credentials)).await
    }

    /// Create an account and sign it in. Same contract as [`AuthController::login`].
    ///
    /// # Errors
    ///
    /// See [`AuthController::login`].
    pub async fn register(&self, payload: RegistrationPayload) -> Result<User, AuthError> {
        self.authenticate(Attempt::Register(payload.normalized())).await
    }

    /// Sign out from any state. Store and memory are cleared in one commit;
    /// server-side invalidation runs in the background if a runtime exists.
    pub fn logout(&self) {
        let mut revoked = None;
        self.state.send_modify(|session| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            revoked = session.token().map(ToOwned::to_owned);
            self.forget();
            *session = Session::unauthenticated(None);
            self.publish(session);
        });
        tracing::info!("signed out");

        if let Some(token) = revoked {
            self.revoke_in_background(token);
        }
    }

    /// Dismiss the current error message without changing status.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|session| {
            let changed = session.dismiss_error();
            if changed {
                self.publish(session);
            }
            changed
        });
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn authenticate(&self, attempt: Attempt) -> Result<User, AuthError> {
        let generation = self.begin(&attempt)?;
        tracing::info!(kind = attempt.kind(), email = %attempt.email(), generation, "authenticating");

        let reply = match &attempt {
            Attempt::Login(credentials) => self.api.login(credentials).await,
            Attempt::Register(payload) => self.api.register(payload).await,
        }
        .and_then(|success| success.verified(None));
        self.finish(generation, attempt.kind(), reply)
    }

    /// Gate + validate + move to `Authenticating`, all in one commit.
    fn begin(&self, attempt: &Attempt) -> Result<u64, AuthError> {
        let mut outcome = Err(AuthError::ConcurrentRequest);
        self.state.send_if_modified(|session| match session.status() {
            SessionStatus::Unauthenticated => {
                if let Err(error) = attempt.validate() {
                    tracing::debug!(kind = attempt.kind(), %error, "rejected before sending");
                    session.set_error(error.user_message());
                    self.publish(session);
                    outcome = Err(error);
                    return true;
                }
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *session = Session::authenticating();
                self.publish(session);
                outcome = Ok(generation);
                true
            }
            SessionStatus::Authenticating => {
                tracing::warn!(kind = attempt.kind(), "sign-in already in progress; rejecting");
                false
            }
            other => {
                outcome = Err(AuthError::InvalidTransition(other));
                false
            }
        });
        outcome
    }

    fn finish(
        &self,
        generation: u64,
        kind: &'static str,
        reply: Result<AuthSuccess, AuthError>,
    ) -> Result<User, AuthError> {
        let mut result = Err(AuthError::Superseded);
        let committed = self.commit(generation, |session| match reply {
            Ok(AuthSuccess { token, user }) => {
                tracing::info!(kind, email = %user.email, role = %user.role, "authenticated");
                self.persist(&token, &user);
                result = Ok(user.clone());
                *session = Session::authenticated(token, user);
            }
            Err(error) => {
                tracing::info!(kind, %error, "authentication failed");
                let message = error.is_recorded().then(|| error.user_message());
                *session = Session::unauthenticated(message);
                result = Err(error);
            }
        });
        if !committed {
            tracing::info!(kind, generation, "discarding superseded identity reply");
        }
        result
    }

    /// Take ownership of hydration if still `Initializing`.
    fn claim_initialization(&self) -> Option<u64> {
        let mut claimed = None;
        self.state.send_if_modified(|session| {
            if session.status() == SessionStatus::Initializing {
                claimed = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            }
            false
        });
        claimed
    }

    /// Apply `apply` if `generation` is still current, then notify observers.
    fn commit<F>(&self, generation: u64, apply: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        self.state.send_if_modified(|session| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            apply(session);
            self.publish(session);
            true
        })
    }

    fn publish(&self, session: &Session) {
        // Err only means nobody is listening.
        if let Err(unheard) = self.transitions.send(session.clone()) {
            tracing::trace!(status = %unheard.0.status(), "no transition listeners");
        }
    }

    fn persist(&self, token: &str, user: &User) {
        if let Err(error) = self.store.save(token, user) {
            tracing::warn!(%error, "failed to persist session; it will not survive a restart");
        }
    }

    fn forget(&self) {
        if let Err(error) = self.store.clear() {
            tracing::warn!(%error, "failed to clear persisted session");
        }
    }

    fn revoke_in_background(&self, token: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime; skipping server-side sign-out");
            return;
        };
        let api = Arc::clone(&self.api);
        runtime.spawn(async move {
            if let Err(error) = api.invalidate(&token).await {
                tracing::debug!(%error, "server-side sign-out failed; ignoring");
            }
        });
    }
}
