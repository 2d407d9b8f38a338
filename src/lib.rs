//! Session core for the sports portal front-end.
//!
//! SYSTEM CONTEXT
//! ==============
//! The portal identity service issues bearer tokens for players, coaches,
//! officials and viewers. This crate owns everything between that service and
//! the views: the in-memory [`Session`], its durable copy in a
//! [`SessionStore`], the [`AuthController`] state machine that moves between
//! them, and the stateless route guard that decides what a view may render.
//!
//! ```text
//!   views ──login/register/logout──▶ AuthController ──▶ IdentityApi (HTTP)
//!     ▲                                   │
//!     └──── watch / broadcast ◀───────────┴──▶ SessionStore (file)
//! ```
//!
//! The `portal` binary is a thin command-line front-end over the same types.

pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod identity;
pub mod session;
pub mod store;

pub use config::{ConfigError, PortalConfig};
pub use controller::{AuthController, HydrationPolicy};
pub use error::AuthError;
pub use guard::{GuardDecision, Route};
pub use identity::{AuthSuccess, Credentials, HttpIdentityClient, IdentityApi, RegistrationPayload, Timeouts};
pub use session::{Role, Session, SessionStatus, User};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StorageError, StoredSession};
