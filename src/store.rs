//! Durable persistence of the current session across restarts.
//!
//! SYSTEM CONTEXT
//! ==============
//! Only `AuthController` writes here. A record is a single serialized
//! `{token, user}` document; anything missing, unreadable or malformed loads
//! as "no session" so a damaged profile never blocks startup.
//!
//! TRADE-OFFS
//! ==========
//! `FileSessionStore` writes through a temp file and renames it into place.
//! That costs an extra syscall per save but a crash mid-write leaves either
//! the old record or the new one, never a truncated file.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::session::User;

pub const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session store io failed: {0}")]
    Io(#[from] io::Error),
    #[error("session encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The persisted `{token, user}` record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: User,
}

/// Key/value persistence for exactly one session record.
pub trait SessionStore: Send + Sync {
    /// Persist the pair, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the record cannot be encoded or written.
    fn save(&self, token: &str, user: &User) -> Result<(), StorageError>;

    /// Return the persisted record, or `None` when absent or unreadable.
    fn load(&self) -> Option<StoredSession>;

    /// Remove the persisted record. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if an existing record cannot be removed.
    fn clear(&self) -> Result<(), StorageError>;
}

fn encode_record(token: &str, user: &User) -> Result<String, StorageError> {
    let record = StoredSession { token: token.to_owned(), user: user.clone() };
    Ok(serde_json::to_string_pretty(&record)?)
}

/// Parse a stored record. Empty tokens count as corruption.
fn decode_record(raw: &str) -> Option<StoredSession> {
    match serde_json::from_str::<StoredSession>(raw) {
        Ok(record) if !record.token.trim().is_empty() => Some(record),
        Ok(_) => {
            tracing::warn!("stored session has an empty token; ignoring it");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored session is unreadable; ignoring it");
            None
        }
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Session store backed by a single JSON file in the user's profile.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, token: &str, user: &User) -> Result<(), StorageError> {
        let raw = encode_record(token, user)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        write_private(&temp, raw.as_bytes())?;
        fs::rename(&temp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn load(&self) -> Option<StoredSession> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode_record(&raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session file unreadable");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to `path`, readable only by the owner on unix.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Keeps the serialized form so corrupted input can be
/// exercised the same way as on disk.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with arbitrary stored text, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(raw.into())) }
    }

    /// The stored text, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, token: &str, user: &User) -> Result<(), StorageError> {
        let raw = encode_record(token, user)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn load(&self) -> Option<StoredSession> {
        let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
        raw.as_deref().and_then(decode_record)
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
