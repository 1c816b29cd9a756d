//! Session credential holder.
//!
//! [`CredentialHolder`] owns the bearer token for the process. It keeps an
//! in-memory copy for the request pipeline to read on every call and writes
//! through to a [`CredentialStorage`] so the session survives a restart.
//!
//! Presence of a token is the only meaning of "authenticated" on the client.
//! Nothing here checks expiry: an expired token is discovered when the server
//! answers 401 and the pipeline calls [`CredentialHolder::clear`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::warn;

use crate::error::SessionError;

/// Fixed storage key; the credential file inside the data directory.
pub const TOKEN_KEY: &str = "needle_token";

static WRITE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Durable backing store for the credential.
pub trait CredentialStorage: Send + Sync {
    /// Read the stored credential, `None` if there is none.
    fn load(&self) -> Result<Option<String>, SessionError>;
    /// Persist `token`, replacing any previous value.
    fn save(&self, token: &str) -> Result<(), SessionError>;
    /// Delete the stored credential. Succeeds if nothing was stored.
    fn remove(&self) -> Result<(), SessionError>;
}

/// Credential kept in a single file, `<dir>/needle_token`.
///
/// Writes use a temp-file-then-rename so a crash never leaves a truncated
/// token behind. On Unix the file is created with mode `0600`.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(TOKEN_KEY),
        }
    }

    /// Full path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> SessionError {
        SessionError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        let parent = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;

        let seq = WRITE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = parent.join(format!(".{TOKEN_KEY}_tmp_{}_{seq}", std::process::id()));

        if let Err(e) = write_private(&temp_path, token) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(self.write_err(e));
        }

        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            self.write_err(e)
        })
    }

    fn remove(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Create `path` and write `contents`. On Unix the file is `0600` from the
/// moment it exists.
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// Process-local storage; the credential dies with the process.
#[derive(Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), SessionError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// The single live bearer credential.
///
/// Shared by `Arc` between the request pipeline, the route guard and the
/// auth store. The lock is never held across an `.await`.
pub struct CredentialHolder {
    storage: Box<dyn CredentialStorage>,
    token: RwLock<Option<String>>,
}

impl CredentialHolder {
    /// Open a holder over `storage`, loading any credential left by a
    /// previous run.
    pub fn open(storage: impl CredentialStorage + 'static) -> Result<Self, SessionError> {
        let token = storage.load()?;
        Ok(Self {
            storage: Box::new(storage),
            token: RwLock::new(token),
        })
    }

    /// A holder that persists nothing.
    pub fn ephemeral() -> Self {
        Self {
            storage: Box::new(MemoryStorage::default()),
            token: RwLock::new(None),
        }
    }

    /// The current credential, if any.
    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a credential is present. Says nothing about its validity.
    pub fn is_present(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace the credential.
    ///
    /// The in-memory value is updated first, so the current process is
    /// signed in even when persisting fails; the error is still returned.
    pub fn set(&self, token: impl Into<String>) -> Result<(), SessionError> {
        let token = token.into();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        self.storage.save(&token)
    }

    /// Drop the credential. Idempotent.
    pub fn clear(&self) -> Result<(), SessionError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.storage.remove()
    }

    /// Clear, logging instead of returning a storage failure.
    pub(crate) fn clear_logged(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "could not remove stored credential");
        }
    }
}
