//! Credential store persisted to a JSON file

use crate::error::Result;
use crate::token_store::{CredentialStore, StoreState};
use crate::types::SessionCredentials;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// On-disk layout. Keys match what the web front-end kept in local storage.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    otp_email: Option<String>,
}

impl From<PersistedSession> for StoreState {
    fn from(persisted: PersistedSession) -> Self {
        // A file without an access token is a logged-out session, whatever else it holds
        let session = persisted.access_token.filter(|t| !t.is_empty()).map(|access| {
            SessionCredentials::new(access)
                .with_refresh_token(persisted.refresh_token)
                .with_identity(persisted.username)
        });

        StoreState {
            session,
            pending_email: persisted.otp_email,
        }
    }
}

impl From<&StoreState> for PersistedSession {
    fn from(state: &StoreState) -> Self {
        let session = state.session.as_ref();
        PersistedSession {
            access_token: session.map(|s| s.access_token.clone()),
            refresh_token: session.and_then(|s| s.refresh_token.clone()),
            username: session.and_then(|s| s.identity.clone()),
            otp_email: state.pending_email.clone(),
        }
    }
}

/// Durable credential store
///
/// Every change rewrites the whole file (write to a sibling temp file, then rename),
/// so a crash never leaves half a session on disk. Write failures are logged and the
/// in-memory session stays authoritative.
#[derive(Clone)]
pub struct FileTokenStore {
    path: Arc<PathBuf>,
    state: Arc<RwLock<StoreState>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any session saved there.
    ///
    /// A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<PersistedSession>(&bytes)?.into(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), logged_in = state.session.is_some(), "Opened session file");

        Ok(Self {
            path: Arc::new(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, state: &StoreState) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(&PersistedSession::from(state))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.path.as_path())
    }

    /// Apply `f` and persist the result while still holding the lock, so file
    /// contents follow the same order as in-memory updates.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.write();
        let result = f(&mut state);
        if let Err(e) = self.write_file(&state) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session file");
        }
        result
    }
}

impl CredentialStore for FileTokenStore {
    fn get(&self) -> Option<SessionCredentials> {
        self.state.read().session.clone()
    }

    fn set(&self, credentials: SessionCredentials) {
        self.mutate(|s| s.session = Some(credentials));
    }

    fn clear(&self) {
        self.mutate(|s| s.session = None);
    }

    fn update_access_token(&self, access_token: String, rotated_refresh: Option<String>) -> bool {
        self.mutate(|s| s.update_access_token(access_token, rotated_refresh))
    }

    fn set_pending_email(&self, email: String) {
        self.mutate(|s| s.pending_email = Some(email));
    }

    fn pending_email(&self) -> Option<String> {
        self.state.read().pending_email.clone()
    }

    fn take_pending_email(&self) -> Option<String> {
        self.mutate(|s| s.pending_email.take())
    }
}
