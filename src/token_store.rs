//! Credential storage shared by every request a client issues

use crate::types::{AuthState, SessionCredentials};
use parking_lot::RwLock;
use std::sync::Arc;

/// Storage capability the client is built on.
///
/// The session is held as a single value: `set` and `clear` replace all of
/// access token, refresh token and identity at once, never one field at a time.
pub trait CredentialStore: Send + Sync + 'static {
    /// Current session, if any
    fn get(&self) -> Option<SessionCredentials>;

    /// Replace the whole session
    fn set(&self, credentials: SessionCredentials);

    /// Drop the whole session
    fn clear(&self);

    /// Swap in a refreshed access token, plus the refresh token if the backend rotated it.
    ///
    /// Returns `false` (and stores nothing) when there is no session to update, so a
    /// refresh finishing after a logout cannot bring the session back.
    fn update_access_token(&self, access_token: String, rotated_refresh: Option<String>) -> bool;

    /// Remember the email an OTP was sent to
    fn set_pending_email(&self, email: String);

    fn pending_email(&self) -> Option<String>;

    /// Consume the pending OTP email
    fn take_pending_email(&self) -> Option<String>;

    fn access_token(&self) -> Option<String> {
        self.get().map(|c| c.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get().and_then(|c| c.refresh_token)
    }

    fn identity(&self) -> Option<String> {
        self.get().and_then(|c| c.identity)
    }

    fn has_tokens(&self) -> bool {
        self.get().is_some()
    }

    fn auth_state(&self) -> AuthState {
        AuthState::from(self.get().as_ref())
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    pub(crate) session: Option<SessionCredentials>,
    pub(crate) pending_email: Option<String>,
}

impl StoreState {
    pub(crate) fn update_access_token(
        &mut self,
        access_token: String,
        rotated_refresh: Option<String>,
    ) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.access_token = access_token;
        if let Some(refresh) = rotated_refresh.filter(|r| !r.is_empty()) {
            session.refresh_token = Some(refresh);
        }
        true
    }
}

/// In-memory credential store
///
/// Cloning is cheap and every clone shares the same session.
#[derive(Clone, Default)]
pub struct TokenStore {
    state: Arc<RwLock<StoreState>>,
}

impl TokenStore {
    /// Create an empty token store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts out logged in
    pub fn with_credentials(credentials: SessionCredentials) -> Self {
        let store = Self::new();
        store.set(credentials);
        store
    }
}

impl CredentialStore for TokenStore {
    fn get(&self) -> Option<SessionCredentials> {
        self.state.read().session.clone()
    }

    fn set(&self, credentials: SessionCredentials) {
        self.state.write().session = Some(credentials);
    }

    fn clear(&self) {
        self.state.write().session = None;
    }

    fn update_access_token(&self, access_token: String, rotated_refresh: Option<String>) -> bool {
        self.state
            .write()
            .update_access_token(access_token, rotated_refresh)
    }

    fn set_pending_email(&self, email: String) {
        self.state.write().pending_email = Some(email);
    }

    fn pending_email(&self) -> Option<String> {
        self.state.read().pending_email.clone()
    }

    fn take_pending_email(&self) -> Option<String> {
        self.state.write().pending_email.take()
    }
}
