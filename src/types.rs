//! Session types shared by the store and the client

use serde::{Deserialize, Serialize};

/// Credentials for one logged-in session (access + refresh + who it belongs to)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub access_token: String,
    /// Absent when the backend did not issue one; refresh is then unavailable
    pub refresh_token: Option<String>,
    /// Username or email shown to the user. Never used for authorization.
    pub identity: Option<String>,
}

impl SessionCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            identity: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        // The backend sometimes sends "" for "no refresh token"
        self.refresh_token = refresh_token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_identity(mut self, identity: Option<String>) -> Self {
        self.identity = identity;
        self
    }
}

/// Client-wide authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated { identity: Option<String> },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

impl From<Option<&SessionCredentials>> for AuthState {
    fn from(credentials: Option<&SessionCredentials>) -> Self {
        match credentials {
            Some(c) => AuthState::Authenticated {
                identity: c.identity.clone(),
            },
            None => AuthState::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_refresh_token_is_dropped() {
        let creds = SessionCredentials::new("A1").with_refresh_token(Some(String::new()));
        assert_eq!(creds.refresh_token, None);

        let creds = SessionCredentials::new("A1").with_refresh_token(Some("R1".to_string()));
        assert_eq!(creds.refresh_token.as_deref(), Some("R1"));
    }

    #[test]
    fn test_auth_state_from_credentials() {
        let creds = SessionCredentials::new("A1").with_identity(Some("u".to_string()));
        assert_eq!(
            AuthState::from(Some(&creds)),
            AuthState::Authenticated {
                identity: Some("u".to_string())
            }
        );
        assert!(!AuthState::from(None).is_authenticated());
    }
}
