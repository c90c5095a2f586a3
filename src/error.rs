//! Error types for the GSSC client

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::extract;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// No response was received (connection refused, DNS, timeout)
    #[error("Unable to connect to server: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("API error with status {status}: {}", extract::error_message(.body).unwrap_or_default())]
    Api { status: u16, body: Value },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    /// HTTP success, but no usable access token in the body
    #[error("No access token received from {0}")]
    MissingToken(&'static str),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("No email pending OTP verification")]
    NoPendingOtp,
}

impl ClientError {
    /// HTTP status of the failed call, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::RefreshFailed(failure) => failure.status,
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable message, preferring whatever the backend said.
    pub fn message(&self) -> String {
        match self {
            ClientError::Api { status, body } => extract::error_message(body)
                .unwrap_or_else(|| format!("Server error: {status}")),
            other => other.to_string(),
        }
    }
}

/// Outcome of a failed refresh call.
///
/// Cloneable so that every request waiting on a coalesced refresh receives the same error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    /// `None` when the refresh never got a response, or no refresh token was stored
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RefreshFailure {}

pub type Result<T> = std::result::Result<T, ClientError>;
