//! Client configuration loaded from environment variables.

use crate::error::{ClientError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://localhost:8000`. Endpoint paths are joined onto it.
    pub base_url: Url,
    /// Applied to every request, including refresh and replay
    pub timeout: Duration,
    /// Where to persist the session. `None` keeps it in memory only.
    pub session_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Load configuration from environment variables (and `.env` if present).
    ///
    /// - `GSSC_API_BASE_URL` (default `http://localhost:8000`)
    /// - `GSSC_HTTP_TIMEOUT_SECS` (default 30)
    /// - `GSSC_SESSION_FILE` (optional)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base_url =
            env::var("GSSC_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = match env::var("GSSC_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ClientError::Configuration(format!("GSSC_HTTP_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: parse_base_url(&base_url)?,
            timeout: Duration::from_secs(timeout_secs),
            session_file: env::var("GSSC_SESSION_FILE")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Absolute URL for an endpoint path such as `/auth/login/`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Configuration(format!("Invalid endpoint path {path}: {e}")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ClientError::Configuration(format!("Invalid base URL {raw}: {e}")))?;

    if url.cannot_be_a_base() {
        return Err(ClientError::Configuration(format!(
            "Base URL cannot have paths joined onto it: {raw}"
        )));
    }

    // Without a trailing slash, Url::join would replace the last path segment
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
