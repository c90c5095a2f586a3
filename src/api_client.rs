//! Authenticated HTTP client with transparent token refresh

use crate::config::ClientConfig;
use crate::error::{ClientError, RefreshFailure, Result};
use crate::extract;
use crate::file_store::FileTokenStore;
use crate::token_store::{CredentialStore, TokenStore};
use crate::types::AuthState;
use async_singleflight::Group;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";

/// All concurrent refreshes share this singleflight key
const REFRESH_FLIGHT_KEY: &str = "token-refresh";

/// Body of the refresh and logout calls
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub(crate) refresh: &'a str,
}

/// A request that can be dispatched, and replayed once after a token refresh
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    /// Single-shot marker: set once the request has gone through 401 recovery
    retried: bool,
    /// Whether a 401 should trigger refresh-and-replay at all
    refresh_on_unauthorized: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
            refresh_on_unauthorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Return 401s as-is instead of refreshing.
    ///
    /// Used for endpoints where a 401 means bad credentials rather than an expired session.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// A response as the backend sent it
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON body; a non-JSON body is kept as a string and an empty one is `Null`
    pub body: Value,
}

impl ApiResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(Self { status, body })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body on 2xx, `ClientError::Api` otherwise
    pub fn into_result(self) -> Result<Value> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(ClientError::Api {
                status: self.status.as_u16(),
                body: self.body,
            })
        }
    }
}

/// Notified when the session ends because it could not be recovered.
///
/// Takes the place of redirecting to a login page: the caller decides what "go log in
/// again" means. Not called for an explicit logout.
pub trait SessionListener: Send + Sync + 'static {
    fn on_session_expired(&self);
}

impl<F> SessionListener for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn on_session_expired(&self) {
        self()
    }
}

/// HTTP client for the GSSC backend
///
/// Attaches the stored access token to every request. A 401 triggers at most one
/// refresh and one replay per request; concurrent 401s share a single refresh call.
pub struct ApiClient {
    config: ClientConfig,
    http_client: Client,
    store: Arc<dyn CredentialStore>,
    session_listener: Option<Arc<dyn SessionListener>>,
    /// Singleflight group so concurrent 401s wait on one refresh instead of racing
    /// each other with the same refresh token
    refresh_singleflight: Group<String, RefreshFailure>,
}

impl ApiClient {
    /// Create a client whose store is picked from the config: a session file when
    /// `session_file` is set, memory otherwise.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store: Arc<dyn CredentialStore> = match &config.session_file {
            Some(path) => Arc::new(FileTokenStore::open(path)?),
            None => Arc::new(TokenStore::new()),
        };
        Self::with_store(config, store)
    }

    /// Create a client over an existing credential store
    pub fn with_store(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
            store,
            session_listener: None,
            refresh_singleflight: Group::new(),
        })
    }

    pub fn with_session_listener(mut self, listener: impl SessionListener) -> Self {
        let listener: Arc<dyn SessionListener> = Arc::new(listener);
        self.session_listener = Some(listener);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn auth_state(&self) -> AuthState {
        self.store.auth_state()
    }

    /// Dispatch a request, recovering from one expired access token.
    ///
    /// Any status other than a recoverable 401 comes back as `Ok`, untouched. Errors are
    /// transport failures and refresh failures only.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let sent_with = self.store.access_token();
        let response = self.dispatch(&request, sent_with.as_deref()).await?;

        if response.status != StatusCode::UNAUTHORIZED
            || request.retried
            || !request.refresh_on_unauthorized
        {
            return Ok(response);
        }
        request.retried = true;

        debug!(method = %request.method, path = %request.path, "Received 401, attempting token recovery");

        let Some(access_token) = self.recover(sent_with.as_deref()).await? else {
            return Ok(response);
        };

        debug!(method = %request.method, path = %request.path, "Replaying request with refreshed token");
        self.dispatch(&request, Some(&access_token)).await
    }

    /// `execute`, then turn any non-2xx into `ClientError::Api`
    pub async fn send_json(&self, request: ApiRequest) -> Result<Value> {
        self.execute(request).await?.into_result()
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        self.send_json(ApiRequest::get(path)).await
    }

    async fn dispatch(&self, request: &ApiRequest, access_token: Option<&str>) -> Result<ApiResponse> {
        let url = self.config.endpoint(&request.path)?;
        let mut builder = self.http_client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        ApiResponse::read(response).await
    }

    /// Find an access token to replay with, or `None` if the session is gone.
    async fn recover(&self, sent_with: Option<&str>) -> Result<Option<String>> {
        match self.store.get() {
            // Another request refreshed while this one was in flight
            Some(current) if sent_with != Some(current.access_token.as_str()) => {
                debug!("Access token already rotated, skipping refresh");
                return Ok(Some(current.access_token));
            }
            Some(current) if current.refresh_token.is_some() => {}
            // Cleared by a concurrent failed refresh or a logout; already reported
            None if sent_with.is_some() => {
                debug!("Session ended while request was in flight");
                return Ok(None);
            }
            _ => {
                warn!("Unauthorized and no refresh token available");
                self.expire_session();
                return Ok(None);
            }
        }

        self.refresh_access_token_singleflight().await.map(Some)
    }

    async fn refresh_access_token_singleflight(&self) -> Result<String> {
        loop {
            let (token_opt, failure_opt, shared) = self
                .refresh_singleflight
                .work(REFRESH_FLIGHT_KEY, async {
                    match self.refresh_access_token().await {
                        Ok(access_token) => Ok(access_token),
                        Err(failure) => {
                            warn!(error = %failure, "Token refresh failed");
                            // An empty store means the session was ended on purpose
                            if self.store.has_tokens() {
                                self.expire_session();
                            }
                            Err(failure)
                        }
                    }
                })
                .await;

            if shared {
                debug!("Token refresh result shared with concurrent requests");
            }

            match (token_opt, failure_opt) {
                (Some(token), _) => return Ok(token),
                (None, Some(failure)) => return Err(failure.into()),
                // The request leading the refresh was dropped before it finished,
                // so there is no outcome yet
                (None, None) => debug!("Token refresh abandoned by its caller, retrying"),
            }
        }
    }

    /// Exchange the stored refresh token for a new access token and store it.
    ///
    /// The refresh call never carries an `Authorization` header.
    async fn refresh_access_token(&self) -> std::result::Result<String, RefreshFailure> {
        let failure = |status: Option<u16>, message: String| RefreshFailure { status, message };

        let refresh_token = self
            .store
            .refresh_token()
            .ok_or_else(|| failure(None, "No refresh token available".to_string()))?;

        let url = self
            .config
            .endpoint(TOKEN_REFRESH_PATH)
            .map_err(|e| failure(None, e.to_string()))?;

        let response = self
            .http_client
            .post(url)
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| failure(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let response = ApiResponse::read(response)
            .await
            .map_err(|e| failure(None, e.to_string()))?;

        if !response.is_success() {
            let status = response.status.as_u16();
            let message = extract::error_message(&response.body)
                .unwrap_or_else(|| format!("Refresh rejected with status {status}"));
            return Err(failure(Some(status), message));
        }

        let access_token = extract::access_token(&response.body).ok_or_else(|| {
            failure(
                Some(response.status.as_u16()),
                "No access token in refresh response".to_string(),
            )
        })?;
        let rotated_refresh = extract::refresh_token(&response.body);

        if !self
            .store
            .update_access_token(access_token.clone(), rotated_refresh)
        {
            return Err(failure(None, "Session ended during token refresh".to_string()));
        }

        info!("Access token refreshed successfully");
        Ok(access_token)
    }

    /// Drop the session and tell whoever is listening
    fn expire_session(&self) {
        self.store.clear();
        info!("Session cleared");

        if let Some(listener) = &self.session_listener {
            listener.on_session_expired();
        }
    }
}
