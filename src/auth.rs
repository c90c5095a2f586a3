//! Login, registration, OTP and logout against `/auth/*`

use crate::api_client::{ApiClient, ApiRequest, RefreshRequest};
use crate::error::{ClientError, Result};
use crate::extract;
use crate::types::SessionCredentials;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/auth/login/";
pub const REGISTER_PATH: &str = "/auth/register/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const REQUEST_OTP_PATH: &str = "/auth/request-otp/";
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp/";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password/";
pub const CURRENT_USER_PATH: &str = "/auth/me/";

fn user_path(id: u64) -> String {
    format!("/auth/users/{id}/")
}

fn update_user_path(id: u64) -> String {
    format!("/auth/users/{id}/update/")
}

/// Keys the backend uses to acknowledge a request that issues no tokens
const ACK_KEYS: &[&str] = &["message", "success", "detail"];

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct VerifyOtpRequest<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

/// Result of a registration
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Set when the backend logged the new account in straight away
    pub session: Option<SessionCredentials>,
    /// Acknowledgement text when it did not
    pub message: Option<String>,
}

/// Build a session from a token-issuing response.
///
/// A usable access token is the success criterion; HTTP 200 without one is a failure.
fn session_from_response(
    body: &Value,
    source: &'static str,
    fallback_identity: Option<&str>,
) -> Result<SessionCredentials> {
    let access_token = extract::access_token(body).ok_or(ClientError::MissingToken(source))?;

    Ok(SessionCredentials::new(access_token)
        .with_refresh_token(extract::refresh_token(body))
        .with_identity(extract::identity(body).or_else(|| fallback_identity.map(str::to_owned))))
}

impl ApiClient {
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionCredentials> {
        let request = ApiRequest::post(LOGIN_PATH)
            .json(&LoginRequest { username, password })?
            .without_refresh();
        let body = self.send_json(request).await?;

        let credentials = session_from_response(&body, "login", Some(username))?;
        self.store().set(credentials.clone());

        info!(identity = ?credentials.identity, "Logged in");
        Ok(credentials)
    }

    /// Register a new account.
    ///
    /// If the backend returns tokens the client is logged in. Otherwise the
    /// acknowledgement is returned and `email` is kept for the OTP step.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Registration> {
        let request = ApiRequest::post(REGISTER_PATH)
            .json(&RegisterRequest {
                username,
                email,
                password,
            })?
            .without_refresh();
        let body = self.send_json(request).await?;
        let message = extract::first_string(&body, ACK_KEYS);

        if extract::access_token(&body).is_some() {
            let credentials = session_from_response(&body, "register", Some(username))?;
            self.store().set(credentials.clone());
            info!(identity = ?credentials.identity, "Registered and logged in");

            return Ok(Registration {
                session: Some(credentials),
                message,
            });
        }

        match message {
            Some(message) => {
                self.store().set_pending_email(email.to_string());
                info!("Registered, awaiting OTP verification");
                Ok(Registration {
                    session: None,
                    message: Some(message),
                })
            }
            None => Err(ClientError::MissingToken("register")),
        }
    }

    /// Best-effort server logout, then an unconditional local clear.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store().refresh_token() {
            if let Err(e) = self.logout_remote(&refresh_token).await {
                warn!(error = %e, "Logout request failed, clearing local session anyway");
            }
        }

        self.store().clear();
        info!("Logged out");
    }

    async fn logout_remote(&self, refresh_token: &str) -> Result<()> {
        let request = ApiRequest::post(LOGOUT_PATH)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })?
            .without_refresh();
        self.send_json(request).await?;
        debug!("Server-side logout succeeded");
        Ok(())
    }

    /// Ask the backend to email an OTP. Remembers `email` for `verify_pending_otp`.
    pub async fn request_otp(&self, email: &str) -> Result<String> {
        let request = ApiRequest::post(REQUEST_OTP_PATH)
            .json(&OtpRequest { email })?
            .without_refresh();
        let body = self.send_json(request).await?;

        let message = extract::first_string(&body, ACK_KEYS)
            .ok_or_else(|| ClientError::InvalidResponse("Failed to send OTP".to_string()))?;

        self.store().set_pending_email(email.to_string());
        Ok(message)
    }

    /// Verify an OTP and log in with the tokens it yields.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<SessionCredentials> {
        let request = ApiRequest::post(VERIFY_OTP_PATH)
            .json(&VerifyOtpRequest { email, otp })?
            .without_refresh();
        let body = self.send_json(request).await?;

        let access_token =
            extract::access_token(&body).ok_or(ClientError::MissingToken("OTP verification"))?;
        let credentials = SessionCredentials::new(access_token)
            .with_refresh_token(extract::refresh_token(&body))
            .with_identity(Some(email.to_string()));

        self.store().set(credentials.clone());
        self.store().take_pending_email();

        info!(identity = %email, "OTP verified, logged in");
        Ok(credentials)
    }

    /// `verify_otp` for the email remembered by `request_otp` or `register`.
    pub async fn verify_pending_otp(&self, otp: &str) -> Result<SessionCredentials> {
        let email = self.store().pending_email().ok_or(ClientError::NoPendingOtp)?;
        self.verify_otp(&email, otp).await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<Option<String>> {
        let request = ApiRequest::post(CHANGE_PASSWORD_PATH).json(&ChangePasswordRequest {
            old_password,
            new_password,
        })?;
        let body = self.send_json(request).await?;
        Ok(extract::first_string(&body, &["message", "detail"]))
    }

    pub async fn current_user(&self) -> Result<Value> {
        self.get_json(CURRENT_USER_PATH).await
    }

    pub async fn get_user(&self, id: u64) -> Result<Value> {
        self.get_json(&user_path(id)).await
    }

    /// Partially update a user profile; `changes` holds only the fields to change
    pub async fn update_user(&self, id: u64, changes: &Value) -> Result<Value> {
        let request = ApiRequest::new(Method::PATCH, update_user_path(id)).json(changes)?;
        self.send_json(request).await
    }
}
