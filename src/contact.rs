//! Contact form submission

use crate::api_client::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::extract;
use serde::Serialize;

pub const CONTACT_PATH: &str = "/contact/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactMessage {
    pub fn new(name: &str, email: &str, message: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            message: message.trim().to_string(),
        }
    }
}

impl ApiClient {
    /// Returns the backend's confirmation text, if any
    pub async fn send_contact(&self, contact: &ContactMessage) -> Result<Option<String>> {
        let body = self
            .send_json(ApiRequest::post(CONTACT_PATH).json(contact)?)
            .await?;
        Ok(extract::first_string(&body, &["message", "detail", "response"]))
    }
}
