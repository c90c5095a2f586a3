//! AI chatbot history and messaging

use crate::api_client::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::extract;
use serde::Serialize;
use serde_json::Value;

pub const CHAT_HISTORY_PATH: &str = "/chatbot/chat/";
pub const CHAT_MESSAGE_PATH: &str = "/chatbot/message/";

/// One question and its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub user: String,
    pub ai: String,
}

#[derive(Serialize)]
struct ChatQuery<'a> {
    query: &'a str,
}

/// Order history turns by the number in their key (`response2` before `response10`).
///
/// Turns missing either side are dropped. Keys without digits sort first.
pub fn history_from_body(body: &Value) -> Vec<ChatTurn> {
    let Some(map) = body.as_object() else {
        return Vec::new();
    };

    let mut turns: Vec<(String, ChatTurn)> = map
        .iter()
        .filter_map(|(key, entry)| {
            let user = entry.get("userresponse")?.as_str().filter(|s| !s.is_empty())?;
            let ai = entry.get("airesponse")?.as_str().filter(|s| !s.is_empty())?;
            Some((
                key_number(key),
                ChatTurn {
                    user: user.to_string(),
                    ai: ai.to_string(),
                },
            ))
        })
        .collect();

    turns.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    turns.into_iter().map(|(_, turn)| turn).collect()
}

/// Digits of `key` without leading zeros; equal-length strings compare numerically
fn key_number(key: &str) -> String {
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    digits.trim_start_matches('0').to_string()
}

impl ApiClient {
    pub async fn chat_history(&self) -> Result<Vec<ChatTurn>> {
        let body = self.get_json(CHAT_HISTORY_PATH).await?;
        Ok(history_from_body(&body))
    }

    /// Send a question; returns the bot's reply if the backend gave one
    pub async fn send_chat(&self, query: &str) -> Result<Option<String>> {
        let request = ApiRequest::post(CHAT_MESSAGE_PATH).json(&ChatQuery { query })?;
        let body = self.send_json(request).await?;
        Ok(extract::first_string(&body, &["airesponse", "response", "message"]))
    }
}
