//! Tolerant field extraction from backend responses
//!
//! The backend does not name token fields the same way on every endpoint. Rather than
//! scattering `a || b || c` fallbacks through the client, each field has an ordered list
//! of strategies and the first one that yields a non-empty string wins.

use serde_json::Value;

/// Where to look for a string field in a JSON object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenField {
    /// `{ "<key>": "..." }`
    TopLevel(&'static str),
    /// `{ "<outer>": { "<inner>": "..." } }`
    Nested(&'static str, &'static str),
}

impl TokenField {
    pub fn extract(&self, body: &Value) -> Option<String> {
        let field = match *self {
            TokenField::TopLevel(key) => body.get(key),
            TokenField::Nested(outer, inner) => body.get(outer).and_then(|o| o.get(inner)),
        };
        field
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }
}

pub const ACCESS_TOKEN_STRATEGIES: &[TokenField] = &[
    TokenField::TopLevel("access_token"),
    TokenField::TopLevel("access"),
    TokenField::Nested("data", "access_token"),
];

pub const REFRESH_TOKEN_STRATEGIES: &[TokenField] = &[
    TokenField::TopLevel("refresh_token"),
    TokenField::TopLevel("refresh"),
    TokenField::Nested("data", "refresh_token"),
];

pub const IDENTITY_STRATEGIES: &[TokenField] = &[
    TokenField::TopLevel("username"),
    TokenField::Nested("user", "username"),
];

/// Try each strategy in order and return the first match.
pub fn first_match(body: &Value, strategies: &[TokenField]) -> Option<String> {
    strategies.iter().find_map(|s| s.extract(body))
}

pub fn access_token(body: &Value) -> Option<String> {
    first_match(body, ACCESS_TOKEN_STRATEGIES)
}

pub fn refresh_token(body: &Value) -> Option<String> {
    first_match(body, REFRESH_TOKEN_STRATEGIES)
}

pub fn identity(body: &Value) -> Option<String> {
    first_match(body, IDENTITY_STRATEGIES)
}

/// First of `keys` holding something worth showing.
///
/// Strings are returned as-is. `true` and numbers are rendered, since some
/// endpoints acknowledge with `{"success": true}` instead of a message.
pub fn first_string(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First of `keys` holding a number, accepting numeric strings (`"12.5"`).
pub fn first_number(body: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match body.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Backend error text for display, if the body carries any.
///
/// Checks the generic `error`/`detail`/`message` keys first, then falls back to the
/// first field-level validation error (`{"email": ["already taken"]}`).
pub fn error_message(body: &Value) -> Option<String> {
    if let Value::String(s) = body {
        return (!s.is_empty()).then(|| s.clone());
    }

    if let Some(msg) = first_string(body, &["error", "detail", "message"]) {
        return Some(msg);
    }

    body.as_object()?.values().find_map(|v| match v {
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_owned),
        _ => None,
    })
}
