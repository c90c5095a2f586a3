//! Component price listings

use crate::api_client::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::extract;
use serde_json::Value;

pub const PRICE_LIST_PATH: &str = "/price-tracker/";
pub const PRICE_UPDATE_PATH: &str = "/price-tracker/update/";

/// One page of price rows.
///
/// Rows stay as JSON: their columns depend on the filter and the UI renders whatever keys
/// come back.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePage {
    pub items: Vec<Value>,
    /// Total across all pages
    pub total: u64,
}

impl PricePage {
    /// Accepts `{results, count}`, `{data, total}` or a bare array.
    pub fn from_body(body: Value) -> Self {
        let total = ["count", "total"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_u64));

        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => ["results", "data"]
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        Self {
            total: total.unwrap_or(items.len() as u64),
            items,
        }
    }
}

impl ApiClient {
    pub async fn price_list(&self, filter: &str, page: u32) -> Result<PricePage> {
        let request = ApiRequest::get(PRICE_LIST_PATH)
            .query("filter", filter)
            .query("page", page.max(1));
        let body = self.send_json(request).await?;
        Ok(PricePage::from_body(body))
    }

    /// Ask the backend to re-scrape prices
    pub async fn update_prices(&self) -> Result<Option<String>> {
        let body = self.send_json(ApiRequest::post(PRICE_UPDATE_PATH)).await?;
        Ok(extract::first_string(&body, &["message", "detail"]))
    }
}
