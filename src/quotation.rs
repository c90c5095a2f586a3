//! Quotation generator endpoints

use crate::api_client::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::extract;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const QUOTATION_OPTIONS_PATH: &str = "/quotation/options/";
pub const QUOTATION_CALCULATE_PATH: &str = "/quotation/calculate/";
pub const QUOTATION_PREVIOUS_PATH: &str = "/quotation/old/";
pub const QUOTATION_SAVE_PATH: &str = "/quotation/save/";
pub const QUOTATION_EMAIL_PATH: &str = "/quotation/email/";

/// Choices offered for one quotation line (panels, inverter, ...)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemOptions {
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default, rename = "unitPrices")]
    pub unit_prices: BTreeMap<String, f64>,
}

impl ItemOptions {
    pub fn default_description(&self) -> Option<&str> {
        self.descriptions.first().map(String::as_str)
    }

    pub fn unit_price(&self, description: &str) -> f64 {
        self.unit_prices.get(description).copied().unwrap_or(0.0)
    }
}

/// Item name to its options
pub type QuotationOptions = BTreeMap<String, ItemOptions>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationItem {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total_price: f64,
}

#[derive(Serialize)]
struct QuotationBody<'a> {
    items: &'a [QuotationItem],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotationEstimate {
    pub roi: f64,
    pub estimated_total_price: f64,
}

impl QuotationEstimate {
    /// Missing figures read as 0
    pub fn from_body(body: &Value) -> Self {
        Self {
            roi: extract::first_number(body, &["roi", "ROI"]).unwrap_or(0.0),
            estimated_total_price: extract::first_number(
                body,
                &["estimatedTotalPrice", "estimated_total_price"],
            )
            .unwrap_or(0.0),
        }
    }
}

/// A quotation saved earlier, if the backend had one
#[derive(Debug, Clone, PartialEq)]
pub struct SavedQuotation {
    pub message: Option<String>,
    pub items: Option<Vec<QuotationItem>>,
}

impl SavedQuotation {
    pub fn from_body(body: &Value) -> Result<Self> {
        let items = ["quotationData", "items"]
            .iter()
            .find_map(|key| body.get(*key).filter(|v| v.is_array()))
            .map(|items| serde_json::from_value(items.clone()))
            .transpose()?;

        Ok(Self {
            message: extract::first_string(body, &["message", "detail"]),
            items,
        })
    }
}

impl ApiClient {
    pub async fn quotation_options(&self) -> Result<QuotationOptions> {
        let body = self.get_json(QUOTATION_OPTIONS_PATH).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn calculate_quotation(&self, items: &[QuotationItem]) -> Result<QuotationEstimate> {
        let body = self.post_items(QUOTATION_CALCULATE_PATH, items).await?;
        Ok(QuotationEstimate::from_body(&body))
    }

    pub async fn previous_quotation(&self) -> Result<SavedQuotation> {
        let body = self.get_json(QUOTATION_PREVIOUS_PATH).await?;
        SavedQuotation::from_body(&body)
    }

    pub async fn save_quotation(&self, items: &[QuotationItem]) -> Result<Option<String>> {
        let body = self.post_items(QUOTATION_SAVE_PATH, items).await?;
        Ok(extract::first_string(&body, &["message", "detail"]))
    }

    pub async fn email_quotation(&self, items: &[QuotationItem]) -> Result<Option<String>> {
        let body = self.post_items(QUOTATION_EMAIL_PATH, items).await?;
        Ok(extract::first_string(&body, &["message", "detail"]))
    }

    async fn post_items(&self, path: &str, items: &[QuotationItem]) -> Result<Value> {
        let request = ApiRequest::post(path).json(&QuotationBody { items })?;
        self.send_json(request).await
    }
}
