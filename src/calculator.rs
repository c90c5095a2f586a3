//! Solar sizing and power calculators. The math happens on the backend.

use crate::api_client::{ApiClient, ApiRequest};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SOLAR_CALCULATOR_PATH: &str = "/calculator/panel/";
pub const POWER_CALCULATOR_PATH: &str = "/calculator/power/";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarSizingRequest {
    /// Appliance name to its power draw in watts; only enabled appliances belong here
    pub appliances: BTreeMap<String, f64>,
    pub panel_watt: f64,
    /// 0 when no battery backup is wanted
    pub backup_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SolarSizing {
    #[serde(default, alias = "Solar_panel_Quantity")]
    pub solar_panel_quantity: Option<u32>,
    #[serde(default)]
    pub max_inverter_capacity: Option<f64>,
    #[serde(default)]
    pub total_daily_power_kwh: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerEstimateRequest {
    pub solarpanel_quantity: u32,
    pub panelwatt: f64,
    pub backup_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PowerEstimate {
    #[serde(default)]
    pub usable_power_kwh: Option<f64>,
    #[serde(default)]
    pub total_daily_power_kwh: Option<f64>,
    #[serde(default)]
    pub inverter_capacity_kwh: Option<f64>,
    #[serde(default)]
    pub battery_capacity_kwh: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiClient {
    pub async fn calculate_solar(&self, request: &SolarSizingRequest) -> Result<SolarSizing> {
        let body = self
            .send_json(ApiRequest::post(SOLAR_CALCULATOR_PATH).json(request)?)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn calculate_power(&self, request: &PowerEstimateRequest) -> Result<PowerEstimate> {
        let body = self
            .send_json(ApiRequest::post(POWER_CALCULATOR_PATH).json(request)?)
            .await?;
        Ok(serde_json::from_value(body)?)
    }
}
