//! GSSC Rust Client
//!
//! A Rust client library for the GSSC solar guidance backend, with bearer-token
//! authentication, transparent access-token refresh, and typed wrappers for the
//! calculator, price tracker, quotation, chatbot and contact endpoints.

pub mod api_client;
pub mod auth;
pub mod calculator;
pub mod chatbot;
pub mod config;
pub mod contact;
pub mod error;
pub mod extract;
pub mod file_store;
pub mod price_tracker;
pub mod quotation;
pub mod token_store;
pub mod types;

pub use api_client::{ApiClient, ApiRequest, ApiResponse, SessionListener};
pub use auth::Registration;
pub use calculator::{PowerEstimate, PowerEstimateRequest, SolarSizing, SolarSizingRequest};
pub use chatbot::ChatTurn;
pub use config::ClientConfig;
pub use contact::ContactMessage;
pub use error::{ClientError, RefreshFailure, Result};
pub use file_store::FileTokenStore;
pub use price_tracker::PricePage;
pub use quotation::{ItemOptions, QuotationEstimate, QuotationItem, QuotationOptions, SavedQuotation};
pub use token_store::{CredentialStore, TokenStore};
pub use types::{AuthState, SessionCredentials};
