//! Shared helpers for integration tests: an in-process stub backend.

#![allow(dead_code)]

use axum::http::{header, HeaderMap};
use axum::Router;
use gssc_client::{ApiClient, ClientConfig, SessionCredentials, TokenStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Token from an `Authorization: Bearer ...` header.
pub fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

pub fn logged_in_store(access: &str, refresh: Option<&str>) -> TokenStore {
    TokenStore::with_credentials(
        SessionCredentials::new(access)
            .with_refresh_token(refresh.map(str::to_owned))
            .with_identity(Some("u".to_string())),
    )
}

pub fn client(base_url: &str, store: &TokenStore) -> ApiClient {
    client_with_timeout(base_url, store, Duration::from_secs(5))
}

pub fn client_with_timeout(base_url: &str, store: &TokenStore, timeout: Duration) -> ApiClient {
    let config = ClientConfig::new(base_url).unwrap().with_timeout(timeout);
    ApiClient::with_store(config, Arc::new(store.clone())).unwrap()
}

/// Thread-safe call counter for stub handlers.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
