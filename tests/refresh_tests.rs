//! Token refresh and replay behaviour of the API client.
//!
//! These tests verify that:
//! 1. Requests without a session carry no Authorization header and pass through untouched
//! 2. A 401 triggers at most one refresh and one replay
//! 3. A refreshed token is used by later requests without another refresh
//! 4. A failed refresh clears the whole session and notifies the listener
//! 5. Concurrent 401s share a single refresh call, and a waiter outlives a cancelled leader

use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use gssc_client::{ApiRequest, ClientError, CredentialStore, TokenStore};
use serde_json::{json, Value};
use std::time::Duration;

mod common;
use common::{bearer, client, client_with_timeout, closed_port_url, logged_in_store, serve, Counter};

/// Refresh endpoint answering `{access: new_access}` when given `expected_refresh`.
fn refresh_route(expected_refresh: &'static str, response: Value, calls: Counter) -> Router {
    Router::new().route(
        "/auth/token/refresh/",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let calls = calls.clone();
            let response = response.clone();
            async move {
                calls.hit();
                if bearer(&headers).is_some() {
                    return (StatusCode::BAD_REQUEST, Json(json!({"detail": "refresh must be unauthenticated"})));
                }
                if body["refresh"] != json!(expected_refresh) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token is invalid or expired"})));
                }
                (StatusCode::OK, Json(response))
            }
        }),
    )
}

/// Protected endpoint accepting only `Bearer <valid>`.
fn protected_route(valid: &'static str, calls: Counter) -> Router {
    Router::new().route(
        "/protected/",
        get(move |headers: HeaderMap| {
            let calls = calls.clone();
            async move {
                calls.hit();
                match bearer(&headers) {
                    Some(token) if token == valid => (StatusCode::OK, Json(json!({"ok": true}))),
                    _ => (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"detail": "Given token not valid for any token type"})),
                    ),
                }
            }
        }),
    )
}

#[tokio::test]
async fn test_no_token_passthrough() {
    let app = Router::new()
        .route(
            "/echo/",
            get(|headers: HeaderMap| async move {
                (StatusCode::OK, Json(json!({"authorized": bearer(&headers).is_some()})))
            }),
        )
        .route(
            "/broken/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))) }),
        );
    let base = serve(app).await;

    let store = TokenStore::new();
    let client = client(&base, &store);

    let response = client.execute(ApiRequest::get("/echo/")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"authorized": false}));

    let response = client.execute(ApiRequest::get("/broken/")).await.unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, json!({"error": "boom"}));
}

#[tokio::test]
async fn test_bearer_header_attached_when_logged_in() {
    let app = Router::new().route(
        "/echo/",
        get(|headers: HeaderMap| async move { (StatusCode::OK, Json(json!({"token": bearer(&headers)}))) }),
    );
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let body = client(&base, &store).get_json("/echo/").await.unwrap();
    assert_eq!(body, json!({"token": "A1"}));
}

#[tokio::test]
async fn test_refresh_and_replay_succeeds() {
    let refresh_calls = Counter::default();
    let protected_calls = Counter::default();
    let app = refresh_route("R1", json!({"access": "A2"}), refresh_calls.clone())
        .merge(protected_route("A2", protected_calls.clone()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let client = client(&base, &store);

    let body = client.get_json("/protected/").await.unwrap();
    assert_eq!(body, json!({"ok": true}));

    let creds = store.get().unwrap();
    assert_eq!(creds.access_token, "A2");
    assert_eq!(creds.refresh_token.as_deref(), Some("R1"));
    assert_eq!(creds.identity.as_deref(), Some("u"));
    assert_eq!(refresh_calls.get(), 1);
    assert_eq!(protected_calls.get(), 2);

    // The next independent request goes straight through with the new token
    let body = client.get_json("/protected/").await.unwrap();
    assert_eq!(body, json!({"ok": true}));
    assert_eq!(refresh_calls.get(), 1);
    assert_eq!(protected_calls.get(), 3);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored() {
    let refresh_calls = Counter::default();
    let app = refresh_route("R1", json!({"access": "A2", "refresh": "R2"}), refresh_calls.clone())
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    client(&base, &store).get_json("/protected/").await.unwrap();

    assert_eq!(store.access_token().as_deref(), Some("A2"));
    assert_eq!(store.refresh_token().as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_second_401_is_not_retried() {
    let refresh_calls = Counter::default();
    let protected_calls = Counter::default();
    // The refreshed token is still rejected
    let app = refresh_route("R1", json!({"access": "A2"}), refresh_calls.clone())
        .merge(protected_route("never-valid", protected_calls.clone()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let err = client(&base, &store).get_json("/protected/").await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 401, .. }));
    assert_eq!(refresh_calls.get(), 1);
    assert_eq!(protected_calls.get(), 2);
    // The refresh itself succeeded, so the session is kept
    assert_eq!(store.access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_refresh_rejected_clears_session() {
    let refresh_calls = Counter::default();
    let expired = Counter::default();
    let app = refresh_route("some-other-token", json!({"access": "A2"}), refresh_calls.clone())
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let listener_calls = expired.clone();
    let client = client(&base, &store).with_session_listener(move || {
        listener_calls.hit();
    });

    let err = client.get_json("/protected/").await.unwrap_err();

    match err {
        ClientError::RefreshFailed(failure) => {
            assert_eq!(failure.status, Some(401));
            assert_eq!(failure.message, "Token is invalid or expired");
        }
        other => panic!("expected refresh failure, got {other:?}"),
    }
    assert_eq!(store.get(), None);
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert_eq!(store.identity(), None);
    assert_eq!(refresh_calls.get(), 1);
    assert_eq!(expired.get(), 1);
}

#[tokio::test]
async fn test_refresh_without_access_token_clears_session() {
    let app = refresh_route("R1", json!({"detail": "ok"}), Counter::default())
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let err = client(&base, &store).get_json("/protected/").await.unwrap_err();

    assert!(matches!(err, ClientError::RefreshFailed(_)));
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_refresh_endpoint_missing_clears_session() {
    // No refresh route at all: the refresh call gets a 404
    let base = serve(protected_route("A2", Counter::default())).await;

    let store = logged_in_store("A1", Some("R1"));
    let err = client(&base, &store).get_json("/protected/").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_refresh_transport_failure_clears_session() {
    let refresh_calls = Counter::default();
    let calls = refresh_calls.clone();
    let expired = Counter::default();
    let app = Router::new()
        .route(
            "/auth/token/refresh/",
            post(move || {
                let calls = calls.clone();
                async move {
                    calls.hit();
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    (StatusCode::OK, Json(json!({"access": "A2"})))
                }
            }),
        )
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let listener_calls = expired.clone();
    let client = client_with_timeout(&base, &store, Duration::from_millis(300))
        .with_session_listener(move || {
            listener_calls.hit();
        });

    let err = client.get_json("/protected/").await.unwrap_err();

    match err {
        ClientError::RefreshFailed(failure) => assert_eq!(failure.status, None),
        other => panic!("expected refresh failure, got {other:?}"),
    }
    assert_eq!(refresh_calls.get(), 1);
    assert!(!store.has_tokens());
    assert_eq!(expired.get(), 1);
}

#[tokio::test]
async fn test_logout_during_refresh_does_not_notify_listener() {
    let app = Router::new()
        .route(
            "/auth/token/refresh/",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                (StatusCode::OK, Json(json!({"access": "A2"})))
            }),
        )
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let expired = Counter::default();
    let listener_calls = expired.clone();
    let client = client(&base, &store).with_session_listener(move || {
        listener_calls.hit();
    });

    let logout = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.logout().await;
    };
    let (result, ()) = tokio::join!(client.get_json("/protected/"), logout);

    assert!(matches!(result, Err(ClientError::RefreshFailed(_))));
    assert_eq!(store.get(), None);
    assert_eq!(expired.get(), 0);
}

#[tokio::test]
async fn test_waiter_survives_cancelled_refresh_leader() {
    let refresh_calls = Counter::default();
    let calls = refresh_calls.clone();
    let app = Router::new()
        .route(
            "/auth/token/refresh/",
            post(move || {
                let calls = calls.clone();
                async move {
                    calls.hit();
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    (StatusCode::OK, Json(json!({"access": "A2"})))
                }
            }),
        )
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let client = client(&base, &store);

    // The first request starts the refresh, then gives up waiting on it
    let leader = tokio::time::timeout(Duration::from_millis(100), client.get_json("/protected/"));
    let waiter = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        client.get_json("/protected/").await
    };
    let (leader, waiter) = tokio::join!(leader, waiter);

    assert!(leader.is_err());
    assert_eq!(waiter.unwrap(), json!({"ok": true}));
    assert_eq!(store.access_token().as_deref(), Some("A2"));
    assert_eq!(refresh_calls.get(), 2);
}

#[tokio::test]
async fn test_401_without_refresh_token_returns_original_response() {
    let refresh_calls = Counter::default();
    let expired = Counter::default();
    let app = refresh_route("R1", json!({"access": "A2"}), refresh_calls.clone())
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", None);
    let listener_calls = expired.clone();
    let client = client(&base, &store).with_session_listener(move || {
        listener_calls.hit();
    });

    let response = client.execute(ApiRequest::get("/protected/")).await.unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["detail"], "Given token not valid for any token type");
    assert_eq!(refresh_calls.get(), 0);
    assert_eq!(expired.get(), 1);
    assert!(!store.has_tokens());
}

#[tokio::test]
async fn test_non_401_errors_bypass_recovery() {
    let refresh_calls = Counter::default();
    let app = refresh_route("R1", json!({"access": "A2"}), refresh_calls.clone()).route(
        "/forbidden/",
        get(|| async { (StatusCode::FORBIDDEN, Json(json!({"detail": "nope"}))) }),
    );
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let err = client(&base, &store).get_json("/forbidden/").await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 403, .. }));
    assert_eq!(err.message(), "nope");
    assert_eq!(refresh_calls.get(), 0);
    assert_eq!(store.access_token().as_deref(), Some("A1"));
}

#[tokio::test]
async fn test_transport_failure_bypasses_recovery() {
    let base = closed_port_url().await;

    let store = logged_in_store("A1", Some("R1"));
    let err = client(&base, &store).get_json("/protected/").await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(store.access_token().as_deref(), Some("A1"));
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let refresh_calls = Counter::default();
    let calls = refresh_calls.clone();
    let app = Router::new()
        .route(
            "/auth/token/refresh/",
            post(move || {
                let calls = calls.clone();
                async move {
                    calls.hit();
                    // Keep the refresh in flight long enough for every request to hit it
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    (StatusCode::OK, Json(json!({"access": "A2"})))
                }
            }),
        )
        .merge(protected_route("A2", Counter::default()));
    let base = serve(app).await;

    let store = logged_in_store("A1", Some("R1"));
    let client = client(&base, &store);

    let (a, b, c) = tokio::join!(
        client.get_json("/protected/"),
        client.get_json("/protected/"),
        client.get_json("/protected/"),
    );

    for result in [a, b, c] {
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }
    assert_eq!(refresh_calls.get(), 1);
    assert_eq!(store.access_token().as_deref(), Some("A2"));
}
