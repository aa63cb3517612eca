use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, header};
use tower::ServiceExt;

use super::*;
use crate::identity::{IdentityProvider, UserIdentity};
use crate::state::test_helpers::{FailingIdentityProvider, StaticIdentityProvider, test_app_state};

const ADA_TOKEN: &str = "iss|ada";

fn provider() -> Arc<dyn IdentityProvider> {
    Arc::new(StaticIdentityProvider::default().with("good-token", UserIdentity::new(ADA_TOKEN).with_name("Ada")))
}

fn request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let (state, _) = test_app_state(None);
    let resp = app(state)
        .oneshot(request("GET", "/healthz", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn store_with_valid_token_returns_id() {
    let (state, store) = test_app_state(Some(provider()));
    let resp = app(state)
        .oneshot(request("POST", "/api/users/store", Some("good-token")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(body["id"], serde_json::json!(records[0].id.to_string()));
}

#[tokio::test]
async fn store_twice_returns_same_id() {
    let (state, store) = test_app_state(Some(provider()));
    let router = app(state);

    let first = json_body(
        router
            .clone()
            .oneshot(request("POST", "/api/users/store", Some("good-token")))
            .await
            .unwrap(),
    )
    .await;
    let second = json_body(
        router
            .oneshot(request("POST", "/api/users/store", Some("good-token")))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(store.records().await.len(), 1);
}

#[tokio::test]
async fn store_without_token_is_unauthenticated() {
    let (state, store) = test_app_state(Some(provider()));
    let resp = app(state)
        .oneshot(request("POST", "/api/users/store", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "E_UNAUTHENTICATED");
    assert_eq!(body["retryable"], false);
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn store_with_rejected_token_is_unauthenticated() {
    let (state, _) = test_app_state(Some(provider()));
    let resp = app(state)
        .oneshot(request("POST", "/api/users/store", Some("forged")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn store_without_provider_is_unauthenticated() {
    let (state, _) = test_app_state(None);
    let resp = app(state)
        .oneshot(request("POST", "/api/users/store", Some("good-token")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let (state, _) = test_app_state(Some(Arc::new(FailingIdentityProvider)));
    let resp = app(state)
        .oneshot(request("POST", "/api/users/store", Some("good-token")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "E_IDENTITY_PROVIDER");
    assert_eq!(body["retryable"], true);
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn me_before_store_is_not_found() {
    let (state, _) = test_app_state(Some(provider()));
    let resp = app(state)
        .oneshot(request("GET", "/api/users/me", Some("good-token")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["code"], "E_NOT_SYNCED");
}

#[tokio::test]
async fn me_after_store_returns_record() {
    let (state, _) = test_app_state(Some(provider()));
    let router = app(state);
    router
        .clone()
        .oneshot(request("POST", "/api/users/store", Some("good-token")))
        .await
        .unwrap();

    let resp = router
        .oneshot(request("GET", "/api/users/me", Some("good-token")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["name"], "Ada");
    assert_eq!(body["token_identifier"], ADA_TOKEN);
}
