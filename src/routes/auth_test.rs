use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;

use super::*;

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
}

#[test]
fn bearer_token_extracted() {
    assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")).as_deref(), Some("abc.def.ghi"));
}

#[test]
fn bearer_token_missing_header() {
    assert!(bearer_token(&HeaderMap::new()).is_none());
}

#[test]
fn bearer_token_wrong_scheme() {
    assert!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")).is_none());
}

#[tokio::test]
async fn identity_error_response_carries_error_body() {
    let resp = identity_error_response(&IdentityError::Provider { status: 503, body: "down".into() });
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "E_IDENTITY_PROVIDER");
    assert_eq!(body["retryable"], true);
}
