use super::*;

#[test]
fn client_config_defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.api_url, DEFAULT_API_URL);
    assert_eq!(config.timeout_secs, DEFAULT_CLIENT_TIMEOUT_SECS);
}

#[tokio::test]
async fn new_handles_start_signed_out() {
    let handles = ClientHandles::new(ClientConfig::default()).unwrap();
    assert_eq!(handles.hook().status(), SyncStatus::SIGNED_OUT);
    assert_eq!(handles.config().api_url, DEFAULT_API_URL);
}

#[tokio::test]
async fn sign_in_without_backend_auth_stays_signed_out() {
    let handles = ClientHandles::new(ClientConfig::default()).unwrap();
    handles.sign_in("user_a", "token-a".into());
    assert_eq!(handles.hook().status(), SyncStatus::SIGNED_OUT);
    assert_eq!(handles.hook().user_id(), None);
}

#[tokio::test]
async fn bridge_loading_is_reported() {
    let handles = ClientHandles::new(ClientConfig::default()).unwrap();
    handles.bridge_changed(BridgeStatus { is_loading: true, is_authenticated: false });
    assert_eq!(handles.hook().status(), SyncStatus::LOADING);

    handles.sign_out();
    assert_eq!(handles.hook().status(), SyncStatus::SIGNED_OUT);
}

// =============================================================
// sign-in / sign-out cycles against a local store endpoint
// =============================================================

async fn counting_server() -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::routing::post;

    let hits = std::sync::Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = axum::Router::new().route(
        "/api/users/store",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                axum::Json(serde_json::json!({ "id": uuid::Uuid::new_v4() }))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_out_sends_no_extra_store_request() {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const CYCLES: usize = 20;
    let (api_url, hits) = counting_server().await;
    let handles = ClientHandles::new(ClientConfig { api_url, timeout_secs: 5 }).unwrap();
    let mut rx = handles.hook().subscribe();

    for cycle in 0..CYCLES {
        handles.sign_in(&format!("user_{cycle}"), format!("token-{cycle}"));
        handles.bridge_changed(BridgeStatus { is_loading: false, is_authenticated: true });
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == SyncStatus::READY))
            .await
            .expect("hook should become ready")
            .expect("status channel open");

        handles.sign_out();
        assert_eq!(handles.hook().status(), SyncStatus::SIGNED_OUT);
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), CYCLES);
}
