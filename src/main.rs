use std::sync::Arc;

use settle::config::ServerConfig;
use settle::identity::{IdentityProvider, UserInfoProvider};
use settle::services::user_store::{PgUserStore, UserStore};
use settle::{db, routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid server configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");
    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));

    // Identity is non-fatal: without a provider every sync is unauthenticated.
    let identity: Option<Arc<dyn IdentityProvider>> = match &config.identity {
        Some(identity_config) => match UserInfoProvider::new(identity_config.clone()) {
            Ok(provider) => {
                tracing::info!(issuer = provider.issuer(), "identity provider configured");
                Some(Arc::new(provider))
            }
            Err(e) => {
                tracing::warn!(error = %e, "identity provider init failed, sync disabled");
                None
            }
        },
        None => {
            tracing::warn!("IDENTITY_USERINFO_URL not set, sync disabled");
            None
        }
    };

    let state = state::AppState::new(store, identity, config.sync);
    let app = routes::app(state);

    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "settle listening");
    axum::serve(listener, app).await.expect("server failed");
}
