//! Sync client used by the hook to reach `POST /api/users/store`.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and non-2xx answers come back as `ClientError`; the
//! hook logs them and stays non-ready rather than panicking.

use std::time::Duration;

use serde::Deserialize;

use crate::routes::users::StoreUserResponse;
use crate::services::user_store::UserId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("sync request failed: {0}")]
    Request(String),
    #[error("server rejected sync: not authenticated")]
    Unauthenticated,
    #[error("server returned {status} ({code}): {message}")]
    Server { status: u16, code: String, message: String },
    #[error("malformed sync response: {0}")]
    Malformed(String),
}

/// Callable that performs the store-user mutation for the signed-in caller.
#[async_trait::async_trait]
pub trait UserSyncClient: Send + Sync {
    async fn store_user(&self) -> Result<UserId, ClientError>;
}

#[derive(Deserialize)]
struct RemoteError {
    code: String,
    message: String,
}

pub(crate) fn error_from_response(status: u16, body: &str) -> ClientError {
    if status == 401 {
        return ClientError::Unauthenticated;
    }
    match serde_json::from_str::<RemoteError>(body) {
        Ok(remote) => ClientError::Server { status, code: remote.code, message: remote.message },
        Err(_) => ClientError::Server { status, code: "E_UNKNOWN".into(), message: body.to_owned() },
    }
}

/// HTTP sync client carrying the frontend provider's bearer token.
#[derive(Clone)]
pub struct HttpSyncClient {
    http: reqwest::Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpSyncClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, bearer: Option<String>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), bearer }
    }

    /// Build the shared HTTP client with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))
    }

    #[must_use]
    pub fn store_url(&self) -> String {
        format!("{}/api/users/store", self.base_url)
    }
}

#[async_trait::async_trait]
impl UserSyncClient for HttpSyncClient {
    async fn store_user(&self) -> Result<UserId, ClientError> {
        let mut req = self.http.post(self.store_url());
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body));
        }

        resp.json::<StoreUserResponse>()
            .await
            .map(|r| r.id)
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
