//! Client-side identity sync.
//!
//! DESIGN
//! ======
//! `ClientHandles` is built once by whatever composes the UI and passed down
//! explicitly. It owns the shared HTTP client and the `StoreUserHook`; sign-in
//! installs a sync client carrying the new bearer token, which the hook sees
//! as a changed sync function and re-syncs.

pub mod api;
pub mod hook;
pub mod machine;

use std::sync::Arc;
use std::time::Duration;

pub use api::{ClientError, HttpSyncClient, UserSyncClient};
pub use hook::StoreUserHook;
pub use machine::{BridgeStatus, SyncStatus};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_API_URL.to_owned(), timeout_secs: DEFAULT_CLIENT_TIMEOUT_SECS }
    }
}

impl ClientConfig {
    /// Read `SETTLE_API_URL` and `SETTLE_CLIENT_TIMEOUT_SECS`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("SETTLE_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_url),
            timeout_secs: std::env::var("SETTLE_CLIENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Explicitly constructed client handles for the UI tree.
pub struct ClientHandles {
    config: ClientConfig,
    http: reqwest::Client,
    hook: StoreUserHook,
}

impl ClientHandles {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = HttpSyncClient::http_client(Duration::from_secs(config.timeout_secs))?;
        let anonymous = HttpSyncClient::new(http.clone(), &config.api_url, None);
        let hook = StoreUserHook::new(Arc::new(anonymous));
        Ok(Self { config, http, hook })
    }

    #[must_use]
    pub fn hook(&self) -> &StoreUserHook {
        &self.hook
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The frontend provider signed `user_id` in and issued `bearer`.
    pub fn sign_in(&self, user_id: &str, bearer: String) {
        let client = HttpSyncClient::new(self.http.clone(), &self.config.api_url, Some(bearer));
        self.hook.set_session(Arc::new(client), Some(user_id.to_owned()));
    }

    /// Forward a backend auth bridge update.
    pub fn bridge_changed(&self, bridge: BridgeStatus) {
        self.hook.set_bridge(bridge);
    }

    pub fn sign_out(&self) {
        self.hook.sign_out();
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
