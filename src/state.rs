//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the user store, the identity provider used to resolve bearer
//! tokens, and the sync options. Everything is constructed in `main` and
//! passed in explicitly.

use std::sync::Arc;

use crate::identity::IdentityProvider;
use crate::services::user_store::UserStore;
use crate::services::user_sync::SyncOptions;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    /// `None` if the identity provider is not configured.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub sync: SyncOptions,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, identity: Option<Arc<dyn IdentityProvider>>, sync: SyncOptions) -> Self {
        Self { store, identity, sync }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::collections::HashMap;

    use super::*;
    use crate::identity::{IdentityError, UserIdentity};
    use crate::services::user_store::MemoryUserStore;

    /// Identity provider that accepts a fixed set of bearer tokens.
    #[derive(Default)]
    pub struct StaticIdentityProvider {
        tokens: HashMap<String, UserIdentity>,
    }

    impl StaticIdentityProvider {
        #[must_use]
        pub fn with(mut self, bearer: &str, identity: UserIdentity) -> Self {
            self.tokens.insert(bearer.to_owned(), identity);
            self
        }
    }

    #[async_trait::async_trait]
    impl IdentityProvider for StaticIdentityProvider {
        async fn resolve(&self, bearer: &str) -> Result<Option<UserIdentity>, IdentityError> {
            Ok(self.tokens.get(bearer).cloned())
        }
    }

    /// Identity provider that always fails.
    pub struct FailingIdentityProvider;

    #[async_trait::async_trait]
    impl IdentityProvider for FailingIdentityProvider {
        async fn resolve(&self, _bearer: &str) -> Result<Option<UserIdentity>, IdentityError> {
            Err(IdentityError::Request("connection refused".into()))
        }
    }

    /// App state over a fresh in-memory store.
    #[must_use]
    pub fn test_app_state(identity: Option<Arc<dyn IdentityProvider>>) -> (AppState, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::new(store.clone(), identity, SyncOptions::default());
        (state, store)
    }
}
