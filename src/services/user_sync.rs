//! Store-user mutation: make sure the caller's identity has a user record.
//!
//! DESIGN
//! ======
//! The caller's identity arrives as an explicit argument, already resolved
//! by the request boundary. The lookup is by `token_identifier`; a match
//! gets its name refreshed, a miss gets a new record. Each call performs at
//! most one write.
//!
//! TRADE-OFFS
//! ==========
//! Atomicity under concurrent first syncs comes from the store's unique
//! index, not from locking here. A losing insert reports a conflict and the
//! winner's id is returned instead, so every racer sees the same record.

use tracing::{debug, info};

use super::user_store::{InsertOutcome, NewUser, StoreError, UserId, UserPatch, UserRecord, UserStore};
use crate::error::ErrorCode;
use crate::identity::UserIdentity;

/// Name stored when the identity provider supplies none.
pub const DEFAULT_USER_NAME: &str = "Anonymous";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Also refresh `email` and `image_url` on existing records. Only `name`
    /// is refreshed otherwise.
    pub reconcile_profile: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("called store user without authentication present")]
    Unauthenticated,
    #[error("{count} user records share token identifier {token_identifier}")]
    Integrity { token_identifier: String, count: usize },
    #[error("insert for {token_identifier} conflicted but no record was found")]
    ConflictVanished { token_identifier: String },
    #[error("no user record for this identity")]
    NotSynced,
    #[error("user store error: {0}")]
    Store(#[from] StoreError),
}

impl ErrorCode for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::Integrity { .. } => "E_INTEGRITY",
            Self::ConflictVanished { .. } => "E_CONFLICT",
            Self::NotSynced => "E_NOT_SYNCED",
            Self::Store(_) => "E_STORE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ConflictVanished { .. } | Self::Store(_))
    }
}

/// Ensure a user record exists and is current for `identity`, returning its id.
///
/// # Errors
///
/// - `Unauthenticated` when `identity` is `None`.
/// - `Integrity` when more than one record shares the token identifier.
/// - `Store` on storage failures.
pub async fn store_user(
    store: &dyn UserStore,
    identity: Option<&UserIdentity>,
    options: SyncOptions,
) -> Result<UserId, SyncError> {
    let identity = identity.ok_or(SyncError::Unauthenticated)?;

    if let Some(existing) = find_unique(store, &identity.token_identifier).await? {
        let patch = profile_patch(&existing, identity, options);
        if patch.is_empty() {
            debug!(user_id = %existing.id, "user already current");
        } else {
            store.patch(existing.id, &patch).await?;
            info!(user_id = %existing.id, "user profile updated");
        }
        return Ok(existing.id);
    }

    let new_user = NewUser::from_identity(identity, DEFAULT_USER_NAME);
    match store.insert(&new_user).await? {
        InsertOutcome::Inserted(id) => {
            info!(user_id = %id, "user created");
            Ok(id)
        }
        InsertOutcome::Conflict => {
            debug!(token_identifier = %identity.token_identifier, "lost first-sync race, reusing winner");
            find_unique(store, &identity.token_identifier)
                .await?
                .map(|record| record.id)
                .ok_or_else(|| SyncError::ConflictVanished { token_identifier: identity.token_identifier.clone() })
        }
    }
}

/// Fetch the caller's record without writing.
///
/// # Errors
///
/// `Unauthenticated` without an identity, `NotSynced` when no record exists yet.
pub async fn current_user(store: &dyn UserStore, identity: Option<&UserIdentity>) -> Result<UserRecord, SyncError> {
    let identity = identity.ok_or(SyncError::Unauthenticated)?;
    find_unique(store, &identity.token_identifier)
        .await?
        .ok_or(SyncError::NotSynced)
}

async fn find_unique(store: &dyn UserStore, token_identifier: &str) -> Result<Option<UserRecord>, SyncError> {
    let mut matches = store.find_by_token(token_identifier).await?;
    if matches.len() > 1 {
        return Err(SyncError::Integrity { token_identifier: token_identifier.to_owned(), count: matches.len() });
    }
    Ok(matches.pop())
}

/// Fields of `existing` that differ from what the provider now reports.
pub(crate) fn profile_patch(existing: &UserRecord, identity: &UserIdentity, options: SyncOptions) -> UserPatch {
    let name = identity.name.as_deref().unwrap_or(DEFAULT_USER_NAME);
    let mut patch = UserPatch::default();
    if existing.name != name {
        patch.name = Some(name.to_owned());
    }

    if options.reconcile_profile {
        patch.email = changed(existing.email.as_deref(), identity.email.as_deref());
        patch.image_url = changed(existing.image_url.as_deref(), identity.picture_url.as_deref());
    }
    patch
}

fn changed(stored: Option<&str>, reported: Option<&str>) -> Option<String> {
    match reported {
        Some(value) if stored != Some(value) => Some(value.to_owned()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "user_sync_test.rs"]
mod tests;
