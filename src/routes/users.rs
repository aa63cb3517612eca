//! User sync routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use super::auth::MaybeIdentity;
use crate::error::ErrorBody;
use crate::services::user_store::UserId;
use crate::services::user_sync::{self, SyncError};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreUserResponse {
    pub id: UserId,
}

pub(crate) fn sync_error_to_status(err: &SyncError) -> StatusCode {
    match err {
        SyncError::Unauthenticated => StatusCode::UNAUTHORIZED,
        SyncError::NotSynced => StatusCode::NOT_FOUND,
        SyncError::ConflictVanished { .. } => StatusCode::CONFLICT,
        SyncError::Integrity { .. } | SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn sync_error_response(err: &SyncError) -> Response {
    let status = sync_error_to_status(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "user sync failed");
    } else {
        tracing::warn!(error = %err, "user sync rejected");
    }
    (status, Json(ErrorBody::from_error(err))).into_response()
}

/// `POST /api/users/store`: create or refresh the caller's user record.
pub async fn store(State(state): State<AppState>, MaybeIdentity(identity): MaybeIdentity) -> Response {
    match user_sync::store_user(state.store.as_ref(), identity.as_ref(), state.sync).await {
        Ok(id) => Json(StoreUserResponse { id }).into_response(),
        Err(e) => sync_error_response(&e),
    }
}

/// `GET /api/users/me`: return the caller's user record.
pub async fn me(State(state): State<AppState>, MaybeIdentity(identity): MaybeIdentity) -> Response {
    match user_sync::current_user(state.store.as_ref(), identity.as_ref()).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => sync_error_response(&e),
    }
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
