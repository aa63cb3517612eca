//! Caller identity extraction.
//!
//! The bearer token is handed to the configured identity provider. A missing
//! header, a missing provider, or a rejected token all produce an empty
//! identity; the service decides whether that is an error.

use axum::extract::FromRef;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};

use crate::error::ErrorBody;
use crate::identity::{IdentityError, UserIdentity};
use crate::state::AppState;

/// Identity of the caller, if one could be verified.
pub struct MaybeIdentity(pub Option<UserIdentity>);

pub(crate) fn identity_error_response(err: &IdentityError) -> Response {
    (StatusCode::BAD_GATEWAY, Json(ErrorBody::from_error(err))).into_response()
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_owned())
        .filter(|token| !token.is_empty())
}

impl<S> axum::extract::FromRequestParts<S> for MaybeIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Self(None));
        };

        let app_state = AppState::from_ref(state);
        let Some(provider) = &app_state.identity else {
            return Ok(Self(None));
        };

        match provider.resolve(&token).await {
            Ok(identity) => Ok(Self(identity)),
            Err(e) => {
                tracing::error!(error = %e, "identity resolution failed");
                Err(identity_error_response(&e))
            }
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
