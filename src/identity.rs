//! Verified caller identity and the provider that resolves it.
//!
//! DESIGN
//! ======
//! The identity provider is an external collaborator. `UserInfoProvider`
//! forwards the caller's bearer token to the provider's userinfo endpoint and
//! trusts the answer; no signature checking happens here. The resulting
//! `UserIdentity` is passed explicitly into the sync service rather than read
//! from ambient request state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;
use crate::error::ErrorCode;

/// Identity of an authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable, provider-scoped key for this identity (`"{issuer}|{subject}"`).
    pub token_identifier: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture_url: Option<String>,
}

impl UserIdentity {
    #[must_use]
    pub fn new(token_identifier: impl Into<String>) -> Self {
        Self { token_identifier: token_identifier.into(), name: None, email: None, picture_url: None }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_picture_url(mut self, url: impl Into<String>) -> Self {
        self.picture_url = Some(url.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Request(String),
    #[error("identity provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("malformed userinfo response: {0}")]
    Malformed(String),
}

impl ErrorCode for IdentityError {
    fn error_code(&self) -> &'static str {
        "E_IDENTITY_PROVIDER"
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// Resolves a bearer token into a verified identity.
///
/// `Ok(None)` means the provider rejected the token.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, bearer: &str) -> Result<Option<UserIdentity>, IdentityError>;
}

/// Subset of OIDC userinfo claims used to build a `UserIdentity`.
#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoClaims {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

impl UserInfoClaims {
    pub(crate) fn into_identity(self, issuer: &str) -> Result<UserIdentity, IdentityError> {
        if self.sub.trim().is_empty() {
            return Err(IdentityError::Malformed("empty subject".into()));
        }
        Ok(UserIdentity {
            token_identifier: token_identifier(issuer, &self.sub),
            name: non_blank(self.name),
            email: non_blank(self.email),
            picture_url: non_blank(self.picture),
        })
    }
}

/// Build the token identifier for a subject issued by `issuer`.
#[must_use]
pub fn token_identifier(issuer: &str, subject: &str) -> String {
    format!("{issuer}|{subject}")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Identity provider backed by an OIDC-style userinfo endpoint.
pub struct UserInfoProvider {
    client: reqwest::Client,
    config: IdentityConfig,
}

impl UserInfoProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }
}

#[async_trait::async_trait]
impl IdentityProvider for UserInfoProvider {
    async fn resolve(&self, bearer: &str) -> Result<Option<UserIdentity>, IdentityError> {
        let resp = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            tracing::debug!(%status, "identity provider rejected token");
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Provider { status: status.as_u16(), body });
        }

        let claims = resp
            .json::<UserInfoClaims>()
            .await
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;
        claims.into_identity(&self.config.issuer).map(Some)
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
