//! User record storage.
//!
//! DESIGN
//! ======
//! `UserStore` is the seam between the sync service and persistence.
//! `PgUserStore` relies on the unique `users_by_token` index: inserts use
//! `ON CONFLICT DO NOTHING` and report `InsertOutcome::Conflict` instead of
//! failing, so the caller can fall back to the record that won the race.
//! `MemoryUserStore` honours the same contract behind a single mutex.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::identity::UserIdentity;

// =============================================================================
// TYPES
// =============================================================================

/// Durable identifier of a user record. Assigned on insert, never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub token_identifier: String,
    pub name: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

/// Fields for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub token_identifier: String,
    pub name: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

impl NewUser {
    /// Build the insert payload for a first sync, defaulting the name.
    #[must_use]
    pub fn from_identity(identity: &UserIdentity, default_name: &str) -> Self {
        Self {
            token_identifier: identity.token_identifier.clone(),
            name: identity.name.clone().unwrap_or_else(|| default_name.to_owned()),
            email: identity.email.clone(),
            image_url: identity.picture_url.clone(),
        }
    }
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

impl UserPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.image_url.is_none()
    }

    fn apply(&self, record: &mut UserRecord) {
        if let Some(name) = &self.name {
            record.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            record.email = Some(email.clone());
        }
        if let Some(image_url) = &self.image_url {
            record.image_url = Some(image_url.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(UserId),
    /// Another record already holds this token identifier.
    Conflict,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("user not found: {0}")]
    NotFound(UserId),
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Records matching `token_identifier`. Implementations return at most two
    /// rows, enough to detect a uniqueness violation.
    async fn find_by_token(&self, token_identifier: &str) -> Result<Vec<UserRecord>, StoreError>;

    async fn insert(&self, user: &NewUser) -> Result<InsertOutcome, StoreError>;

    async fn patch(&self, id: UserId, patch: &UserPatch) -> Result<(), StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: UserId(row.get("id")),
        token_identifier: row.get("token_identifier"),
        name: row.get("name"),
        email: row.get("email"),
        image_url: row.get("image_url"),
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_token(&self, token_identifier: &str) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query(
            r"SELECT id, token_identifier, name, email, image_url
              FROM users
              WHERE token_identifier = $1
              LIMIT 2",
        )
        .bind(token_identifier)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn insert(&self, user: &NewUser) -> Result<InsertOutcome, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO users (token_identifier, name, email, image_url)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (token_identifier) DO NOTHING
              RETURNING id",
        )
        .bind(&user.token_identifier)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.image_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => InsertOutcome::Inserted(UserId(r.get("id"))),
            None => InsertOutcome::Conflict,
        })
    }

    async fn patch(&self, id: UserId, patch: &UserPatch) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE users
              SET name = COALESCE($2, name),
                  email = COALESCE($3, email),
                  image_url = COALESCE($4, image_url),
                  updated_at = now()
              WHERE id = $1",
        )
        .bind(id.0)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.image_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    records: Vec<UserRecord>,
    writes: usize,
}

/// In-process store with the same uniqueness contract as `PgUserStore`.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records directly, bypassing the uniqueness check.
    #[must_use]
    pub fn with_records(records: Vec<UserRecord>) -> Self {
        Self { inner: Mutex::new(MemoryInner { records, writes: 0 }) }
    }

    pub async fn records(&self) -> Vec<UserRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Number of successful inserts and patches so far.
    pub async fn writes(&self) -> usize {
        self.inner.lock().await.writes
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_token(&self, token_identifier: &str) -> Result<Vec<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.token_identifier == token_identifier)
            .take(2)
            .cloned()
            .collect())
    }

    async fn insert(&self, user: &NewUser) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .records
            .iter()
            .any(|r| r.token_identifier == user.token_identifier)
        {
            return Ok(InsertOutcome::Conflict);
        }

        let id = UserId::new_v4();
        inner.records.push(UserRecord {
            id,
            token_identifier: user.token_identifier.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            image_url: user.image_url.clone(),
        });
        inner.writes += 1;
        Ok(InsertOutcome::Inserted(id))
    }

    async fn patch(&self, id: UserId, patch: &UserPatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(record);
        inner.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "user_store_test.rs"]
mod tests;
