//! Server configuration parsed from environment variables.
//!
//! Required:
//! - `DATABASE_URL`
//!
//! Optional:
//! - `PORT`: default 3000
//! - `DB_MAX_CONNECTIONS`: default 5
//! - `IDENTITY_USERINFO_URL`: userinfo endpoint of the identity provider;
//!   sync is disabled when absent
//! - `IDENTITY_ISSUER`: prefix for token identifiers; defaults to the
//!   userinfo URL's origin
//! - `IDENTITY_TIMEOUT_SECS`: default 10
//! - `SYNC_RECONCILE_PROFILE`: also refresh email/image on sync, default off

use crate::services::user_sync::SyncOptions;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub userinfo_url: String,
    pub issuer: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub identity: Option<IdentityConfig>,
    pub sync: SyncOptions,
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let port = env_parse_strict("PORT", DEFAULT_PORT)?;
        let db_max_connections = env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);

        let identity = match std::env::var("IDENTITY_USERINFO_URL") {
            Ok(url) if !url.trim().is_empty() => Some(identity_config(
                url.trim(),
                std::env::var("IDENTITY_ISSUER").ok().as_deref(),
                env_parse("IDENTITY_TIMEOUT_SECS", DEFAULT_IDENTITY_TIMEOUT_SECS),
            )?),
            _ => None,
        };

        let sync = SyncOptions { reconcile_profile: env_bool("SYNC_RECONCILE_PROFILE").unwrap_or(false) };

        Ok(Self { database_url, port, db_max_connections, identity, sync })
    }
}

pub(crate) fn identity_config(
    userinfo_url: &str,
    issuer: Option<&str>,
    timeout_secs: u64,
) -> Result<IdentityConfig, ConfigError> {
    let parsed = reqwest::Url::parse(userinfo_url)
        .map_err(|_| ConfigError::Invalid { key: "IDENTITY_USERINFO_URL", value: userinfo_url.to_owned() })?;

    let issuer = match issuer.map(str::trim).filter(|v| !v.is_empty()) {
        Some(explicit) => explicit.trim_end_matches('/').to_owned(),
        None => parsed.origin().ascii_serialization(),
    };

    Ok(IdentityConfig { userinfo_url: userinfo_url.to_owned(), issuer, timeout_secs })
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_strict<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
