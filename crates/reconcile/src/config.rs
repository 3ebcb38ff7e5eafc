//! Reconciliation configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTSYNC_DATABASE_URL` - `PostgreSQL` connection string (only when the
//!   `postgres` store backend is used)
//!
//! ## Optional
//! - `CARTSYNC_PRICE_TOLERANCE` - Absolute price delta (decimal, in currency
//!   units) the validator treats as informational rather than blocking
//!   (default: 0)
//! - `CARTSYNC_MERGE_RETRIES` - Read-merge-write attempts before a login
//!   merge gives up on version conflicts (default: 3)
//! - `CARTSYNC_INVENTORY_CACHE_TTL_SECS` - TTL for cached inventory lookups
//!   (default: 300)

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use crate::validate::ValidationPolicy;

const DEFAULT_MERGE_RETRIES: u32 = 3;
const DEFAULT_INVENTORY_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Reconciliation library configuration.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// `PostgreSQL` connection URL (contains password). Absent when running
    /// against the in-memory store.
    pub database_url: Option<SecretString>,
    /// Absolute price delta the validator tolerates without blocking.
    pub price_tolerance: Decimal,
    /// Merge attempts before a login merge transitions to failed.
    pub merge_retries: u32,
    /// How long inventory lookups may be served from cache.
    pub inventory_cache_ttl: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            price_tolerance: Decimal::ZERO,
            merge_retries: DEFAULT_MERGE_RETRIES,
            inventory_cache_ttl: Duration::from_secs(DEFAULT_INVENTORY_CACHE_TTL_SECS),
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from the environment, reading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is present but
    /// unparseable.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from already-set environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is present but
    /// unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("CARTSYNC_DATABASE_URL")
            .ok()
            .map(SecretString::from);

        let price_tolerance = match get_optional_env("CARTSYNC_PRICE_TOLERANCE") {
            Some(raw) => parse_decimal("CARTSYNC_PRICE_TOLERANCE", &raw)?,
            None => Decimal::ZERO,
        };

        let merge_retries = match get_optional_env("CARTSYNC_MERGE_RETRIES") {
            Some(raw) => parse_u32("CARTSYNC_MERGE_RETRIES", &raw)?,
            None => DEFAULT_MERGE_RETRIES,
        };

        let ttl_secs = match get_optional_env("CARTSYNC_INVENTORY_CACHE_TTL_SECS") {
            Some(raw) => parse_u64("CARTSYNC_INVENTORY_CACHE_TTL_SECS", &raw)?,
            None => DEFAULT_INVENTORY_CACHE_TTL_SECS,
        };

        Ok(Self {
            database_url,
            price_tolerance,
            merge_retries,
            inventory_cache_ttl: Duration::from_secs(ttl_secs),
        })
    }

    /// The database URL, required when the Postgres backend is in use.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `CARTSYNC_DATABASE_URL` was
    /// not set.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTSYNC_DATABASE_URL".to_owned()))
    }

    /// The validation policy derived from this configuration.
    #[must_use]
    pub const fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            price_tolerance: self.price_tolerance,
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_decimal(key: &str, raw: &str) -> Result<Decimal, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidEnvVar(key.to_owned(), format!("not a decimal: {raw}")))
}

fn parse_u32(key: &str, raw: &str) -> Result<u32, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidEnvVar(key.to_owned(), format!("not an integer: {raw}")))
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidEnvVar(key.to_owned(), format!("not an integer: {raw}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconcileConfig::default();
        assert_eq!(config.price_tolerance, Decimal::ZERO);
        assert_eq!(config.merge_retries, 3);
        assert_eq!(config.inventory_cache_ttl, Duration::from_secs(300));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_parse_decimal_valid() {
        assert_eq!(
            parse_decimal("TEST_VAR", "0.50").unwrap(),
            Decimal::new(50, 2)
        );
    }

    #[test]
    fn test_parse_decimal_invalid() {
        let err = parse_decimal("TEST_VAR", "half a dollar").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
        assert!(err.to_string().contains("TEST_VAR"));
    }

    #[test]
    fn test_parse_u32_invalid() {
        assert!(parse_u32("TEST_VAR", "-1").is_err());
        assert!(parse_u32("TEST_VAR", "many").is_err());
    }

    #[test]
    fn test_require_database_url_missing() {
        let config = ReconcileConfig::default();
        let err = config.require_database_url().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_validation_policy_carries_tolerance() {
        let config = ReconcileConfig {
            price_tolerance: Decimal::new(1_00, 2),
            ..ReconcileConfig::default()
        };
        assert_eq!(
            config.validation_policy().price_tolerance,
            Decimal::new(1_00, 2)
        );
    }
}
