//! `PostgreSQL` cart store.
//!
//! One row per owner key; line items are stored as `jsonb`. Compare-and-set
//! is a conditional `UPDATE ... WHERE version = $base` (or an
//! `INSERT ... ON CONFLICT DO NOTHING` for never-persisted carts), checked
//! via the rows affected. Queries are runtime-bound rather than `sqlx!`
//! macros so the crate builds without a live database.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use cartsync_core::{Cart, LineItem, OwnerKey};

use super::{CartStore, check_write};
use crate::error::StoreError;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed cart store.
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the store's schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::migrate::MigrateError` if a migration fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn stored_version(&self, key: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT version FROM reconcile.cart WHERE owner_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => decode_version(row.try_get("version")?),
            None => Ok(0),
        }
    }
}

fn decode_version(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw)
        .map_err(|_| StoreError::Corruption(format!("negative cart version in store: {raw}")))
}

#[async_trait::async_trait]
impl CartStore for PgCartStore {
    async fn get(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query(
            "SELECT items, version, updated_at FROM reconcile.cart WHERE owner_key = $1",
        )
        .bind(owner.storage_key())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: serde_json::Value = row.try_get("items")?;
        let items: Vec<LineItem> = serde_json::from_value(items)?;
        let version = decode_version(row.try_get("version")?)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        let cart = Cart {
            owner: owner.clone(),
            items,
            updated_at,
            version,
        };
        cart.check_invariants()
            .map_err(|violation| StoreError::Corruption(violation.to_string()))?;
        Ok(Some(cart))
    }

    #[instrument(skip(self, cart), fields(owner = %owner, base = cart.version))]
    async fn put(&self, owner: &OwnerKey, cart: Cart) -> Result<Cart, StoreError> {
        check_write(owner, &cart)?;

        let key = owner.storage_key();
        let items = serde_json::to_value(&cart.items)?;
        let base = cart.version;

        let committed = if base == 0 {
            sqlx::query(
                r"
                INSERT INTO reconcile.cart (owner_key, items, version, updated_at)
                VALUES ($1, $2, 1, now())
                ON CONFLICT (owner_key) DO NOTHING
                RETURNING version, updated_at
                ",
            )
            .bind(&key)
            .bind(&items)
            .fetch_optional(&self.pool)
            .await?
        } else {
            let next = i64::try_from(base + 1)
                .map_err(|_| StoreError::Corruption(format!("cart version overflow: {base}")))?;
            sqlx::query(
                r"
                UPDATE reconcile.cart
                SET items = $2, version = $3, updated_at = now()
                WHERE owner_key = $1 AND version = $4
                RETURNING version, updated_at
                ",
            )
            .bind(&key)
            .bind(&items)
            .bind(next)
            .bind(next - 1)
            .fetch_optional(&self.pool)
            .await?
        };

        let Some(row) = committed else {
            // Lost the race; report the version the winner left behind.
            let found = self.stored_version(&key).await?;
            return Err(StoreError::Conflict {
                owner: key,
                base,
                found,
            });
        };

        let version = decode_version(row.try_get("version")?)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        debug!(version, "cart write committed");

        Ok(Cart {
            version,
            updated_at,
            ..cart
        })
    }

    async fn delete(&self, owner: &OwnerKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM reconcile.cart WHERE owner_key = $1")
            .bind(owner.storage_key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
