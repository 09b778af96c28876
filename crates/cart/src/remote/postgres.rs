//! `PostgreSQL` remote store.
//!
//! # Table: `cart.cart_line`
//!
//! One row per `(user_id, product_id)`. Upserts go through
//! `ON CONFLICT ... DO UPDATE`, so concurrent writers for the same product
//! resolve to the last write.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/cart/migrations/` and run via:
//! ```bash
//! crumb migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use crumb_core::{MinimalCartLine, ProductId, Quantity, UserId, VariantId};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{instrument, warn};

use super::{RemoteCartStore, RemoteStoreError};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the remote-store migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Remote cart store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgRemoteCartStore {
    pool: PgPool,
}

impl PgRemoteCartStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `quantity` is `BIGINT`, so every `u32` count fits.
fn to_db_quantity(quantity: Quantity) -> i64 {
    i64::from(quantity.get())
}

#[async_trait]
impl RemoteCartStore for PgRemoteCartStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn read_all(&self, user_id: &UserId) -> Result<Vec<MinimalCartLine>, RemoteStoreError> {
        let rows: Vec<(ProductId, VariantId, i64)> = sqlx::query_as(
            r"
            SELECT product_id, variant_id, quantity
            FROM cart.cart_line
            WHERE user_id = $1
            ORDER BY created_at, product_id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .filter_map(|(product_id, variant_id, quantity)| {
                let parsed = u32::try_from(quantity)
                    .ok()
                    .and_then(|q| Quantity::new(q).ok());
                if parsed.is_none() {
                    warn!(%product_id, quantity, "Skipping remote cart row with invalid quantity");
                }
                parsed.map(|q| MinimalCartLine::new(product_id, variant_id, q))
            })
            .collect();

        Ok(lines)
    }

    #[instrument(skip(self, line), fields(user_id = %user_id, product_id = %line.product_id))]
    async fn upsert(
        &self,
        user_id: &UserId,
        line: &MinimalCartLine,
    ) -> Result<(), RemoteStoreError> {
        let quantity = to_db_quantity(line.quantity);

        sqlx::query(
            r"
            INSERT INTO cart.cart_line (user_id, product_id, variant_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET variant_id = EXCLUDED.variant_id,
                quantity = EXCLUDED.quantity,
                updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(&line.product_id)
        .bind(&line.variant_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn remove(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteStoreError> {
        sqlx::query(
            r"
            DELETE FROM cart.cart_line
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn clear(&self, user_id: &UserId) -> Result<(), RemoteStoreError> {
        sqlx::query(
            r"
            DELETE FROM cart.cart_line
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_db_quantity() {
        assert_eq!(to_db_quantity(Quantity::new(12).unwrap()), 12);
    }

    #[test]
    fn test_saturated_quantity_fits_column() {
        assert_eq!(to_db_quantity(Quantity::MAX), 4_294_967_295);
        assert!(to_db_quantity(Quantity::MAX) > i64::from(i32::MAX));
    }
}
