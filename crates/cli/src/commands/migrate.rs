//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! crumb migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CRUMB_DATABASE_URL` - `PostgreSQL` connection string for the remote
//!   cart store (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Remote store migrations live in `crates/cart/migrations/`:
//! ```text
//! migrations/
//! └── 20260301000000_create_cart_line.sql
//! ```

use crumb_cart::config::database_url_from_env;
use crumb_cart::remote::{create_pool, run_migrations};
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: CRUMB_DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run remote cart store migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database URL is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url: SecretString =
        database_url_from_env().ok_or(MigrationError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to cart database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running cart migrations...");
    run_migrations(&pool).await?;

    tracing::info!("Cart migrations complete!");
    Ok(())
}
