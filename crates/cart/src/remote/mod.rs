//! Per-user remote cart replica.
//!
//! Only reachable while a user is signed in; every operation is scoped by
//! the [`UserId`] the identity provider handed out, so there is no
//! cross-user visibility. Failures propagate as [`RemoteStoreError`] so the
//! reconciler can tell a lost write from a successful one.

mod memory;
mod postgres;

pub use memory::{MemoryRemoteStore, RemoteOp};
pub use postgres::{PgRemoteCartStore, create_pool, run_migrations};

use async_trait::async_trait;
use crumb_core::{MinimalCartLine, ProductId, UserId};
use thiserror::Error;

/// Errors raised by remote store adapters.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or cannot be represented.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The store could not be reached.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Port for the per-user cart collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// All lines of the user's cart, oldest first.
    async fn read_all(&self, user_id: &UserId) -> Result<Vec<MinimalCartLine>, RemoteStoreError>;

    /// Insert the line, or overwrite variant and quantity of the user's
    /// existing line for the same product. Never creates a duplicate.
    async fn upsert(
        &self,
        user_id: &UserId,
        line: &MinimalCartLine,
    ) -> Result<(), RemoteStoreError>;

    /// Delete the user's line for a product. Deleting an absent line succeeds.
    async fn remove(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteStoreError>;

    /// Delete every line of the user's cart.
    async fn clear(&self, user_id: &UserId) -> Result<(), RemoteStoreError>;
}

/// Remote store for hosts with no database configured.
///
/// Every call fails with [`RemoteStoreError::Unavailable`], which the
/// reconciler reports as a warning like any other outage.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedRemoteStore;

impl DisconnectedRemoteStore {
    fn unavailable<T>() -> Result<T, RemoteStoreError> {
        Err(RemoteStoreError::Unavailable(
            "no remote store configured".to_string(),
        ))
    }
}

#[async_trait]
impl RemoteCartStore for DisconnectedRemoteStore {
    async fn read_all(&self, _user_id: &UserId) -> Result<Vec<MinimalCartLine>, RemoteStoreError> {
        Self::unavailable()
    }

    async fn upsert(
        &self,
        _user_id: &UserId,
        _line: &MinimalCartLine,
    ) -> Result<(), RemoteStoreError> {
        Self::unavailable()
    }

    async fn remove(
        &self,
        _user_id: &UserId,
        _product_id: &ProductId,
    ) -> Result<(), RemoteStoreError> {
        Self::unavailable()
    }

    async fn clear(&self, _user_id: &UserId) -> Result<(), RemoteStoreError> {
        Self::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnected_store_is_always_unavailable() {
        let store = DisconnectedRemoteStore;
        let user = UserId::new("u1");

        assert!(matches!(
            store.read_all(&user).await,
            Err(RemoteStoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.clear(&user).await,
            Err(RemoteStoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.remove(&user, &ProductId::new("cookie-1")).await,
            Err(RemoteStoreError::Unavailable(_))
        ));
    }
}
