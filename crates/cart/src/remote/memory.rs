//! In-process remote store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use crumb_core::{MinimalCartLine, ProductId, UserId};
use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};

use super::{RemoteCartStore, RemoteStoreError};

/// A call made against a [`MemoryRemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    ReadAll(UserId),
    Upsert(UserId, MinimalCartLine),
    Remove(UserId, ProductId),
    Clear(UserId),
}

/// [`RemoteCartStore`] held in memory, keyed by user.
///
/// Records every call (including failed ones) and can be switched
/// unavailable to simulate an outage.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    carts: RwLock<HashMap<UserId, IndexMap<ProductId, MinimalCartLine>>>,
    ops: Mutex<Vec<RemoteOp>>,
    available: AtomicBool,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self {
            carts: RwLock::default(),
            ops: Mutex::default(),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryRemoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's cart before the store is shared.
    #[must_use]
    pub fn with_cart(
        mut self,
        user_id: &UserId,
        lines: impl IntoIterator<Item = MinimalCartLine>,
    ) -> Self {
        let cart = self.carts.get_mut().entry(user_id.clone()).or_default();
        for line in lines {
            cart.insert(line.product_id.clone(), line);
        }
        self
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current lines of a user's cart, oldest first.
    pub async fn lines(&self, user_id: &UserId) -> Vec<MinimalCartLine> {
        self.carts
            .read()
            .await
            .get(user_id)
            .map(|cart| cart.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call made so far, in order.
    pub async fn operations(&self) -> Vec<RemoteOp> {
        self.ops.lock().await.clone()
    }

    /// Forget the recorded calls.
    pub async fn reset_operations(&self) {
        self.ops.lock().await.clear();
    }

    async fn record(&self, op: RemoteOp) -> Result<(), RemoteStoreError> {
        self.ops.lock().await.push(op);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteStoreError::Unavailable("simulated outage".to_string()))
        }
    }
}

#[async_trait]
impl RemoteCartStore for MemoryRemoteStore {
    async fn read_all(&self, user_id: &UserId) -> Result<Vec<MinimalCartLine>, RemoteStoreError> {
        self.record(RemoteOp::ReadAll(user_id.clone())).await?;
        Ok(self.lines(user_id).await)
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        line: &MinimalCartLine,
    ) -> Result<(), RemoteStoreError> {
        self.record(RemoteOp::Upsert(user_id.clone(), line.clone()))
            .await?;
        self.carts
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .insert(line.product_id.clone(), line.clone());
        Ok(())
    }

    async fn remove(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteStoreError> {
        self.record(RemoteOp::Remove(user_id.clone(), product_id.clone()))
            .await?;
        if let Some(cart) = self.carts.write().await.get_mut(user_id) {
            cart.shift_remove(product_id);
        }
        Ok(())
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), RemoteStoreError> {
        self.record(RemoteOp::Clear(user_id.clone())).await?;
        self.carts.write().await.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crumb_core::{Quantity, VariantId};

    use super::*;

    fn line(product: &str, quantity: u32) -> MinimalCartLine {
        MinimalCartLine::new(
            ProductId::new(product),
            VariantId::new(format!("{product}-v")),
            Quantity::new(quantity).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_upsert_overwrites_instead_of_duplicating() {
        let store = MemoryRemoteStore::new();
        let user = UserId::new("u1");

        store.upsert(&user, &line("a", 1)).await.unwrap();
        store.upsert(&user, &line("a", 4)).await.unwrap();

        assert_eq!(store.read_all(&user).await.unwrap(), vec![line("a", 4)]);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let store = MemoryRemoteStore::new().with_cart(&alice, [line("a", 1)]);

        assert!(store.read_all(&bob).await.unwrap().is_empty());
        store.clear(&bob).await.unwrap();
        assert_eq!(store.lines(&alice).await, vec![line("a", 1)]);
    }

    #[tokio::test]
    async fn test_outage_fails_and_records() {
        let store = MemoryRemoteStore::new();
        let user = UserId::new("u1");
        store.set_available(false);

        assert!(matches!(
            store.upsert(&user, &line("a", 1)).await,
            Err(RemoteStoreError::Unavailable(_))
        ));
        assert!(store.lines(&user).await.is_empty());
        assert_eq!(
            store.operations().await,
            vec![RemoteOp::Upsert(user, line("a", 1))]
        );
    }
}
