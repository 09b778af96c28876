//! Cart facade.
//!
//! The one object UI code holds. Mutations queue on a FIFO async mutex and
//! run one at a time, in the order they were issued. Reads never take that
//! lock: the enriched view, the minimal lines and the identity are
//! published on `watch` channels after every mutation, so a reader sees the
//! last completed state even while a remote call is in flight.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use crumb_cart::catalog::StaticCatalog;
//! use crumb_cart::local::{DEFAULT_CART_KEY, LocalCartStore, MemoryStorage};
//! use crumb_cart::remote::MemoryRemoteStore;
//! use crumb_cart::{CartDependencies, CartFacade};
//! use crumb_core::Identity;
//!
//! # async fn demo() {
//! let deps = CartDependencies {
//!     local: LocalCartStore::new(Arc::new(MemoryStorage::new()), DEFAULT_CART_KEY),
//!     remote: Arc::new(MemoryRemoteStore::new()),
//!     catalog: Arc::new(StaticCatalog::new()),
//! };
//! let (cart, _warnings) = CartFacade::mount(deps, Identity::SignedOut).await;
//! let view = cart.subscribe();
//! # }
//! ```

use std::sync::Arc;

use crumb_core::{DisplayCartLine, Identity, MinimalCartLine, ProductId, ProductSummary, UserId};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::CatalogLookup;
use crate::error::{CartError, MutationOutcome};
use crate::local::LocalCartStore;
use crate::reconciler::CartReconciler;
use crate::remote::RemoteCartStore;

/// Capacity of the warning broadcast channel.
const WARNING_CAPACITY: usize = 64;

/// Collaborators the cart needs.
#[derive(Clone)]
pub struct CartDependencies {
    pub local: LocalCartStore,
    pub remote: Arc<dyn RemoteCartStore>,
    pub catalog: Arc<dyn CatalogLookup>,
}

/// Cheaply cloneable handle to a mounted cart.
#[derive(Clone)]
pub struct CartFacade {
    inner: Arc<FacadeInner>,
}

struct FacadeInner {
    reconciler: Mutex<CartReconciler>,
    view: watch::Sender<Vec<DisplayCartLine>>,
    lines: watch::Sender<Vec<MinimalCartLine>>,
    identity: watch::Sender<Identity>,
    warnings: broadcast::Sender<CartError>,
}

impl CartFacade {
    /// Load the cart for `identity` and start publishing it.
    ///
    /// Warnings raised while loading are returned rather than broadcast,
    /// since nobody can have subscribed yet.
    pub async fn mount(deps: CartDependencies, identity: Identity) -> (Self, MutationOutcome) {
        let (reconciler, warnings) =
            CartReconciler::load(deps.local, deps.remote, deps.catalog, identity).await;
        Self::start(reconciler, warnings)
    }

    /// Mount a signed-in session that was merged on an earlier run.
    ///
    /// The user's remote cart is loaded without pushing the local cache.
    pub async fn resume(deps: CartDependencies, user_id: UserId) -> (Self, MutationOutcome) {
        let (reconciler, warnings) =
            CartReconciler::resume(deps.local, deps.remote, deps.catalog, user_id).await;
        Self::start(reconciler, warnings)
    }

    fn start(reconciler: CartReconciler, warnings: Vec<CartError>) -> (Self, MutationOutcome) {
        let (view, _) = watch::channel(reconciler.view().to_vec());
        let (lines, _) = watch::channel(reconciler.cart().to_vec());
        let (identity, _) = watch::channel(reconciler.identity().clone());
        let (warnings_tx, _) = broadcast::channel(WARNING_CAPACITY);

        info!(
            lines = reconciler.cart().len(),
            signed_in = reconciler.identity().is_signed_in(),
            "Cart mounted"
        );

        let facade = Self {
            inner: Arc::new(FacadeInner {
                reconciler: Mutex::new(reconciler),
                view,
                lines,
                identity,
                warnings: warnings_tx,
            }),
        };
        (facade, MutationOutcome::with_warnings(warnings))
    }

    /// Current display-ready cart.
    #[must_use]
    pub fn get_cart(&self) -> Vec<DisplayCartLine> {
        self.inner.view.borrow().clone()
    }

    /// Current authoritative lines.
    #[must_use]
    pub fn lines(&self) -> Vec<MinimalCartLine> {
        self.inner.lines.borrow().clone()
    }

    /// Identity the cart is currently reconciled for.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.inner.identity.borrow().clone()
    }

    /// Whether a sign-in merge is still owed to the remote store.
    ///
    /// Waits for in-flight mutations. Hosts that remember the signed-in user
    /// across restarts should only do so once this is `false`.
    pub async fn merge_pending(&self) -> bool {
        self.inner.reconciler.lock().await.merge_pending()
    }

    /// Watch the display cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<DisplayCartLine>> {
        self.inner.view.subscribe()
    }

    /// Receive every warning raised after this call.
    #[must_use]
    pub fn warnings(&self) -> broadcast::Receiver<CartError> {
        self.inner.warnings.subscribe()
    }

    /// Add `quantity` of a product. Zero is a no-op.
    pub async fn add(&self, product: &ProductSummary, quantity: u32) -> MutationOutcome {
        let mut reconciler = self.inner.reconciler.lock().await;
        let warnings = reconciler.add(product, quantity).await;
        self.publish(&reconciler, warnings)
    }

    /// Set a product's quantity. Zero removes the line; products not in the
    /// cart are left alone.
    pub async fn set_quantity(&self, product_id: &ProductId, quantity: u32) -> MutationOutcome {
        let mut reconciler = self.inner.reconciler.lock().await;
        let warnings = reconciler.set_quantity(product_id, quantity).await;
        self.publish(&reconciler, warnings)
    }

    /// Remove a product's line.
    pub async fn remove(&self, product_id: &ProductId) -> MutationOutcome {
        let mut reconciler = self.inner.reconciler.lock().await;
        let warnings = reconciler.remove(product_id).await;
        self.publish(&reconciler, warnings)
    }

    /// Empty the cart.
    pub async fn clear(&self) -> MutationOutcome {
        let mut reconciler = self.inner.reconciler.lock().await;
        let warnings = reconciler.clear().await;
        self.publish(&reconciler, warnings)
    }

    /// Re-resolve display attributes.
    pub async fn refresh(&self) -> MutationOutcome {
        let mut reconciler = self.inner.reconciler.lock().await;
        let warnings = reconciler.refresh().await;
        self.publish(&reconciler, warnings)
    }

    /// Apply a sign-in or sign-out.
    pub async fn set_identity(&self, identity: Identity) -> MutationOutcome {
        let mut reconciler = self.inner.reconciler.lock().await;
        let warnings = reconciler.set_identity(identity).await;
        self.publish(&reconciler, warnings)
    }

    /// Follow an identity source until it closes.
    ///
    /// The current value is applied first, then every change. Warnings go
    /// out on the broadcast channel.
    pub fn follow(&self, mut identities: watch::Receiver<Identity>) -> JoinHandle<()> {
        let facade = self.clone();
        tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                let _ = facade.set_identity(identity).await;

                if identities.changed().await.is_err() {
                    debug!("Identity source closed");
                    break;
                }
            }
        })
    }

    fn publish(&self, reconciler: &CartReconciler, warnings: Vec<CartError>) -> MutationOutcome {
        replace_if_changed(&self.inner.view, reconciler.view());
        replace_if_changed(&self.inner.lines, &reconciler.cart().to_vec());
        self.inner.identity.send_if_modified(|current| {
            if current == reconciler.identity() {
                false
            } else {
                current.clone_from(reconciler.identity());
                true
            }
        });

        for warning in &warnings {
            // No subscribers is fine; the outcome still carries the warning.
            let _ = self.inner.warnings.send(warning.clone());
        }

        MutationOutcome::with_warnings(warnings)
    }
}

fn replace_if_changed<T: Clone + PartialEq>(tx: &watch::Sender<Vec<T>>, next: &[T]) {
    tx.send_if_modified(|current| {
        if current.as_slice() == next {
            false
        } else {
            *current = next.to_vec();
            true
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use crumb_core::{DisplayAttributes, Price, Quantity, VariantId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::local::{DEFAULT_CART_KEY, MemoryStorage};
    use crate::remote::MemoryRemoteStore;

    fn summary(product: &str) -> ProductSummary {
        ProductSummary {
            product_id: ProductId::new(product),
            attributes: DisplayAttributes {
                name: product.to_uppercase(),
                unit_price: Price::usd(Decimal::new(250, 2)),
                image_url: String::new(),
                description: String::new(),
                variant_id: VariantId::new(format!("{product}-v")),
            },
        }
    }

    fn deps(remote: Arc<MemoryRemoteStore>) -> CartDependencies {
        let catalog = ["a", "b"].into_iter().fold(StaticCatalog::new(), |c, p| {
            let s = summary(p);
            c.with_product(s.product_id, s.attributes)
        });
        CartDependencies {
            local: LocalCartStore::new(Arc::new(MemoryStorage::new()), DEFAULT_CART_KEY),
            remote,
            catalog: Arc::new(catalog),
        }
    }

    #[tokio::test]
    async fn test_mutations_publish_view_and_lines() {
        let (cart, outcome) =
            CartFacade::mount(deps(Arc::new(MemoryRemoteStore::new())), Identity::SignedOut).await;
        assert!(outcome.is_clean());
        let mut view = cart.subscribe();

        assert!(cart.add(&summary("a"), 2).await.is_clean());
        assert!(view.has_changed().unwrap());

        let shown = view.borrow_and_update().clone();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].line_total().display(), "$5.00");
        assert_eq!(cart.lines()[0].quantity, Quantity::new(2).unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_serialized() {
        let (cart, _) =
            CartFacade::mount(deps(Arc::new(MemoryRemoteStore::new())), Identity::SignedOut).await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let cart = cart.clone();
                tokio::spawn(async move { cart.add(&summary("a"), 1).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_clean());
        }

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity.get(), 10);
    }

    #[tokio::test]
    async fn test_write_failures_are_broadcast() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let (cart, _) =
            CartFacade::mount(deps(remote.clone()), Identity::SignedIn(UserId::new("u1"))).await;
        let mut warnings = cart.warnings();

        remote.set_available(false);
        let outcome = cart.add(&summary("b"), 1).await;

        assert!(outcome.has_write_failure());
        assert!(warnings.recv().await.unwrap().is_write_failure());
        assert_eq!(cart.get_cart().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_applies_identity_changes() {
        let remote = Arc::new(
            MemoryRemoteStore::new().with_cart(
                &UserId::new("u1"),
                [MinimalCartLine::new(
                    ProductId::new("b"),
                    VariantId::new("b-v"),
                    Quantity::ONE,
                )],
            ),
        );
        let (cart, _) = CartFacade::mount(deps(remote), Identity::SignedOut).await;
        let _ = cart.add(&summary("a"), 1).await;

        let (identity_tx, identity_rx) = watch::channel(Identity::SignedOut);
        let listener = cart.follow(identity_rx);
        let mut lines = cart.inner.lines.subscribe();

        identity_tx
            .send(Identity::SignedIn(UserId::new("u1")))
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            lines.wait_for(|lines| lines.len() == 2),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(cart.identity().is_signed_in());
        drop(identity_tx);
        listener.await.unwrap();
    }
}
