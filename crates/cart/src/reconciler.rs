//! Cart reconciler.
//!
//! Owns the authoritative in-memory [`Cart`] and keeps the replicas in step
//! with it, depending on who is signed in:
//!
//! | Identity | Writes go to | On entering this state |
//! |----------|--------------|------------------------|
//! | signed out | local store, whole cart | cart written to local store |
//! | signed in as `u` | remote store, one line at a time | remote read, local-only lines pushed, merged cart cached locally |
//!
//! The merge runs once per sign-in: `merged_for` records the user it last
//! completed for, and repeated notifications for that user are no-ops. A
//! merge whose remote read or pushes fail keeps the local lines and stays
//! pending. Every later operation retries it first, so the cart never
//! writes single lines into a remote cart it has not caught up with.
//!
//! Switching directly from one user to another loads the new user's remote
//! cart without pushing anything; the in-memory lines belong to the previous
//! user.

use std::sync::Arc;

use crumb_core::{DisplayCartLine, Identity, ProductId, ProductSummary, Quantity, UserId};
use tracing::{debug, info, instrument, warn};

use crate::cart::{Cart, LineChange, Merge, merge_remote_wins};
use crate::catalog::CatalogLookup;
use crate::enrichment::DisplayEnricher;
use crate::error::{CartError, StoreKind};
use crate::local::LocalCartStore;
use crate::remote::RemoteCartStore;

/// Identity-driven cart state machine.
pub struct CartReconciler {
    cart: Cart,
    identity: Identity,
    merged_for: Option<UserId>,
    /// The in-memory lines only mirror the remote cart; a merge must not
    /// push them.
    cache_only: bool,
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartStore>,
    enricher: DisplayEnricher,
    view: Vec<DisplayCartLine>,
}

impl CartReconciler {
    fn new(
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        catalog: Arc<dyn CatalogLookup>,
    ) -> Self {
        Self {
            cart: Cart::new(),
            identity: Identity::SignedOut,
            merged_for: None,
            cache_only: false,
            local,
            remote,
            enricher: DisplayEnricher::new(catalog),
            view: Vec::new(),
        }
    }

    /// Load the cart for `identity`.
    ///
    /// Signed out, the local store is the only source. Signed in, the local
    /// lines are merged into the user's remote cart.
    #[instrument(skip_all, fields(signed_in = identity.is_signed_in()))]
    pub async fn load(
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        catalog: Arc<dyn CatalogLookup>,
        identity: Identity,
    ) -> (Self, Vec<CartError>) {
        let mut reconciler = Self::new(local, remote, catalog);
        reconciler.cart = Cart::from_lines(reconciler.local.read().await);

        let mut warnings = match identity {
            Identity::SignedOut => Vec::new(),
            Identity::SignedIn(user_id) => reconciler.merge(user_id).await,
        };
        warnings.extend(reconciler.enrich().await);

        (reconciler, warnings)
    }

    /// Load a signed-in session whose merge already happened earlier.
    ///
    /// The user's remote cart is loaded as is; whatever the local store holds
    /// is a cache of it and is not pushed. If the remote read fails, the
    /// cache is shown instead and the merge stays pending, as in [`load`].
    ///
    /// [`load`]: Self::load
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn resume(
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        catalog: Arc<dyn CatalogLookup>,
        user_id: UserId,
    ) -> (Self, Vec<CartError>) {
        let mut reconciler = Self::new(local, remote, catalog);
        reconciler.cart = Cart::from_lines(reconciler.local.read().await);
        reconciler.cache_only = true;

        let mut warnings = reconciler.merge(user_id).await;
        warnings.extend(reconciler.enrich().await);

        (reconciler, warnings)
    }

    /// The authoritative cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The current identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The user the last completed merge ran for.
    #[must_use]
    pub const fn merged_for(&self) -> Option<&UserId> {
        self.merged_for.as_ref()
    }

    /// Signed in, but the merge for the current user has not completed.
    #[must_use]
    pub fn merge_pending(&self) -> bool {
        self.identity
            .user_id()
            .is_some_and(|user_id| self.merged_for.as_ref() != Some(user_id))
    }

    /// The last enriched view.
    #[must_use]
    pub fn view(&self) -> &[DisplayCartLine] {
        &self.view
    }

    /// Apply an identity notification.
    #[instrument(skip_all, fields(signed_in = identity.is_signed_in()))]
    pub async fn set_identity(&mut self, identity: Identity) -> Vec<CartError> {
        let mut warnings = match (self.identity.clone(), identity) {
            (Identity::SignedOut, Identity::SignedOut) => return Vec::new(),
            (Identity::SignedIn(_), Identity::SignedOut) => self.sign_out().await,
            (Identity::SignedIn(current), Identity::SignedIn(next)) if current != next => {
                info!(from = %current, to = %next, "Switching signed-in user");
                self.cart.clear();
                self.cache_only = true;
                self.merge(next).await
            }
            (Identity::SignedOut, Identity::SignedIn(user_id)) => {
                self.cache_only = false;
                self.merge(user_id).await
            }
            (_, Identity::SignedIn(user_id)) => {
                if self.merged_for.as_ref() == Some(&user_id) {
                    debug!(user_id = %user_id, "Already merged for user");
                    return Vec::new();
                }
                self.merge(user_id).await
            }
        };

        warnings.extend(self.enrich().await);
        warnings
    }

    /// Add `quantity` of a product. Zero is a no-op.
    #[instrument(skip(self, product), fields(product_id = %product.product_id))]
    pub async fn add(&mut self, product: &ProductSummary, quantity: u32) -> Vec<CartError> {
        let Ok(quantity) = Quantity::new(quantity) else {
            return Vec::new();
        };

        let caught_up = self.catch_up().await;
        self.enricher
            .remember(product.product_id.clone(), product.attributes.clone());
        let change = self.cart.add(
            product.product_id.clone(),
            product.attributes.variant_id.clone(),
            quantity,
        );
        self.apply(caught_up, change).await
    }

    /// Set a product's quantity; zero removes the line.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Vec<CartError> {
        let caught_up = self.catch_up().await;
        let change = self.cart.set_quantity(product_id, quantity);
        self.apply(caught_up, change).await
    }

    /// Remove a product's line.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&mut self, product_id: &ProductId) -> Vec<CartError> {
        let caught_up = self.catch_up().await;
        let change = self.cart.remove(product_id);
        self.apply(caught_up, change).await
    }

    /// Empty the cart in memory and in the store for the current identity.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Vec<CartError> {
        self.cart.clear();

        let result = match self.identity.user_id().cloned() {
            Some(user_id) => match self.remote.clear(&user_id).await {
                Ok(()) => {
                    // Both sides are empty, so they agree.
                    self.merged_for = Some(user_id);
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Failed to clear remote cart");
                    Err(CartError::write_failed(StoreKind::Remote, &e))
                }
            },
            None => self.local.clear().await,
        };

        let mut warnings: Vec<CartError> = result.err().into_iter().collect();
        warnings.extend(self.enrich().await);
        warnings
    }

    /// Re-run enrichment without touching the cart.
    pub async fn refresh(&mut self) -> Vec<CartError> {
        let mut warnings = self.catch_up().await.unwrap_or_default();
        warnings.extend(self.enrich().await);
        warnings
    }

    /// Retry a pending merge before touching the remote cart.
    ///
    /// `None` when nothing was pending.
    async fn catch_up(&mut self) -> Option<Vec<CartError>> {
        if !self.merge_pending() {
            return None;
        }
        let user_id = self.identity.user_id()?.clone();

        info!(user_id = %user_id, "Retrying pending merge");
        Some(self.merge(user_id).await)
    }

    async fn apply(
        &mut self,
        caught_up: Option<Vec<CartError>>,
        change: LineChange,
    ) -> Vec<CartError> {
        let merged = caught_up.is_some();
        let mut warnings = caught_up.unwrap_or_default();
        if change == LineChange::Unchanged && !merged {
            return warnings;
        }

        if change != LineChange::Unchanged {
            let written = if self.identity.is_signed_in() {
                self.write_remote(&change).await
            } else {
                self.local.write(&self.cart.to_vec()).await
            };
            warnings.extend(written.err());
        }

        warnings.extend(self.enrich().await);
        warnings
    }

    async fn write_remote(&self, change: &LineChange) -> Result<(), CartError> {
        let user_id = self.signed_in_user()?;

        let result = match change {
            LineChange::Upserted(line) => self.remote.upsert(user_id, line).await,
            LineChange::Removed(product_id) => self.remote.remove(user_id, product_id).await,
            LineChange::Unchanged => Ok(()),
        };

        result.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Failed to write remote cart line");
            CartError::write_failed(StoreKind::Remote, &e)
        })
    }

    fn signed_in_user(&self) -> Result<&UserId, CartError> {
        debug_assert!(
            self.identity.is_signed_in(),
            "remote cart accessed while signed out"
        );
        self.identity.user_id().ok_or(CartError::NotAuthenticated)
    }

    /// Merge the in-memory lines into `user_id`'s remote cart.
    async fn merge(&mut self, user_id: UserId) -> Vec<CartError> {
        self.identity = Identity::SignedIn(user_id.clone());
        self.merged_for = None;

        let remote_lines = match self.remote.read_all(&user_id).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to read remote cart, keeping local lines");
                return vec![CartError::read_failed(StoreKind::Remote, &e)];
            }
        };

        let local_lines = if self.cache_only {
            Vec::new()
        } else {
            self.cart.to_vec()
        };
        let Merge { cart, to_push } = merge_remote_wins(&local_lines, &remote_lines);
        self.cart = cart;

        let mut warnings = Vec::new();
        for line in &to_push {
            if let Err(e) = self.remote.upsert(&user_id, line).await {
                warn!(user_id = %user_id, product_id = %line.product_id, error = %e, "Failed to push local line");
                warnings.push(CartError::write_failed(StoreKind::Remote, &e));
            }
        }

        if warnings.is_empty() {
            self.merged_for = Some(user_id.clone());
        }

        if let Err(e) = self.local.write(&self.cart.to_vec()).await {
            warnings.push(e);
        }

        info!(
            user_id = %user_id,
            remote = remote_lines.len(),
            pushed = to_push.len(),
            lines = self.cart.len(),
            "Merged cart on sign-in"
        );
        warnings
    }

    async fn sign_out(&mut self) -> Vec<CartError> {
        info!(lines = self.cart.len(), "Signed out, cart now backed locally");
        self.identity = Identity::SignedOut;
        self.merged_for = None;
        self.cache_only = false;

        self.local
            .write(&self.cart.to_vec())
            .await
            .err()
            .into_iter()
            .collect()
    }

    async fn enrich(&mut self) -> Option<CartError> {
        let enriched = self.enricher.enrich(&self.cart).await;
        self.view = enriched.lines;
        enriched.warning
    }
}
