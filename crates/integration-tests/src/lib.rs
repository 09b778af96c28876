//! Integration tests for the Crumb cart.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests
//! cargo test -p crumb-integration-tests
//!
//! # Postgres remote store (needs a migrated database)
//! CRUMB_TEST_DATABASE_URL=postgres://localhost/crumb_test \
//!     cargo test -p crumb-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - Facade behaviour across sign-in, sign-out and outages
//! - `postgres_remote` - `PgRemoteCartStore` against a real database
//!
//! This library holds the shared fixtures: a small bakery menu and a
//! [`Bakery`] bundle of in-memory collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use crumb_cart::CartDependencies;
use crumb_cart::catalog::StaticCatalog;
use crumb_cart::local::{DEFAULT_CART_KEY, LocalCartStore, MemoryStorage};
use crumb_cart::remote::MemoryRemoteStore;
use crumb_core::{
    DisplayAttributes, MinimalCartLine, Price, ProductId, ProductSummary, Quantity, UserId,
    VariantId,
};
use rust_decimal::Decimal;

/// The menu every fixture catalog starts from.
pub const MENU: &str = r#"
products:
  - id: cookie-1
    variant_id: cookie-1-single
    name: Chocolate Chip
    price: "3.50"
    description: Brown butter, sea salt.
  - id: cookie-2
    variant_id: cookie-2-single
    name: Snickerdoodle
    price: "3.25"
  - id: cookie-3
    variant_id: cookie-3-single
    name: Oatmeal Raisin
    price: "3.00"
"#;

/// In-memory collaborators for one device, with handles kept for
/// inspection and fault injection.
pub struct Bakery {
    pub storage: Arc<MemoryStorage>,
    pub remote: Arc<MemoryRemoteStore>,
    pub catalog: Arc<StaticCatalog>,
}

impl Default for Bakery {
    fn default() -> Self {
        Self::new()
    }
}

impl Bakery {
    /// Empty device storage, empty remote store, the full menu.
    ///
    /// # Panics
    ///
    /// Panics if [`MENU`] does not parse.
    #[must_use]
    pub fn new() -> Self {
        Self::with_remote(MemoryRemoteStore::new())
    }

    /// Same, over a pre-seeded remote store.
    ///
    /// # Panics
    ///
    /// Panics if [`MENU`] does not parse.
    #[must_use]
    pub fn with_remote(remote: MemoryRemoteStore) -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            remote: Arc::new(remote),
            catalog: Arc::new(StaticCatalog::from_yaml_str(MENU).expect("fixture menu parses")),
        }
    }

    /// The device-local cart replica.
    #[must_use]
    pub fn local(&self) -> LocalCartStore {
        LocalCartStore::new(self.storage.clone(), DEFAULT_CART_KEY)
    }

    /// Dependencies for mounting a facade.
    #[must_use]
    pub fn deps(&self) -> CartDependencies {
        CartDependencies {
            local: self.local(),
            remote: self.remote.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

/// A product as the UI would pass it to `add`.
#[must_use]
pub fn product(id: &str, name: &str) -> ProductSummary {
    ProductSummary {
        product_id: ProductId::new(id),
        attributes: DisplayAttributes {
            name: name.to_string(),
            unit_price: Price::usd(Decimal::new(350, 2)),
            image_url: String::new(),
            description: String::new(),
            variant_id: VariantId::new(format!("{id}-single")),
        },
    }
}

/// A minimal line using the fixture variant naming.
///
/// # Panics
///
/// Panics if `quantity` is zero.
#[must_use]
pub fn line(id: &str, quantity: u32) -> MinimalCartLine {
    MinimalCartLine::new(
        ProductId::new(id),
        VariantId::new(format!("{id}-single")),
        Quantity::new(quantity).expect("fixture quantity is positive"),
    )
}

/// `(product, quantity)` pairs, for compact assertions.
#[must_use]
pub fn pairs(lines: &[MinimalCartLine]) -> Vec<(String, u32)> {
    lines
        .iter()
        .map(|l| (l.product_id.to_string(), l.quantity.get()))
        .collect()
}

/// A fixture user.
#[must_use]
pub fn user(id: &str) -> UserId {
    UserId::new(id)
}
