//! Fixed catalog held in memory, optionally loaded from YAML.
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - id: cookie-1
//!     variant_id: cookie-1-single
//!     name: Chocolate Chip
//!     price: "3.50"
//!     image_url: /static/cookies/chocolate-chip.png
//!     description: Brown butter, sea salt.
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use crumb_core::{CurrencyCode, DisplayAttributes, Price, ProductId, VariantId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{CatalogError, CatalogLookup};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<CatalogFileProduct>,
}

#[derive(Debug, Deserialize)]
struct CatalogFileProduct {
    id: ProductId,
    variant_id: Option<VariantId>,
    name: String,
    price: Decimal,
    #[serde(default)]
    currency: CurrencyCode,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    description: String,
}

/// In-memory [`CatalogLookup`].
///
/// Can be taken offline to simulate an outage, and counts `resolve` calls so
/// tests can check that a refresh makes exactly one batch lookup.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: RwLock<HashMap<ProductId, DisplayAttributes>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StaticCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product before the catalog is shared.
    #[must_use]
    pub fn with_product(mut self, product_id: ProductId, attributes: DisplayAttributes) -> Self {
        self.products.get_mut().insert(product_id, attributes);
        self
    }

    /// Parse a YAML catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::File` if the YAML does not match the catalog format.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::File(e.to_string()))?;

        let products = file
            .products
            .into_iter()
            .map(|p| {
                let variant_id = p.variant_id.unwrap_or_else(|| VariantId::new(p.id.as_str()));
                let attributes = DisplayAttributes {
                    name: p.name,
                    unit_price: Price::new(p.price, p.currency),
                    image_url: p.image_url,
                    description: p.description,
                    variant_id,
                };
                (p.id, attributes)
            })
            .collect();

        Ok(Self {
            products: RwLock::new(products),
            ..Self::default()
        })
    }

    /// Load a YAML catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::File` if the file cannot be read or parsed.
    pub async fn from_yaml_file(path: &Path) -> Result<Self, CatalogError> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::File(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&yaml)
    }

    /// Add or replace a product.
    pub async fn insert(&self, product_id: ProductId, attributes: DisplayAttributes) {
        self.products.write().await.insert(product_id, attributes);
    }

    /// Discontinue a product.
    pub async fn remove(&self, product_id: &ProductId) -> Option<DisplayAttributes> {
        self.products.write().await.remove(product_id)
    }

    /// Simulate an outage (`true`) or recovery (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `resolve` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    async fn resolve(
        &self,
        product_ids: &BTreeSet<ProductId>,
    ) -> Result<HashMap<ProductId, DisplayAttributes>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CatalogError::Offline);
        }

        let products = self.products.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| products.get(id).map(|a| (id.clone(), a.clone())))
            .collect())
    }
}
