//! Cart line shapes.
//!
//! [`MinimalCartLine`] is the only shape that is ever persisted or
//! replicated. [`DisplayCartLine`] is a projection built from a minimal line
//! plus catalog [`DisplayAttributes`], and is never stored.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::price::Price;
use super::quantity::Quantity;

/// Persisted cart line: which product, which variant, how many.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MinimalCartLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: Quantity,
}

impl MinimalCartLine {
    /// Create a new cart line.
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: VariantId, quantity: Quantity) -> Self {
        Self {
            product_id,
            variant_id,
            quantity,
        }
    }
}

/// Catalog attributes needed to render a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAttributes {
    pub name: String,
    pub unit_price: Price,
    pub image_url: String,
    pub description: String,
    pub variant_id: VariantId,
}

/// Product as the UI knows it when the shopper clicks "add to cart".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub attributes: DisplayAttributes,
}

/// Display-ready cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCartLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub name: String,
    pub unit_price: Price,
    pub image_url: String,
    pub description: String,
    pub quantity: Quantity,
}

impl DisplayCartLine {
    /// Join a minimal line with its catalog attributes.
    ///
    /// The variant comes from the cart line, not the catalog: the shopper's
    /// choice wins over the catalog default.
    #[must_use]
    pub fn from_parts(line: &MinimalCartLine, attributes: &DisplayAttributes) -> Self {
        Self {
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
            name: attributes.name.clone(),
            unit_price: attributes.unit_price,
            image_url: attributes.image_url.clone(),
            description: attributes.description.clone(),
            quantity: line.quantity,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity.get())
    }
}
