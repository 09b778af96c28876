//! Read-only product catalog lookups.
//!
//! The cart only needs display attributes for the products it holds, so the
//! port is a single batch call keyed by product id. Ids the catalog does not
//! know are simply absent from the result.

mod http;
mod static_catalog;

pub use http::HttpCatalog;
pub use static_catalog::StaticCatalog;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use crumb_core::{DisplayAttributes, ProductId, ProductSummary};
use thiserror::Error;

/// Errors that can occur when querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Catalog file could not be loaded.
    #[error("Catalog file error: {0}")]
    File(String),

    /// Catalog is not reachable.
    #[error("Catalog offline")]
    Offline,
}

/// Batch lookup of display attributes by product id.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolve every id the catalog knows. Unknown ids are omitted.
    async fn resolve(
        &self,
        product_ids: &BTreeSet<ProductId>,
    ) -> Result<HashMap<ProductId, DisplayAttributes>, CatalogError>;
}

/// Look up one product and package it for `CartFacade::add`.
///
/// # Errors
///
/// Returns `CatalogError` if the lookup fails.
pub async fn lookup_summary(
    catalog: &dyn CatalogLookup,
    product_id: &ProductId,
) -> Result<Option<ProductSummary>, CatalogError> {
    let ids = BTreeSet::from([product_id.clone()]);
    let mut found = catalog.resolve(&ids).await?;

    Ok(found
        .remove(product_id)
        .map(|attributes| ProductSummary {
            product_id: product_id.clone(),
            attributes,
        }))
}
