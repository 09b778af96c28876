//! Display enrichment.
//!
//! Turns the minimal cart into display lines with one batch catalog lookup
//! per refresh. Lookups degrade per line:
//!
//! - ids the catalog omits are hidden from the view (the minimal cart keeps
//!   them, so they come back once the catalog does)
//! - if the lookup fails outright, each line falls back to the attributes it
//!   was last shown with, and lines never shown before are hidden
//!
//! Both cases raise [`CartError::ResolutionFailed`].

use std::collections::HashMap;
use std::sync::Arc;

use crumb_core::{CurrencyCode, DisplayAttributes, DisplayCartLine, Price, ProductId};
use tracing::{debug, instrument, warn};

use crate::cart::Cart;
use crate::catalog::CatalogLookup;
use crate::error::CartError;

/// Result of enriching a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enriched {
    /// Display lines, in cart order. Unresolved lines are omitted.
    pub lines: Vec<DisplayCartLine>,
    /// Set when at least one line could not be freshly resolved.
    pub warning: Option<CartError>,
}

/// Builds display lines, remembering the last attributes seen per product.
pub struct DisplayEnricher {
    catalog: Arc<dyn CatalogLookup>,
    last_known: HashMap<ProductId, DisplayAttributes>,
}

impl DisplayEnricher {
    /// Create an enricher over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogLookup>) -> Self {
        Self {
            catalog,
            last_known: HashMap::new(),
        }
    }

    /// Record attributes the UI already has, e.g. from the product page the
    /// shopper added from.
    pub fn remember(&mut self, product_id: ProductId, attributes: DisplayAttributes) {
        self.last_known.insert(product_id, attributes);
    }

    /// Resolve every line of `cart` for display.
    #[instrument(skip_all, fields(lines = cart.len()))]
    pub async fn enrich(&mut self, cart: &Cart) -> Enriched {
        if cart.is_empty() {
            self.last_known.clear();
            return Enriched::default();
        }

        let product_ids = cart.product_ids();
        let enriched = match self.catalog.resolve(&product_ids).await {
            Ok(found) => {
                let missing: Vec<ProductId> = product_ids
                    .iter()
                    .filter(|id| !found.contains_key(*id))
                    .cloned()
                    .collect();

                // A product the catalog no longer lists must not reappear
                // from the fallback during a later outage.
                for id in &missing {
                    self.last_known.remove(id);
                }
                self.last_known.extend(found);

                let warning = if missing.is_empty() {
                    None
                } else {
                    warn!(missing = ?missing, "Catalog did not resolve every cart product");
                    Some(CartError::ResolutionFailed {
                        product_ids: missing,
                        message: "not found in catalog".to_string(),
                    })
                };

                Enriched {
                    lines: self.project(cart),
                    warning,
                }
            }
            Err(e) => {
                warn!(error = %e, "Catalog lookup failed, using last known attributes");
                Enriched {
                    lines: self.project(cart),
                    warning: Some(CartError::ResolutionFailed {
                        product_ids: product_ids.iter().cloned().collect(),
                        message: e.to_string(),
                    }),
                }
            }
        };

        self.last_known.retain(|id, _| product_ids.contains(id));
        debug!(shown = enriched.lines.len(), "Cart enriched");
        enriched
    }

    fn project(&self, cart: &Cart) -> Vec<DisplayCartLine> {
        cart.lines()
            .filter_map(|line| {
                self.last_known
                    .get(&line.product_id)
                    .map(|attributes| DisplayCartLine::from_parts(line, attributes))
            })
            .collect()
    }
}

/// Sum of line totals.
///
/// An empty cart totals zero USD. Lines are assumed to share one currency;
/// the first line's currency is used.
#[must_use]
pub fn subtotal(lines: &[DisplayCartLine]) -> Price {
    let currency = lines
        .first()
        .map_or(CurrencyCode::default(), |l| l.unit_price.currency_code);

    lines.iter().fold(Price::zero(currency), |acc, line| {
        acc.saturating_add(line.line_total())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crumb_core::{MinimalCartLine, Quantity, VariantId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::StaticCatalog;

    fn attributes(name: &str, cents: i64) -> DisplayAttributes {
        DisplayAttributes {
            name: name.to_string(),
            unit_price: Price::usd(Decimal::new(cents, 2)),
            image_url: String::new(),
            description: String::new(),
            variant_id: VariantId::new(format!("{name}-v")),
        }
    }

    fn line(product: &str, quantity: u32) -> MinimalCartLine {
        MinimalCartLine::new(
            ProductId::new(product),
            VariantId::new(format!("{product}-v")),
            Quantity::new(quantity).unwrap(),
        )
    }

    fn names(enriched: &Enriched) -> Vec<&str> {
        enriched.lines.iter().map(|l| l.name.as_str()).collect()
    }

    fn bakery() -> Arc<StaticCatalog> {
        Arc::new(
            StaticCatalog::new()
                .with_product(ProductId::new("a"), attributes("Almond", 300))
                .with_product(ProductId::new("b"), attributes("Brownie", 425)),
        )
    }

    #[tokio::test]
    async fn test_enrich_keeps_cart_order() {
        let mut enricher = DisplayEnricher::new(bakery());
        let cart = Cart::from_lines([line("b", 1), line("a", 2)]);

        let enriched = enricher.enrich(&cart).await;
        assert_eq!(names(&enriched), ["Brownie", "Almond"]);
        assert!(enriched.warning.is_none());
        assert_eq!(enriched.lines[1].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_empty_cart_skips_lookup() {
        let catalog = bakery();
        let mut enricher = DisplayEnricher::new(catalog.clone());

        let enriched = enricher.enrich(&Cart::new()).await;
        assert!(enriched.lines.is_empty());
        assert_eq!(catalog.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_is_hidden_with_warning() {
        let mut enricher = DisplayEnricher::new(bakery());
        let cart = Cart::from_lines([line("a", 1), line("ghost", 1)]);

        let enriched = enricher.enrich(&cart).await;
        assert_eq!(names(&enriched), ["Almond"]);
        assert_eq!(
            enriched.warning,
            Some(CartError::ResolutionFailed {
                product_ids: vec![ProductId::new("ghost")],
                message: "not found in catalog".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_outage_falls_back_to_last_known() {
        let catalog = bakery();
        let mut enricher = DisplayEnricher::new(catalog.clone());
        let cart = Cart::from_lines([line("a", 1)]);
        enricher.enrich(&cart).await;

        catalog.set_offline(true);
        let cart = Cart::from_lines([line("a", 1), line("b", 1)]);
        let enriched = enricher.enrich(&cart).await;

        // "a" was shown before, "b" never was.
        assert_eq!(names(&enriched), ["Almond"]);
        assert!(matches!(
            enriched.warning,
            Some(CartError::ResolutionFailed { ref product_ids, .. }) if product_ids.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_remembered_attributes_cover_outage() {
        let catalog = bakery();
        catalog.set_offline(true);
        let mut enricher = DisplayEnricher::new(catalog);
        enricher.remember(ProductId::new("b"), attributes("Brownie", 425));

        let enriched = enricher.enrich(&Cart::from_lines([line("b", 3)])).await;
        assert_eq!(names(&enriched), ["Brownie"]);
        assert!(enriched.warning.is_some());
    }

    #[tokio::test]
    async fn test_discontinued_product_not_resurrected_by_outage() {
        let catalog = bakery();
        let mut enricher = DisplayEnricher::new(catalog.clone());
        let cart = Cart::from_lines([line("a", 1)]);
        enricher.enrich(&cart).await;

        catalog.remove(&ProductId::new("a")).await;
        assert!(enricher.enrich(&cart).await.lines.is_empty());

        catalog.set_offline(true);
        assert!(enricher.enrich(&cart).await.lines.is_empty());
    }

    #[tokio::test]
    async fn test_subtotal() {
        let mut enricher = DisplayEnricher::new(bakery());
        let cart = Cart::from_lines([line("a", 2), line("b", 1)]);
        let enriched = enricher.enrich(&cart).await;

        assert_eq!(subtotal(&enriched.lines).display(), "$10.25");
        assert_eq!(subtotal(&[]).display(), "$0.00");
    }

    #[test]
    fn test_subtotal_saturates_on_huge_lines() {
        let mut attrs = attributes("Wedding Cake", 100);
        attrs.unit_price = Price::usd(Decimal::MAX);
        let huge = DisplayCartLine::from_parts(&line("a", u32::MAX), &attrs);

        let total = subtotal(&[huge.clone(), huge]);
        assert_eq!(total.amount, Decimal::MAX);
    }
}
