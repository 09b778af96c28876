//! HTTP catalog client.
//!
//! Calls the storefront's batch item endpoint:
//!
//! ```text
//! GET {endpoint}?objectIds=cookie-1,cookie-2
//! ```
//!
//! ```json
//! {"items":[{"id":"cookie-1","variationId":"v1","name":"Chocolate Chip",
//!            "price":"3.50","imageUrl":"https://...","description":"..."}]}
//! ```
//!
//! Attributes are cached per product using `moka`, so a refresh only asks
//! the endpoint for products it has not seen within the TTL.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crumb_core::{CurrencyCode, DisplayAttributes, Price, ProductId, VariantId};
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CatalogError, CatalogLookup};

/// Catalog response envelope.
#[derive(Debug, Deserialize)]
struct ItemsResponse {
    items: Vec<CatalogItem>,
}

/// One catalog item as served by the endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogItem {
    id: ProductId,
    #[serde(default)]
    variation_id: Option<VariantId>,
    name: String,
    /// Major currency units (dollars).
    price: Decimal,
    #[serde(default)]
    currency: CurrencyCode,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    description: String,
}

impl CatalogItem {
    fn into_entry(self) -> (ProductId, DisplayAttributes) {
        // Items without an explicit variation sell under their own id.
        let variant_id = self
            .variation_id
            .unwrap_or_else(|| VariantId::new(self.id.as_str()));
        let attributes = DisplayAttributes {
            name: self.name,
            unit_price: Price::new(self.price, self.currency),
            image_url: self.image_url,
            description: self.description,
            variant_id,
        };
        (self.id, attributes)
    }
}

/// Parse a batch response body.
fn parse_items(body: &str) -> Result<HashMap<ProductId, DisplayAttributes>, CatalogError> {
    let response: ItemsResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .map(CatalogItem::into_entry)
        .collect())
}

/// Build the batch URL for a set of ids.
fn batch_url(endpoint: &Url, product_ids: &BTreeSet<&ProductId>) -> Url {
    let joined = product_ids
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("objectIds", &joined);
    url
}

/// Catalog client for the batch item endpoint.
#[derive(Clone)]
pub struct HttpCatalog {
    inner: Arc<HttpCatalogInner>,
}

struct HttpCatalogInner {
    client: reqwest::Client,
    endpoint: Url,
    cache: Cache<ProductId, DisplayAttributes>,
}

impl HttpCatalog {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(endpoint: Url, cache_ttl: Duration, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpCatalogInner {
                client,
                endpoint,
                cache,
            }),
        })
    }

    async fn fetch(
        &self,
        product_ids: &BTreeSet<&ProductId>,
    ) -> Result<HashMap<ProductId, DisplayAttributes>, CatalogError> {
        let url = batch_url(&self.inner.endpoint, product_ids);
        let response = self.inner.client.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Catalog returned non-success status"
            );
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        parse_items(&body)
    }
}

#[async_trait]
impl CatalogLookup for HttpCatalog {
    #[instrument(skip(self, product_ids), fields(requested = product_ids.len()))]
    async fn resolve(
        &self,
        product_ids: &BTreeSet<ProductId>,
    ) -> Result<HashMap<ProductId, DisplayAttributes>, CatalogError> {
        let mut resolved = HashMap::with_capacity(product_ids.len());
        let mut misses = BTreeSet::new();

        for id in product_ids {
            match self.inner.cache.get(id).await {
                Some(attributes) => {
                    resolved.insert(id.clone(), attributes);
                }
                None => {
                    misses.insert(id);
                }
            }
        }

        if misses.is_empty() {
            debug!("Cache hit for every product");
            return Ok(resolved);
        }

        let fetched = self.fetch(&misses).await?;
        debug!(fetched = fetched.len(), missed = misses.len(), "Catalog batch fetched");

        for (id, attributes) in fetched {
            // Only keep what was asked for; the endpoint may return extras.
            if product_ids.contains(&id) {
                self.inner.cache.insert(id.clone(), attributes.clone()).await;
                resolved.insert(id, attributes);
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    use super::*;

    const MENU_BODY: &str = r#"{"items":[
        {"id":"cookie-1","variationId":"v1","name":"Chocolate Chip","price":"3.50"},
        {"id":"cookie-2","name":"Snickerdoodle","price":"3.25"},
        {"id":"cookie-9","name":"Seasonal","price":"4.00"}
    ]}"#;

    /// Answer every request with `status` and `body`, recording request targets.
    async fn serve(status: &'static str, body: &'static str) -> (Url, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0; 8192];
                let n = socket.read(&mut buf).await.unwrap();
                buf.truncate(n);
                let head = String::from_utf8_lossy(&buf);
                let target = head.split_whitespace().nth(1).unwrap_or_default();
                seen.lock().await.push(target.to_string());

                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        let endpoint = Url::parse(&format!("http://{addr}/items")).unwrap();
        (endpoint, requests)
    }

    fn client(endpoint: Url) -> HttpCatalog {
        HttpCatalog::new(endpoint, Duration::from_secs(60), Duration::from_secs(5)).unwrap()
    }

    fn ids(ids: &[&str]) -> BTreeSet<ProductId> {
        ids.iter().map(|id| ProductId::new(*id)).collect()
    }

    #[test]
    fn test_batch_url_joins_ids() {
        let endpoint = Url::parse("https://shop.example/api/get-item").unwrap();
        let a = ProductId::new("cookie-1");
        let b = ProductId::new("cookie-2");
        let url = batch_url(&endpoint, &BTreeSet::from([&b, &a]));

        assert_eq!(
            url.as_str(),
            "https://shop.example/api/get-item?objectIds=cookie-1%2Ccookie-2"
        );
    }

    #[test]
    fn test_parse_items() {
        let body = r#"{"items":[
            {"id":"cookie-1","variationId":"v1","name":"Chocolate Chip","price":"3.50",
             "imageUrl":"https://img/cc.png","description":"Classic"},
            {"id":"cookie-2","name":"Oatmeal","price":3}
        ]}"#;

        let items = parse_items(body).unwrap();
        let cc = &items[&ProductId::new("cookie-1")];
        assert_eq!(cc.variant_id.as_str(), "v1");
        assert_eq!(cc.unit_price.display(), "$3.50");

        let oat = &items[&ProductId::new("cookie-2")];
        assert_eq!(oat.variant_id.as_str(), "cookie-2");
        assert!(oat.image_url.is_empty());
    }

    #[test]
    fn test_parse_items_rejects_bad_shape() {
        assert!(matches!(
            parse_items(r#"{"message":"This endpoint is temporarily disabled."}"#),
            Err(CatalogError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_drops_items_that_were_not_requested() {
        let (endpoint, requests) = serve("200 OK", MENU_BODY).await;
        let catalog = client(endpoint);

        let resolved = catalog
            .resolve(&ids(&["cookie-1", "cookie-2"]))
            .await
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[&ProductId::new("cookie-1")].name, "Chocolate Chip");
        assert!(!resolved.contains_key(&ProductId::new("cookie-9")));
        assert_eq!(
            *requests.lock().await,
            ["/items?objectIds=cookie-1%2Ccookie-2"]
        );

        // The extra item was not cached either.
        catalog.resolve(&ids(&["cookie-9"])).await.unwrap();
        assert_eq!(requests.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_only_fetches_cache_misses() {
        let (endpoint, requests) = serve("200 OK", MENU_BODY).await;
        let catalog = client(endpoint);

        catalog.resolve(&ids(&["cookie-1"])).await.unwrap();

        // Fully cached: no request.
        let resolved = catalog.resolve(&ids(&["cookie-1"])).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(requests.lock().await.len(), 1);

        // Mixed: only the miss goes over the wire; cookie-3 is unknown.
        let resolved = catalog
            .resolve(&ids(&["cookie-1", "cookie-2", "cookie-3"]))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.contains_key(&ProductId::new("cookie-1")));
        assert!(resolved.contains_key(&ProductId::new("cookie-2")));
        assert_eq!(
            requests.lock().await.last().map(String::as_str),
            Some("/items?objectIds=cookie-2%2Ccookie-3")
        );
    }

    #[tokio::test]
    async fn test_resolve_reports_error_status() {
        let (endpoint, _) = serve("503 Service Unavailable", r#"{"message":"down"}"#).await;
        let catalog = client(endpoint);

        let err = catalog.resolve(&ids(&["cookie-1"])).await.unwrap_err();
        assert!(matches!(err, CatalogError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_resolve_empty_set_skips_network() {
        // Unroutable endpoint: any request would fail.
        let catalog = HttpCatalog::new(
            Url::parse("http://127.0.0.1:9/items").unwrap(),
            Duration::from_secs(60),
            Duration::from_millis(100),
        )
        .unwrap();

        let resolved = catalog.resolve(&BTreeSet::new()).await.unwrap();
        assert!(resolved.is_empty());
    }
}
