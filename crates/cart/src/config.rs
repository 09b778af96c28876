//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Catalog (one of)
//! - `CRUMB_CATALOG_URL` - Batch item endpoint of the storefront catalog
//! - `CRUMB_CATALOG_FILE` - YAML catalog, used when no URL is set
//!
//! ## Optional
//! - `CRUMB_LOCAL_STORE_PATH` - Device-local storage file (default: .crumb/local-storage.json)
//! - `CRUMB_LOCAL_CART_KEY` - Storage key of the cart (default: localCart)
//! - `CRUMB_DATABASE_URL` - `PostgreSQL` connection string for the remote store
//!   (falls back to `DATABASE_URL`)
//! - `CRUMB_CATALOG_CACHE_TTL_SECS` - Catalog attribute cache TTL (default: 300)
//! - `CRUMB_CATALOG_TIMEOUT_SECS` - Catalog request timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::local::DEFAULT_CART_KEY;

const DEFAULT_LOCAL_STORE_PATH: &str = ".crumb/local-storage.json";
const DEFAULT_CACHE_TTL_SECS: &str = "300";
const DEFAULT_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("No catalog configured: set CRUMB_CATALOG_URL or CRUMB_CATALOG_FILE")]
    MissingCatalogSource,
}

/// Cart host configuration.
#[derive(Clone)]
pub struct CartConfig {
    /// File backing device-local storage
    pub local_store_path: PathBuf,
    /// Key the cart is stored under
    pub local_cart_key: String,
    /// `PostgreSQL` URL of the remote store (contains password)
    pub database_url: Option<SecretString>,
    /// Where product attributes come from
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for CartConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartConfig")
            .field("local_store_path", &self.local_store_path)
            .field("local_cart_key", &self.local_cart_key)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("catalog", &self.catalog)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

/// Catalog source and client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub source: CatalogSource,
    /// How long resolved attributes are cached
    pub cache_ttl: Duration,
    /// HTTP request timeout
    pub timeout: Duration,
}

/// Where the catalog lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// Batch item endpoint.
    Http(Url),
    /// YAML file.
    File(PathBuf),
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is invalid or no catalog is
    /// configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let local_store_path =
            PathBuf::from(get_env_or_default(env, "CRUMB_LOCAL_STORE_PATH", DEFAULT_LOCAL_STORE_PATH));
        let local_cart_key = get_env_or_default(env, "CRUMB_LOCAL_CART_KEY", DEFAULT_CART_KEY);
        let database_url = get_database_url(env, "CRUMB_DATABASE_URL");
        let catalog = CatalogConfig::from_lookup(env)?;
        let sentry_dsn = env("SENTRY_DSN");

        Ok(Self {
            local_store_path,
            local_cart_key,
            database_url,
            catalog,
            sentry_dsn,
        })
    }

    /// The database URL, required for signed-in sessions and migrations.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no database URL is set.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CRUMB_DATABASE_URL".to_string()))
    }
}

/// Read only the remote store URL, for commands that need nothing else.
///
/// Calls `dotenvy::dotenv()` to load from `.env` file if present.
#[must_use]
pub fn database_url_from_env() -> Option<SecretString> {
    let _ = dotenvy::dotenv();
    get_database_url(&|key| std::env::var(key).ok(), "CRUMB_DATABASE_URL")
}

impl CatalogConfig {
    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let source = match (env("CRUMB_CATALOG_URL"), env("CRUMB_CATALOG_FILE")) {
            (Some(url), _) => CatalogSource::Http(Url::parse(&url).map_err(|e| {
                ConfigError::InvalidEnvVar("CRUMB_CATALOG_URL".to_string(), e.to_string())
            })?),
            (None, Some(path)) => CatalogSource::File(PathBuf::from(path)),
            (None, None) => return Err(ConfigError::MissingCatalogSource),
        };

        Ok(Self {
            source,
            cache_ttl: get_duration_secs(env, "CRUMB_CATALOG_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            timeout: get_duration_secs(env, "CRUMB_CATALOG_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(
    env: &dyn Fn(&str) -> Option<String>,
    primary_key: &str,
) -> Option<SecretString> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Get a whole number of seconds.
fn get_duration_secs(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    get_env_or_default(env, key, default)
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
