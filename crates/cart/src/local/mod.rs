//! Device-local cart replica.
//!
//! The local replica is a single key in a key-value store (browser
//! `localStorage` in the web host, a JSON file in the CLI host) holding the
//! cart as a JSON array of [`MinimalCartLine`]. Durability is best effort:
//! a failed read is an empty cart, a failed write is a warning.
//!
//! # Storage format
//!
//! ```json
//! [{"productId":"cookie-1","variantId":"cookie-1-dozen","quantity":2}]
//! ```
//!
//! Anything else under the key (wrong shape, extra fields, zero quantity,
//! repeated product id) is treated as corrupt and read as an empty cart.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use crumb_core::MinimalCartLine;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::error::{CartError, StoreKind};

/// Default storage key for the cart.
pub const DEFAULT_CART_KEY: &str = "localCart";

/// Errors raised by key-value storage adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing data could not be parsed.
    #[error("corrupt storage: {0}")]
    Corrupt(String),

    /// Storage refused the operation (quota, private mode, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// String key-value storage scoped to one device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read a value. `Ok(None)` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Why a persisted cart was rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid cart JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("product {0} appears more than once")]
    DuplicateProduct(String),
}

/// Parse a persisted cart, validating shape and line invariants.
///
/// # Errors
///
/// Returns `DecodeError` if the JSON does not match the line schema or a
/// product id repeats.
pub fn decode_lines(raw: &str) -> Result<Vec<MinimalCartLine>, DecodeError> {
    let lines: Vec<MinimalCartLine> = serde_json::from_str(raw)?;

    let mut seen = HashSet::with_capacity(lines.len());
    for line in &lines {
        if !seen.insert(&line.product_id) {
            return Err(DecodeError::DuplicateProduct(line.product_id.to_string()));
        }
    }

    Ok(lines)
}

/// Serialize lines in the persisted format.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn encode_lines(lines: &[MinimalCartLine]) -> Result<String, serde_json::Error> {
    serde_json::to_string(lines)
}

/// The cart replica stored under one key of a [`KeyValueStorage`].
#[derive(Clone)]
pub struct LocalCartStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl LocalCartStore {
    /// Create a store over `storage`, using `key` for the cart.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    /// Read the persisted cart.
    ///
    /// Never fails: absent, unreadable or invalid data is logged and read as
    /// an empty cart.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn read(&self) -> Vec<MinimalCartLine> {
        let raw = match self.storage.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No local cart stored");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read local cart, starting empty");
                return Vec::new();
            }
        };

        match decode_lines(&raw) {
            Ok(lines) => {
                debug!(lines = lines.len(), "Loaded local cart");
                lines
            }
            Err(e) => {
                warn!(error = %e, "Discarding invalid local cart");
                Vec::new()
            }
        }
    }

    /// Replace the persisted cart with `lines`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::PersistenceWriteFailed` if the storage write fails.
    #[instrument(skip(self, lines), fields(key = %self.key, lines = lines.len()))]
    pub async fn write(&self, lines: &[MinimalCartLine]) -> Result<(), CartError> {
        let encoded =
            encode_lines(lines).map_err(|e| CartError::write_failed(StoreKind::Local, &e))?;

        self.storage
            .set(&self.key, &encoded)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write local cart");
                CartError::write_failed(StoreKind::Local, &e)
            })
    }

    /// Remove the persisted cart entirely.
    ///
    /// # Errors
    ///
    /// Returns `CartError::PersistenceWriteFailed` if the storage delete fails.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.storage.remove(&self.key).await.map_err(|e| {
            warn!(error = %e, "Failed to clear local cart");
            CartError::write_failed(StoreKind::Local, &e)
        })
    }
}
