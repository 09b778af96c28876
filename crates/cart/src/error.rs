//! Cart error taxonomy.
//!
//! Nothing in this crate is fatal to the host: reads degrade to an empty
//! cart, writes are reported as warnings after the in-memory update has
//! already happened, and lookups degrade per line. [`CartError`] is the
//! warning currency; it is `Clone` so it can go out on the facade's
//! broadcast channel as well as in the [`MutationOutcome`].

use core::fmt;

use crumb_core::ProductId;
use thiserror::Error;

/// Which replica an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Device-local storage.
    Local,
    /// Per-user remote store.
    Remote,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Errors surfaced by the cart core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// A local or remote write did not complete.
    #[error("{store} cart write failed: {message}")]
    PersistenceWriteFailed { store: StoreKind, message: String },

    /// A local or remote read failed; treated as "no prior cart".
    #[error("{store} cart read failed: {message}")]
    PersistenceReadFailed { store: StoreKind, message: String },

    /// Some products could not be enriched for display.
    #[error("could not resolve {} product(s): {message}", .product_ids.len())]
    ResolutionFailed {
        product_ids: Vec<ProductId>,
        message: String,
    },

    /// A remote operation was attempted without a signed-in user.
    #[error("remote cart accessed without a signed-in user")]
    NotAuthenticated,
}

impl CartError {
    /// Build a write failure from any displayable cause.
    pub fn write_failed(store: StoreKind, cause: &impl fmt::Display) -> Self {
        Self::PersistenceWriteFailed {
            store,
            message: cause.to_string(),
        }
    }

    /// Build a read failure from any displayable cause.
    pub fn read_failed(store: StoreKind, cause: &impl fmt::Display) -> Self {
        Self::PersistenceReadFailed {
            store,
            message: cause.to_string(),
        }
    }

    /// Whether this is a failed persistence write (the "may not have saved" case).
    #[must_use]
    pub const fn is_write_failure(&self) -> bool {
        matches!(self, Self::PersistenceWriteFailed { .. })
    }
}

/// Result of a facade operation.
///
/// Completion means the UI-visible state is updated. Warnings describe
/// persistence or lookup problems that did not block the update; the
/// in-memory change is never rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct MutationOutcome {
    pub warnings: Vec<CartError>,
}

impl MutationOutcome {
    /// An outcome with the given warnings.
    pub const fn with_warnings(warnings: Vec<CartError>) -> Self {
        Self { warnings }
    }

    /// No warnings were raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// At least one write may not have been saved.
    #[must_use]
    pub fn has_write_failure(&self) -> bool {
        self.warnings.iter().any(CartError::is_write_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::write_failed(StoreKind::Remote, &"connection reset");
        assert_eq!(err.to_string(), "remote cart write failed: connection reset");

        let err = CartError::ResolutionFailed {
            product_ids: vec![ProductId::new("a"), ProductId::new("b")],
            message: "not in catalog".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not resolve 2 product(s): not in catalog"
        );
    }

    #[test]
    fn test_outcome_write_failure_detection() {
        let outcome = MutationOutcome::with_warnings(vec![CartError::ResolutionFailed {
            product_ids: vec![],
            message: "offline".to_string(),
        }]);
        assert!(!outcome.is_clean());
        assert!(!outcome.has_write_failure());

        let outcome = MutationOutcome::with_warnings(vec![CartError::write_failed(
            StoreKind::Local,
            &"disk full",
        )]);
        assert!(outcome.has_write_failure());
    }
}
