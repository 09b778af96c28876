//! Cart line quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Cart lines never hold a zero quantity; zero means "remove the line".
    #[error("quantity must be at least 1")]
    Zero,
    /// Adding to an existing line would overflow.
    #[error("quantity overflow")]
    Overflow,
}

/// A strictly positive item count for a cart line.
///
/// Deserializing `0` fails, so persisted carts with zero-quantity lines are
/// rejected at the parse step rather than loaded.
///
/// ## Examples
///
/// ```
/// use crumb_core::Quantity;
///
/// assert!(Quantity::new(0).is_err());
/// assert_eq!(Quantity::new(3).unwrap().get(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// The largest representable quantity.
    pub const MAX: Self = Self(NonZeroU32::MAX);

    /// Create a quantity from a raw count.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Zero` if `count` is 0.
    pub fn new(count: u32) -> Result<Self, QuantityError> {
        NonZeroU32::new(count).map(Self).ok_or(QuantityError::Zero)
    }

    /// Get the raw count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Add another quantity, clamping at [`Quantity::MAX`].
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.get()))
    }

    /// Add another quantity to this one.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Overflow` if the sum exceeds `u32::MAX`.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        self.0
            .checked_add(other.get())
            .map(Self)
            .ok_or(QuantityError::Overflow)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}
