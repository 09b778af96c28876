//! Core types for Crumb.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod identity;
pub mod id;
pub mod line;
pub mod price;
pub mod quantity;

pub use identity::Identity;
pub use id::*;
pub use line::{DisplayAttributes, DisplayCartLine, MinimalCartLine, ProductSummary};
pub use price::{CurrencyCode, Price};
pub use quantity::{Quantity, QuantityError};
