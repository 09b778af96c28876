//! Crumb Core - Shared types library.
//!
//! This crate provides the types shared by all Crumb components:
//! - `cart` - Cart state reconciliation across local and remote stores
//! - `cli` - Terminal host for the cart and remote-store migrations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, quantities, prices, cart lines and identity

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
