//! Crumb cart library.
//!
//! Keeps one shopping cart consistent across three tiers: the in-memory
//! cart owned by the [`reconciler::CartReconciler`], a device-local replica
//! ([`local`]) for anonymous shoppers and a per-user remote replica
//! ([`remote`]) once the shopper signs in. UI code only ever talks to the
//! [`facade::CartFacade`].
//!
//! # Architecture
//!
//! - [`cart`] - Pure cart model (uniqueness, positive quantities, merge rule)
//! - [`local`] - Key-value storage port and the local cart replica
//! - [`remote`] - Per-user remote store port, in-memory and Postgres adapters
//! - [`catalog`] - Batch product lookup port, HTTP and static adapters
//! - [`enrichment`] - Builds the display cart from the minimal cart
//! - [`reconciler`] - Identity state machine, merge-on-sign-in, write-through
//! - [`facade`] - Serialized mutation entry point and published snapshots
//! - [`config`] - Environment configuration
//! - [`error`] - Cart error taxonomy and mutation outcomes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod facade;
pub mod local;
pub mod reconciler;
pub mod remote;

pub use cart::Cart;
pub use error::{CartError, MutationOutcome, StoreKind};
pub use facade::{CartDependencies, CartFacade};
