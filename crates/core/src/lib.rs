//! Matty's Media Core - Cart data model and merge rules.
//!
//! This crate provides the types shared by every Matty's Media component:
//! - `client` - Cart state manager (store, persistence, reconciliation)
//! - `cli` - Command-line storefront client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage
//! access, no HTTP clients. Anything that touches the disk or the network
//! lives in `mattys-media-client`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, and quantities
//! - [`cart`] - Cart lines, the identity rule, totals, and login-time merging

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::*;
pub use types::*;
