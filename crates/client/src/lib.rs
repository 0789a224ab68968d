//! Matty's Media storefront client library.
//!
//! This crate owns the storefront's cart state manager. The views (product
//! detail, cart, checkout) are thin consumers of the types exported here.
//!
//! # Architecture
//!
//! - [`cart`] - The cart store, its observers, and its durable mirror
//! - [`storage`] - Synchronous key-value surface (file-backed or in-memory)
//! - [`reconcile`] - One-shot merge of the local cart with the server cart at login
//! - [`services`] - HTTP API client, auth session, and checkout
//! - [`telemetry`] - Side channel for I/O failures (tracing + Sentry)
//! - [`state`] - The [`StorefrontContext`](state::StorefrontContext) built once at startup

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod services;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use cart::{CartStore, TotalsView, WriteThrough};
pub use config::ClientConfig;
pub use state::StorefrontContext;
