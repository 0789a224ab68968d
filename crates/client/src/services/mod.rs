//! Backend-facing services.
//!
//! - [`api`] - HTTP client for the storefront backend
//! - [`auth`] - Session credential and auth-success events
//! - [`checkout`] - WhatsApp checkout hand-off

pub mod api;
pub mod auth;
pub mod checkout;
