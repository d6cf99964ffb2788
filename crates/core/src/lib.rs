//! Verdant Core - Shared types library.
//!
//! This crate provides common types used across all Verdant components:
//! - `checkout` - Cart reconciliation and order submission pipeline
//! - the host storefront binary that mounts the checkout pipeline
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
