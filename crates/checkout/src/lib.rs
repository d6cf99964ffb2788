//! Verdant Checkout - the storefront order pipeline.
//!
//! This crate turns a shopping cart into a priced, fulfillment-assigned,
//! paid order. It owns the subtle parts of the storefront: reconciling a
//! device-local cart with the remotely persisted one, picking the single
//! best discount under a non-stacking rule, nexus-based tax, per-item
//! fulfillment constraints, carrier rate selection, pre-commit stock
//! validation, and the two-phase create-order / authorize-payment /
//! finalize commit that must stay idempotent across retries.
//!
//! There is no HTTP server here; the host storefront binary mounts a
//! [`context::CheckoutContext`] and drives [`submit::submit`] from its own
//! request handlers.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod context;
pub mod discount;
pub mod error;
pub mod fulfillment;
pub mod models;
pub mod pickup;
pub mod services;
pub mod session;
pub mod shipping;
pub mod stock;
pub mod submit;
pub mod tax;
