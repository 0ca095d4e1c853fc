//! Handover Core - Shared domain types.
//!
//! This crate provides the types shared by all Handover components:
//! - `server` - Delivery fulfillment API (identity, authorization, lifecycle)
//! - `cli` - Command-line tools for migrations and principal management
//!
//! # Architecture
//!
//! The core crate contains only types and pure validation - no I/O, no database
//! access, no HTTP. Database encoding is opt-in through the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, roles, statuses, quantities and link tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
