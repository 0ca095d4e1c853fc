//! Handover server library.
//!
//! Identity, authorization and lifecycle core for a delivery fulfillment
//! service: admins create deliveries from invoices and assign them to
//! drivers; drivers sign in through magic links and confirm deliveries with
//! item quantities, a signature and an optional photo.
//!
//! The library exposes the router and state so the binary, the CLI and the
//! integration tests share one composition.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
