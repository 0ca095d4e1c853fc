//! Core types for Handover.
//!
//! This module provides type-safe wrappers for the delivery domain.

pub mod email;
pub mod id;
pub mod quantity;
pub mod role;
pub mod status;
pub mod token;

pub use email::{Email, EmailError};
pub use id::*;
pub use quantity::{Quantity, QuantityError};
pub use role::Role;
pub use status::DeliveryStatus;
pub use token::{MagicToken, MagicTokenError};
