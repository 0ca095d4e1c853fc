//! Domain models for the fulfillment server.
//!
//! These are validated domain objects; database row types live next to the
//! queries in [`crate::db`].

pub mod delivery;
pub mod principal;

pub use delivery::{
    Completion, Delivery, DeliveryFilter, DeliveryItem, ItemDelivered, NewDelivery,
    NewDeliveryItem,
};
pub use principal::{NewPrincipal, Principal, Profile};
