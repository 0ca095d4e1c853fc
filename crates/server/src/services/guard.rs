//! Authorization decisions.
//!
//! A pure function over the verified caller, the operation's requirement and,
//! for delivery-scoped operations, the delivery's assigned driver. Rules are
//! evaluated in order and the first match decides:
//!
//! 1. No verified caller: `Unauthenticated`.
//! 2. The caller's role does not satisfy the required role: `Forbidden`.
//!    Admin satisfies every role requirement.
//! 3. Delivery-scoped and the caller is a driver not assigned to it:
//!    `Forbidden`.
//! 4. Otherwise permitted.

use thiserror::Error;

use handover_core::{PrincipalId, Role};

use super::credentials::Claims;
use crate::models::DeliveryFilter;

/// What an operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any verified principal.
    Authenticated,
    /// A principal whose role satisfies this role.
    Role(Role),
}

/// The resource an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Not tied to a single delivery.
    Unscoped,
    /// A delivery with this assigned driver.
    Delivery(Option<PrincipalId>),
}

/// Why an operation was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not your delivery")]
    NotAssigned,
}

/// Decide whether `caller` may perform an operation.
///
/// # Errors
///
/// Returns the [`Denial`] of the first rule that rejects the call.
pub fn authorize(
    caller: Option<&Claims>,
    requirement: Requirement,
    scope: Scope,
) -> Result<&Claims, Denial> {
    let caller = caller.ok_or(Denial::Unauthenticated)?;

    if let Requirement::Role(required) = requirement
        && !caller.role.satisfies(required)
    {
        return Err(Denial::Forbidden);
    }

    if let Scope::Delivery(assigned) = scope
        && caller.role == Role::Driver
        && assigned != Some(caller.sub)
    {
        return Err(Denial::NotAssigned);
    }

    Ok(caller)
}

/// Narrow a requested list filter to what `caller` may see.
///
/// Admins see everything. Drivers only see their own deliveries; the
/// requested filter is combined with that restriction, so asking for another
/// driver's deliveries yields `None` (an empty result).
#[must_use]
pub fn scope_list(caller: &Claims, requested: DeliveryFilter) -> Option<DeliveryFilter> {
    if caller.role.satisfies(Role::Admin) {
        return Some(requested);
    }
    match requested.driver_id {
        Some(other) if other != caller.sub => None,
        _ => Some(DeliveryFilter {
            driver_id: Some(caller.sub),
            ..requested
        }),
    }
}
