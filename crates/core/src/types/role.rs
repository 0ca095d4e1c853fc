//! Principal roles.

use serde::{Deserialize, Serialize};

/// Role of a principal.
///
/// Roles are totally ordered `Driver < Admin`. A role satisfies a requirement
/// when it is at least the required role, so an admin passes every
/// driver-gated check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "principal_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Delivers goods; sees only deliveries assigned to them.
    Driver,
    /// Operator with full access.
    Admin,
}

impl Role {
    /// Returns true if this role meets `required`.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }

    /// Returns the role name as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
