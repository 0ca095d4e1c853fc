//! Principal domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use handover_core::{Email, MagicToken, PrincipalId, Role};

/// An authenticated identity (admin or driver).
#[derive(Debug, Clone)]
pub struct Principal {
    /// Unique principal ID.
    pub id: PrincipalId,
    /// Role, immutable after creation.
    pub role: Role,
    /// Login email (admins only).
    pub email: Option<Email>,
    /// Display name.
    pub name: Option<String>,
    /// Free text notes, e.g. vehicle plates.
    pub notes: Option<String>,
    /// Bootstrap token of the driver's magic link.
    pub magic_token: Option<MagicToken>,
    /// When the principal was created.
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Returns true if this principal is a driver.
    #[must_use]
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    /// The profile shown to the principal itself and to admins.
    #[must_use]
    pub fn profile(&self) -> Profile {
        match self.role {
            Role::Admin => Profile::Admin {
                id: self.id,
                role: self.role,
                email: self.email.clone(),
                name: self.name.clone(),
            },
            Role::Driver => Profile::Driver {
                id: self.id,
                role: self.role,
                name: self.name.clone(),
                notes: self.notes.clone(),
            },
        }
    }
}

/// Public view of a principal. Admins expose their email, drivers their notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Admin {
        id: PrincipalId,
        role: Role,
        email: Option<Email>,
        name: Option<String>,
    },
    Driver {
        id: PrincipalId,
        role: Role,
        name: Option<String>,
        notes: Option<String>,
    },
}

/// Parameters for creating a principal.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub role: Role,
    pub email: Option<Email>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub magic_token: Option<MagicToken>,
}

impl NewPrincipal {
    /// An admin identified by `email`.
    #[must_use]
    pub const fn admin(email: Email, name: Option<String>) -> Self {
        Self {
            role: Role::Admin,
            email: Some(email),
            name,
            notes: None,
            magic_token: None,
        }
    }

    /// A driver without a magic link.
    #[must_use]
    pub const fn driver(name: Option<String>, notes: Option<String>) -> Self {
        Self {
            role: Role::Driver,
            email: None,
            name,
            notes,
            magic_token: None,
        }
    }

    /// Attach a magic link token.
    #[must_use]
    pub fn with_magic_token(mut self, token: MagicToken) -> Self {
        self.magic_token = Some(token);
        self
    }
}
