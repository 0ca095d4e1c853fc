//! Business logic services.
//!
//! # Services
//!
//! - `credentials` - Signed session credentials and secret comparison
//! - `magic_link` - Driver magic link issue, resolve, rotate and revoke
//! - `guard` - Authorization decisions
//! - `lifecycle` - Delivery creation, assignment and confirmation
//! - `directory` - Driver management and profiles
//! - `bootstrap` - Admin bootstrap and demo seeding

pub mod bootstrap;
pub mod credentials;
pub mod directory;
mod error;
pub mod guard;
pub mod lifecycle;
pub mod magic_link;

pub use bootstrap::{BootstrapService, DemoSeed};
pub use credentials::{Claims, CredentialError, CredentialIssuer, secrets_match};
pub use directory::{CreatedDriver, DirectoryService, DriverListing};
pub use error::ServiceError;
pub use guard::{Denial, Requirement, Scope, authorize, scope_list};
pub use lifecycle::{
    ConfirmDelivery, DeliveryDetail, DeliveryDraft, DeliveryService, DraftItem, ItemReport,
    ItemReports, Upload,
};
pub use magic_link::{MagicLink, MagicLinkRegistry};
