//! Magic link registry.
//!
//! A magic link is the only way a driver establishes a session. The token is
//! stored on the driver principal, is not consumed on use and never expires;
//! [`MagicLinkRegistry::rotate`] and [`MagicLinkRegistry::revoke`] are the
//! administrative controls over it.

use chrono::Utc;
use rand::Rng;
use tracing::instrument;

use handover_core::{MagicToken, PrincipalId};

use crate::db::{PrincipalStore, RepositoryError};
use crate::models::{NewPrincipal, Principal};

/// Attempts at generating a unique token before giving up.
const MAX_TOKEN_ATTEMPTS: usize = 5;

/// Width of the random part of a token (base36 digits of a `u128`).
const RANDOM_PART_WIDTH: usize = 25;

/// An issued magic link.
#[derive(Debug, Clone)]
pub struct MagicLink {
    pub token: MagicToken,
    pub url: String,
}

/// Issues and resolves driver magic links.
pub struct MagicLinkRegistry<'a> {
    principals: &'a dyn PrincipalStore,
    base_url: &'a str,
}

impl<'a> MagicLinkRegistry<'a> {
    /// Create a registry producing links under `base_url`.
    #[must_use]
    pub const fn new(principals: &'a dyn PrincipalStore, base_url: &'a str) -> Self {
        Self {
            principals,
            base_url,
        }
    }

    /// Generate and store a fresh token for `driver`.
    ///
    /// Any previous token stops resolving.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `driver` is not a driver, and
    /// `RepositoryError::Conflict` if no unique token could be generated.
    #[instrument(skip(self), fields(driver_id = %driver))]
    pub async fn register(&self, driver: PrincipalId) -> Result<MagicLink, RepositoryError> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = generate_token();
            match self.principals.set_magic_token(driver, Some(&token)).await {
                Ok(()) => {
                    tracing::info!("Magic link registered");
                    return Ok(self.link(token));
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(attempt, "Magic token collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RepositoryError::Conflict(
            "could not generate a unique magic token".to_owned(),
        ))
    }

    /// Create a driver already holding a fresh token, in a single write.
    ///
    /// Either the driver exists with a working link afterwards or nothing was
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no unique token could be
    /// generated, or the store's error.
    #[instrument(skip_all)]
    pub async fn enroll(
        &self,
        name: Option<String>,
        notes: Option<String>,
    ) -> Result<(Principal, MagicLink), RepositoryError> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = generate_token();
            let new = NewPrincipal::driver(name.clone(), notes.clone())
                .with_magic_token(token.clone());
            match self.principals.create(new).await {
                Ok(driver) => {
                    tracing::info!(driver_id = %driver.id, "Driver enrolled");
                    return Ok((driver, self.link(token)));
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(attempt, "Magic token collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RepositoryError::Conflict(
            "could not generate a unique magic token".to_owned(),
        ))
    }

    /// Resolve a token to the driver holding it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for malformed or unknown tokens.
    pub async fn resolve(&self, raw: &str) -> Result<Principal, RepositoryError> {
        let Ok(token) = MagicToken::parse(raw) else {
            return Err(RepositoryError::NotFound);
        };
        self.principals
            .find_driver_by_magic_token(&token)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Replace the driver's token, invalidating links already handed out.
    ///
    /// # Errors
    ///
    /// Same as [`MagicLinkRegistry::register`].
    pub async fn rotate(&self, driver: PrincipalId) -> Result<MagicLink, RepositoryError> {
        self.register(driver).await
    }

    /// Clear the driver's token; the driver can no longer sign in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `driver` is not a driver.
    #[instrument(skip(self), fields(driver_id = %driver))]
    pub async fn revoke(&self, driver: PrincipalId) -> Result<(), RepositoryError> {
        self.principals.set_magic_token(driver, None).await?;
        tracing::info!("Magic link revoked");
        Ok(())
    }

    /// The link URL for an existing token.
    #[must_use]
    pub fn link(&self, token: MagicToken) -> MagicLink {
        let url = link_url(self.base_url, &token);
        MagicLink { token, url }
    }
}

/// Build `{base_url}/magic-login/{token}`.
#[must_use]
pub fn link_url(base_url: &str, token: &MagicToken) -> String {
    format!(
        "{}/magic-login/{}",
        base_url.trim_end_matches('/'),
        token.expose()
    )
}

/// 128 random bits and the current time in milliseconds, both base36.
fn generate_token() -> MagicToken {
    let random: u128 = rand::rng().random();
    let millis = u128::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let raw = format!(
        "{:0>width$}-{}",
        to_base36(random),
        to_base36(millis),
        width = RANDOM_PART_WIDTH
    );
    // Alphabet and length are fixed, so parsing cannot fail.
    MagicToken::parse(&raw).unwrap_or_else(|_| unreachable!("generated token is well formed"))
}

#[allow(clippy::cast_possible_truncation)] // remainder is below 36
fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewPrincipal;

    const BASE: &str = "http://localhost:3000";

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_generated_tokens_are_distinct_and_valid() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.expose().len() > RANDOM_PART_WIDTH);
        assert_eq!(a.expose().as_bytes()[RANDOM_PART_WIDTH], b'-');
    }

    #[test]
    fn test_link_url_trims_slash() {
        let token = MagicToken::parse("abcdefghijklmnop-qr").unwrap();
        assert_eq!(
            link_url("https://d.example.com/", &token),
            "https://d.example.com/magic-login/abcdefghijklmnop-qr"
        );
    }

    #[tokio::test]
    async fn test_register_resolve_repeatedly() {
        let store = MemoryStore::new();
        let driver = PrincipalStore::create(&store, NewPrincipal::driver(Some("Dee".to_owned()), None))
            .await
            .unwrap();
        let registry = MagicLinkRegistry::new(&store, BASE);

        let link = registry.register(driver.id).await.unwrap();
        assert!(link.url.starts_with("http://localhost:3000/magic-login/"));

        // Tokens are not consumed.
        for _ in 0..2 {
            let found = registry.resolve(link.token.expose()).await.unwrap();
            assert_eq!(found.id, driver.id);
        }
    }

    #[tokio::test]
    async fn test_enroll_stores_driver_with_token() {
        let store = MemoryStore::new();
        let registry = MagicLinkRegistry::new(&store, BASE);

        let (driver, link) = registry.enroll(Some("Dee".to_owned()), None).await.unwrap();
        assert_eq!(driver.magic_token.as_ref(), Some(&link.token));
        assert_eq!(registry.resolve(link.token.expose()).await.unwrap().id, driver.id);
    }

    #[tokio::test]
    async fn test_rotate_and_revoke() {
        let store = MemoryStore::new();
        let driver = PrincipalStore::create(&store, NewPrincipal::driver(None, None))
            .await
            .unwrap();
        let registry = MagicLinkRegistry::new(&store, BASE);

        let old = registry.register(driver.id).await.unwrap();
        let new = registry.rotate(driver.id).await.unwrap();
        assert!(matches!(
            registry.resolve(old.token.expose()).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(registry.resolve(new.token.expose()).await.is_ok());

        registry.revoke(driver.id).await.unwrap();
        assert!(registry.resolve(new.token.expose()).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_unknown_or_malformed() {
        let store = MemoryStore::new();
        let registry = MagicLinkRegistry::new(&store, BASE);
        assert!(matches!(
            registry.resolve("0000000000000000000000000-abc").await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            registry.resolve("../../etc/passwd").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_register_unknown_driver() {
        let store = MemoryStore::new();
        let registry = MagicLinkRegistry::new(&store, BASE);
        assert!(matches!(
            registry.register(PrincipalId::generate()).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
