//! Session credential issuing and verification.
//!
//! Credentials are HS256 JSON Web Tokens carrying the principal ID and role.
//! They are self-contained: verification needs only the signing secret, and a
//! credential stays valid until it expires.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use handover_core::{PrincipalId, Role};

type HmacSha256 = Hmac<Sha256>;

/// Validity window of an issued credential, in seconds (7 days).
pub const CREDENTIAL_VALIDITY_SECS: i64 = 7 * 24 * 60 * 60;

/// Errors from the credential issuer.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Signature mismatch, malformed token or expired.
    #[error("invalid credential")]
    Invalid,

    /// The token could not be signed.
    #[error("failed to sign credential: {0}")]
    Signing(String),
}

/// Claims carried by a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal ID.
    pub sub: PrincipalId,
    /// Role at issue time.
    pub role: Role,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Mints and verifies session credentials with a symmetric key.
#[derive(Clone)]
pub struct CredentialIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl CredentialIssuer {
    /// Create an issuer signing with `secret`.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            validity: Duration::seconds(CREDENTIAL_VALIDITY_SECS),
        }
    }

    /// Override the validity window.
    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Issue a credential for a principal.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Signing` if encoding fails.
    pub fn issue(&self, principal: PrincipalId, role: Role) -> Result<String, CredentialError> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal,
            role,
            iat: now.timestamp(),
            exp: (now + self.validity).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    /// Verify a credential and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Invalid` for any signature, structure or
    /// expiry failure.
    pub fn verify(&self, token: &str) -> Result<Claims, CredentialError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Credential rejected");
                CredentialError::Invalid
            })
    }
}

/// Compare a submitted secret with the expected one in constant time.
///
/// Both values are tagged with HMAC-SHA256 under `key` and the tags compared
/// with `verify_slice`.
#[must_use]
pub fn secrets_match(key: &SecretString, submitted: &str, expected: &SecretString) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(expected.expose_secret().as_bytes());
    let expected_tag = mac.finalize().into_bytes();

    let Ok(mut mac) = HmacSha256::new_from_slice(key.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(submitted.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(&SecretString::from("q8T#vL2m!Xr9$Kp4@Wn7&Zc1^Hd6*Bf3"))
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = issuer();
        let id = PrincipalId::generate();
        let token = issuer.issue(id, Role::Driver).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Driver);
        assert_eq!(claims.exp - claims.iat, CREDENTIAL_VALIDITY_SECS);
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let token = issuer().issue(PrincipalId::generate(), Role::Admin).unwrap();
        let other = CredentialIssuer::new(&SecretString::from("another-signing-key-0123456789ab"));
        assert!(matches!(other.verify(&token), Err(CredentialError::Invalid)));
    }

    #[test]
    fn test_verify_rejects_tampered_and_malformed() {
        let issuer = issuer();
        let token = issuer.issue(PrincipalId::generate(), Role::Driver).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_claims = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            br#"{"sub":"00000000-0000-0000-0000-000000000000","role":"admin","iat":0,"exp":9999999999}"#,
        );
        parts[1] = &forged_claims;
        assert!(issuer.verify(&parts.join(".")).is_err());
        assert!(issuer.verify("not-a-token").is_err());
        assert!(issuer.verify("").is_err());
    }

    #[test]
    fn test_verify_rejects_expired() {
        let issuer = issuer().with_validity(Duration::seconds(-10));
        let token = issuer.issue(PrincipalId::generate(), Role::Driver).unwrap();
        assert!(matches!(issuer.verify(&token), Err(CredentialError::Invalid)));
    }

    #[test]
    fn test_secrets_match() {
        let key = SecretString::from("k".repeat(32));
        let expected = SecretString::from("correct horse");
        assert!(secrets_match(&key, "correct horse", &expected));
        assert!(!secrets_match(&key, "correct horse ", &expected));
        assert!(!secrets_match(&key, "", &expected));
    }
}
