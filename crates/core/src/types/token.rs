//! Magic link token type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`MagicToken`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MagicTokenError {
    /// The token length is outside the accepted range.
    #[error("magic token must be between {min} and {max} characters")]
    Length {
        /// Minimum length.
        min: usize,
        /// Maximum length.
        max: usize,
    },
    /// The token contains a character outside `[0-9a-z-]`.
    #[error("magic token contains invalid characters")]
    InvalidCharacter,
}

/// A driver's magic link secret.
///
/// The token is the only credential-bootstrap secret of a driver. It is
/// URL-safe (`[0-9a-z-]`) so it can be embedded directly in a link path.
/// `Debug` is redacted; use [`MagicToken::expose`] when the raw value is needed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MagicToken(String);

impl MagicToken {
    /// Minimum accepted length.
    pub const MIN_LENGTH: usize = 16;
    /// Maximum accepted length.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a token received from a link.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is out of range or a character is not
    /// lowercase alphanumeric or `-`.
    pub fn parse(s: &str) -> Result<Self, MagicTokenError> {
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) {
            return Err(MagicTokenError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase() || b == b'-')
        {
            return Err(MagicTokenError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MagicToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MagicToken([REDACTED])")
    }
}

impl std::str::FromStr for MagicToken {
    type Err = MagicTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for MagicToken {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for MagicToken {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for MagicToken {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(MagicToken::parse("k3j9x0a1b2c3d4e5f6-lr8xq2p1").is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            MagicToken::parse("short"),
            Err(MagicTokenError::Length { .. })
        ));
        assert_eq!(
            MagicToken::parse("ABCDEFGHIJKLMNOPQRST"),
            Err(MagicTokenError::InvalidCharacter)
        );
        assert_eq!(
            MagicToken::parse("abcdefghijklmnop/../x"),
            Err(MagicTokenError::InvalidCharacter)
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = MagicToken::parse("k3j9x0a1b2c3d4e5f6-lr8xq2p1").unwrap_or_else(|_| {
            panic!("valid token rejected");
        });
        assert!(!format!("{token:?}").contains("k3j9"));
    }
}
