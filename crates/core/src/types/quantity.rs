//! Item quantity type.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is below zero.
    #[error("quantity cannot be negative")]
    Negative,
    /// The value has a fractional part.
    #[error("quantity must be a whole number")]
    NotWhole,
    /// The value does not fit the storage range.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Largest accepted quantity.
        max: i32,
    },
    /// The value is not a number or numeric string.
    #[error("quantity must be numeric")]
    NotNumeric,
}

/// A non-negative whole item quantity.
///
/// Used both for the ordered `qty` and the confirmed `deliveredQty`. The two
/// are never compared or clamped against each other: over- and
/// under-delivery are valid outcomes.
///
/// ## Examples
///
/// ```
/// use handover_core::Quantity;
/// use serde_json::json;
///
/// assert_eq!(Quantity::from_json(&json!(5)).unwrap().get(), 5);
/// assert_eq!(Quantity::from_json(&json!("12")).unwrap().get(), 12);
/// assert_eq!(Quantity::from_json(&json!(null)).unwrap().get(), 0);
///
/// assert!(Quantity::from_json(&json!(-1)).is_err());
/// assert!(Quantity::from_json(&json!("lots")).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Quantity(i32);

impl Quantity {
    /// The zero quantity.
    pub const ZERO: Self = Self(0);

    /// Create a quantity from an integer.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Negative` for values below zero.
    pub const fn new(value: i32) -> Result<Self, QuantityError> {
        if value < 0 {
            return Err(QuantityError::Negative);
        }
        Ok(Self(value))
    }

    /// Parse a quantity from a loosely typed JSON value.
    ///
    /// Accepts integers, integral floats and numeric strings. `null` and the
    /// empty string count as zero.
    ///
    /// # Errors
    ///
    /// Returns an error for negative, fractional, oversized or non-numeric
    /// values.
    pub fn from_json(value: &Value) -> Result<Self, QuantityError> {
        match value {
            Value::Null => Ok(Self::ZERO),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::from_i64(i)
                } else {
                    Self::from_f64(n.as_f64().ok_or(QuantityError::NotNumeric)?)
                }
            }
            Value::String(s) => Self::parse(s),
            _ => Err(QuantityError::NotNumeric),
        }
    }

    /// Parse a quantity from text.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Quantity::from_json`].
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::ZERO);
        }
        if let Ok(i) = s.parse::<i64>() {
            return Self::from_i64(i);
        }
        let f = s.parse::<f64>().map_err(|_| QuantityError::NotNumeric)?;
        Self::from_f64(f)
    }

    fn from_i64(value: i64) -> Result<Self, QuantityError> {
        if value < 0 {
            return Err(QuantityError::Negative);
        }
        i32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge { max: i32::MAX })
    }

    #[allow(clippy::cast_possible_truncation)] // range checked before the cast
    fn from_f64(value: f64) -> Result<Self, QuantityError> {
        if !value.is_finite() {
            return Err(QuantityError::NotNumeric);
        }
        if value < 0.0 {
            return Err(QuantityError::Negative);
        }
        if value.fract() != 0.0 {
            return Err(QuantityError::NotWhole);
        }
        if value > f64::from(i32::MAX) {
            return Err(QuantityError::TooLarge { max: i32::MAX });
        }
        Ok(Self(value as i32))
    }

    /// Returns the quantity as an integer.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Quantity {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Quantity {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i32 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Quantity {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(Quantity::from_json(&json!(0)).unwrap(), Quantity::ZERO);
        assert_eq!(Quantity::from_json(&json!(100)).unwrap().get(), 100);
        assert_eq!(Quantity::from_json(&json!(3.0)).unwrap().get(), 3);
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(Quantity::from_json(&json!(" 7 ")).unwrap().get(), 7);
        assert_eq!(Quantity::from_json(&json!("")).unwrap(), Quantity::ZERO);
        assert_eq!(Quantity::from_json(&json!("2.0")).unwrap().get(), 2);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            Quantity::from_json(&json!(-1)),
            Err(QuantityError::Negative)
        );
        assert_eq!(
            Quantity::from_json(&json!("-4")),
            Err(QuantityError::Negative)
        );
        assert_eq!(
            Quantity::from_json(&json!(1.5)),
            Err(QuantityError::NotWhole)
        );
        assert_eq!(
            Quantity::from_json(&json!("five")),
            Err(QuantityError::NotNumeric)
        );
        assert_eq!(
            Quantity::from_json(&json!(true)),
            Err(QuantityError::NotNumeric)
        );
        assert!(matches!(
            Quantity::from_json(&json!(10_000_000_000_i64)),
            Err(QuantityError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_deserialize() {
        #[derive(Deserialize)]
        struct Line {
            qty: Quantity,
        }

        let line: Line = serde_json::from_str(r#"{"qty": "9"}"#).unwrap();
        assert_eq!(line.qty.get(), 9);
        assert!(serde_json::from_str::<Line>(r#"{"qty": -2}"#).is_err());
    }

    #[test]
    fn test_new() {
        assert!(Quantity::new(-1).is_err());
        assert_eq!(Quantity::new(4).unwrap().get(), 4);
    }
}
