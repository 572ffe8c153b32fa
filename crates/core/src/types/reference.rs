//! Validated string references for externally-issued identifiers.
//!
//! Products and fundraisers are identified by opaque strings minted by other
//! systems (the catalog, the onboarding flow). These arrive on the untrusted
//! request path, so they are validated on construction instead of being
//! passed around as bare `String`s.

use core::fmt;

/// Errors that can occur when parsing a string reference.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ReferenceError {
    /// The input string is empty.
    #[error("identifier cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("identifier must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[A-Za-z0-9_-]`.
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Macro to define a validated string reference type.
///
/// Constraints: 1-64 characters from `[A-Za-z0-9_-]`.
macro_rules! define_ref {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Maximum length of a reference.
            pub const MAX_LENGTH: usize = 64;

            /// Parse a reference from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty, longer than 64
            /// characters, or contains a character outside `[A-Za-z0-9_-]`.
            pub fn parse(s: &str) -> Result<Self, ReferenceError> {
                if s.is_empty() {
                    return Err(ReferenceError::Empty);
                }

                if s.len() > Self::MAX_LENGTH {
                    return Err(ReferenceError::TooLong {
                        max: Self::MAX_LENGTH,
                    });
                }

                if let Some(c) = s
                    .chars()
                    .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
                {
                    return Err(ReferenceError::InvalidCharacter(c));
                }

                Ok(Self(s.to_owned()))
            }

            /// Returns the reference as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the reference and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ReferenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, ::sqlx::error::BoxDynError> {
                let s = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                // Database values are assumed valid
                Ok(Self(s))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_ref!(
    ProductRef,
    "A catalog product identifier, as issued by the product system of record."
);
define_ref!(
    FundraiserRef,
    "A fundraiser (participant) identifier an order is attributed to."
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_refs() {
        assert!(ProductRef::parse("prod_tshirt").is_ok());
        assert!(ProductRef::parse("SKU-0042").is_ok());
        assert!(FundraiserRef::parse("f_9f8a7b6c").is_ok());
        assert!(ProductRef::parse("a").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(ProductRef::parse(""), Err(ReferenceError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(65);
        assert!(matches!(
            ProductRef::parse(&long),
            Err(ReferenceError::TooLong { max: 64 })
        ));
        assert!(ProductRef::parse(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_parse_invalid_character() {
        assert!(matches!(
            ProductRef::parse("prod tshirt"),
            Err(ReferenceError::InvalidCharacter(' '))
        ));
        assert!(matches!(
            ProductRef::parse("prod;drop"),
            Err(ReferenceError::InvalidCharacter(';'))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let r = ProductRef::parse("prod_tshirt").unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"prod_tshirt\"");

        let parsed: ProductRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn test_display() {
        let r = FundraiserRef::parse("f_1").unwrap();
        assert_eq!(r.to_string(), "f_1");
    }
}
