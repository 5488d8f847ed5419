//! External identity type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`ExternalId`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum ExternalIdError {
    /// The input string is empty.
    #[error("external id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("external id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside the allowed set.
    #[error("external id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// An identifier issued by the identity provider (e.g. `user_2abcXYZ`).
///
/// External ids are opaque tokens. Two ids refer to the same account only if
/// their strings are byte-for-byte equal; no case folding or trimming is
/// applied after parsing.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - ASCII letters, digits, `_` and `-` only (safe as a URL path segment)
///
/// ## Examples
///
/// ```
/// use quill_core::ExternalId;
///
/// assert!(ExternalId::parse("user_2abcXYZ").is_ok());
/// assert!(ExternalId::parse("").is_err());
/// assert!(ExternalId::parse("user/../admin").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Maximum length of an external id.
    pub const MAX_LENGTH: usize = 64;

    /// Parse an `ExternalId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 64 characters, or
    /// contains anything other than ASCII alphanumerics, `_` or `-`.
    pub fn parse(s: &str) -> Result<Self, ExternalIdError> {
        if s.is_empty() {
            return Err(ExternalIdError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(ExternalIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ExternalIdError::InvalidCharacter(c));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ExternalId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExternalId {
    type Err = ExternalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = ExternalIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ExternalId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ExternalId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ExternalId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert!(ExternalId::parse("user_2abcXYZ").is_ok());
        assert!(ExternalId::parse("u1").is_ok());
        assert!(ExternalId::parse("a-b_c").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(ExternalId::parse(""), Err(ExternalIdError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(65);
        assert!(matches!(
            ExternalId::parse(&long),
            Err(ExternalIdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        assert!(matches!(
            ExternalId::parse("user/admin"),
            Err(ExternalIdError::InvalidCharacter('/'))
        ));
        assert!(matches!(
            ExternalId::parse("user 1"),
            Err(ExternalIdError::InvalidCharacter(' '))
        ));
    }

    #[test]
    fn test_equality_is_exact() {
        let a = ExternalId::parse("User_1").unwrap();
        let b = ExternalId::parse("user_1").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, ExternalId::parse("User_1").unwrap());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = ExternalId::parse("user_1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user_1\"");

        let parsed: ExternalId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<ExternalId>("\"user/1\"").is_err());
        assert!(serde_json::from_str::<ExternalId>("\"\"").is_err());
    }
}
