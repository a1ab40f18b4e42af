//! Identifier newtypes with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for core types and command requests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A required request field was not supplied.
    #[error("missing required option: {field}")]
    MissingField { field: &'static str },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

define_string_id!(
    /// A validated user identifier, as delivered by the presence source.
    UserId, "user ID"
);

define_string_id!(
    /// A validated guild identifier.
    GuildId, "guild ID"
);

define_string_id!(
    /// A validated voice channel identifier.
    ChannelId, "channel ID"
);

define_string_id!(
    /// A validated session identifier.
    ///
    /// Freshly tracked sessions get a random UUID; stored IDs are accepted as-is.
    SessionId, "session ID"
);

impl SessionId {
    /// Generates a new random session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_empty() {
        assert_eq!(
            UserId::new(""),
            Err(ValidationError::Empty { field: "user ID" })
        );
        assert!(UserId::new("1234").is_ok());
    }

    #[test]
    fn channel_id_parses_from_str() {
        let id: ChannelId = "voice-1".parse().unwrap();
        assert_eq!(id.as_str(), "voice-1");
        assert!("".parse::<ChannelId>().is_err());
    }

    #[test]
    fn guild_id_serde_rejects_empty() {
        let result: Result<GuildId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());

        let parsed: GuildId = serde_json::from_str("\"g-1\"").unwrap();
        assert_eq!(parsed.to_string(), "g-1");
    }

    #[test]
    fn generated_session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
