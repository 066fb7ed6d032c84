//! Newtype identifiers, following the same pattern for every id
//! (`agent_control/agent_id.rs`): validated at construction, RFC-1035-ish
//! label names so they are safe to use as filesystem path components and
//! cgroup directory names.

use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_LENGTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("identifier must be 1-{MAX_LENGTH} characters, start with a letter, end with an alphanumeric, and contain only lowercase letters, digits, or dashes")]
pub struct InvalidIdentifier;

fn is_valid_format(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LENGTH
        && s.starts_with(|c: char| c.is_ascii_alphabetic())
        && s.ends_with(|c: char| c.is_ascii_alphanumeric())
        && s.chars()
            .all(|c| c == '-' || c.is_ascii_digit() || c.is_ascii_lowercase())
}

macro_rules! identifier_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(s: &str) -> Result<Self, InvalidIdentifier> {
                Self::try_from(s.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdentifier;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                if is_valid_format(&s) {
                    Ok(Self(s))
                } else {
                    Err(InvalidIdentifier)
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<Path> for $name {
            fn as_ref(&self) -> &Path {
                Path::new(&self.0)
            }
        }
    };
}

identifier_newtype!(InstanceId);
identifier_newtype!(FeatureId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_identifiers() {
        assert!(InstanceId::new("tor-1").is_ok());
        assert!(FeatureId::new("wireguard").is_ok());
    }

    #[test]
    fn rejects_uppercase_leading_digit_and_trailing_dash() {
        assert!(InstanceId::new("Tor").is_err());
        assert!(InstanceId::new("1tor").is_err());
        assert!(InstanceId::new("tor-").is_err());
        assert!(InstanceId::new("").is_err());
    }

    #[test]
    fn rejects_identifiers_over_max_length() {
        let long = "a".repeat(MAX_LENGTH + 1);
        assert!(InstanceId::new(&long).is_err());
    }
}
