//! Stable, human-legible entity identifiers.
//!
//! Every id in this system is an 8 hex-digit suffix behind a fixed prefix
//! (`game-`, `sess-`, `user-`), matching the validator in spec §6:
//! `^(game|sess|user)-[0-9a-f]{8}$`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("id {0:?} does not match ^{1}-[0-9a-f]{{8}}$")]
    BadFormat(String, &'static str),
}

fn is_valid_suffix(s: &str) -> bool {
    s.len() == 8 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

macro_rules! define_hex_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; 8]);

        impl $name {
            /// Generate a new id from an 8-hex-digit suffix (e.g. produced by the
            /// injected `Rng` port so callers remain deterministic in tests).
            pub fn from_suffix(suffix: &str) -> Result<Self, IdParseError> {
                if !is_valid_suffix(suffix) {
                    return Err(IdParseError::BadFormat(suffix.to_string(), $prefix));
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(suffix.as_bytes());
                Ok(Self(bytes))
            }

            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                let prefix = concat!($prefix, "-");
                match s.strip_prefix(prefix) {
                    Some(suffix) => Self::from_suffix(suffix),
                    None => Err(IdParseError::BadFormat(s.to_string(), $prefix)),
                }
            }

            pub fn suffix(&self) -> &str {
                // Safe: constructed only from validated ASCII hex bytes.
                std::str::from_utf8(&self.0).expect("id bytes are ascii hex")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.suffix())
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

define_hex_id!(GameId, "game");
define_hex_id!(SessionId, "sess");
define_hex_id!(UserId, "user");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = GameId::from_suffix("0a1b2c3d").unwrap();
        assert_eq!(id.to_string(), "game-0a1b2c3d");
        assert_eq!(GameId::parse("game-0a1b2c3d").unwrap(), id);
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(GameId::parse("sess-0a1b2c3d").is_err());
    }

    #[test]
    fn rejects_uppercase_or_short_suffix() {
        assert!(GameId::from_suffix("0A1B2C3D").is_err());
        assert!(GameId::from_suffix("abc").is_err());
    }
}
