//! Canonical identifiers and sharded-path utilities.
//!
//! Stored registrations and hosted intake sessions are addressed by a *canonical* UUID
//! representation: **32 lowercase hexadecimal characters** (no hyphens), e.g.
//! `550e8400e29b41d4a716446655440000`. This is the value produced by
//! `Uuid::new_v4().simple().to_string()`.
//!
//! Externally supplied identifiers (URL path segments, CLI arguments) must already be
//! canonical; [`ShardableUuid::parse`] rejects uppercase, hyphenated, short or non-hex input.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, documents live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `patient_data/patients/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps fan-out in any single directory small.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;

/// Canonical UUID (32 lowercase hex characters, no hyphens).
///
/// Once constructed the contained UUID is guaranteed canonical, so path derivation and
/// string rendering are consistent everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShardableUuid(Uuid);

impl Default for ShardableUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardableUuid {
    /// Generates a new random (v4) canonical UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not 32 lowercase hex characters.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }

        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(e.to_string()))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical UUID form.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/`.
    ///
    /// `s1` is the first two hex characters of the UUID and `s2` the next two.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for ShardableUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ShardableUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShardableUuid::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ShardableUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ShardableUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ShardableUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let canonical = ShardableUuid::new().to_string();

        assert_eq!(canonical.len(), 32);
        assert!(ShardableUuid::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let parsed = ShardableUuid::parse(canonical).expect("canonical input should parse");

        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let result = ShardableUuid::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_non_canonical_forms() {
        for input in [
            "550E8400E29B41D4A716446655440000",
            "550e8400e29b41d4a71644665544000",
            "550e8400e29b41d4a7164466554400000",
            "550e8400e29b41d4a716446655440zzz",
            "",
        ] {
            assert!(ShardableUuid::parse(input).is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn test_sharded_dir_structure() {
        let uuid = ShardableUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let sharded = uuid.sharded_dir(Path::new("/patient_data/patients"));

        assert_eq!(
            sharded,
            PathBuf::from("/patient_data/patients/55/0e/550e8400e29b41d4a716446655440000")
        );
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let uuid = ShardableUuid::parse("00112233445566778899aabbccddeeff").unwrap();
        let json = serde_json::to_string(&uuid).unwrap();
        assert_eq!(json, "\"00112233445566778899aabbccddeeff\"");

        let err = serde_json::from_str::<ShardableUuid>("\"not-a-uuid\"");
        assert!(err.is_err());
    }
}
