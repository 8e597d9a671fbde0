//! Version descriptors and their canonical string form.
//!
//! A tool artifact is identified by a [`Binary`] version: a numeric
//! `major.minor.patch` triple plus an opaque platform tag. The canonical
//! encoding is `major.minor.patch-platform`, and it is the only form
//! [`Binary::decode`] accepts.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Numeric part of a version. Ordered by (major, minor, patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionNumber {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `major.minor.patch`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::malformed_version(
                s,
                "expected three dot-separated numbers",
            ));
        };

        Ok(Self {
            major: parse_component(s, major)?,
            minor: parse_component(s, minor)?,
            patch: parse_component(s, patch)?,
        })
    }
}

fn parse_component(input: &str, part: &str) -> Result<u32> {
    if part.is_empty() {
        return Err(Error::malformed_version(input, "empty version number"));
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed_version(
            input,
            format!("{:?} is not a decimal number", part),
        ));
    }
    // Canonical numbers only, otherwise "01" and "1" would name the same version.
    if part.len() > 1 && part.starts_with('0') {
        return Err(Error::malformed_version(
            input,
            format!("{:?} has a leading zero", part),
        ));
    }
    part.parse::<u32>()
        .map_err(|e| Error::malformed_version(input, format!("{:?}: {}", part, e)))
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A version descriptor: number plus platform tag.
///
/// Equality covers all four fields. There is deliberately no `Ord`: the
/// platform is a discriminator, so compare [`Binary::number`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub number: VersionNumber,
    pub platform: String,
}

impl Binary {
    /// Create a descriptor, validating the platform tag.
    pub fn new(number: VersionNumber, platform: impl Into<String>) -> Result<Self> {
        let platform = platform.into();
        validate_platform(&number.to_string(), &platform)?;
        Ok(Self { number, platform })
    }

    pub fn major(&self) -> u32 {
        self.number.major
    }

    pub fn minor(&self) -> u32 {
        self.number.minor
    }

    pub fn patch(&self) -> u32 {
        self.number.patch
    }

    /// Returns the numeric part, which carries the ordering.
    pub fn number(&self) -> VersionNumber {
        self.number
    }

    /// Encode to the canonical `major.minor.patch-platform` form.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode the canonical form. No partial parses are accepted.
    pub fn decode(s: &str) -> Result<Self> {
        let Some((number, platform)) = s.split_once('-') else {
            return Err(Error::malformed_version(s, "missing platform"));
        };
        let number = VersionNumber::parse(number).map_err(|_| {
            Error::malformed_version(s, format!("invalid version number {:?}", number))
        })?;
        validate_platform(s, platform)?;

        Ok(Self {
            number,
            platform: platform.to_string(),
        })
    }

    /// Same version number on a different platform.
    pub fn with_platform(&self, platform: impl Into<String>) -> Result<Self> {
        Self::new(self.number, platform)
    }
}

/// Check that a platform tag is non-empty and name-safe.
pub fn validate_platform(input: &str, platform: &str) -> Result<()> {
    let Some(first) = platform.chars().next() else {
        return Err(Error::malformed_version(input, "empty platform"));
    };
    if !first.is_ascii_alphanumeric() {
        return Err(Error::malformed_version(
            input,
            format!("platform {:?} must start with a letter or digit", platform),
        ));
    }
    if let Some(bad) = platform
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(Error::malformed_version(
            input,
            format!("invalid character {:?} in platform", bad),
        ));
    }
    Ok(())
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.platform)
    }
}

impl FromStr for Binary {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Binary::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let v = Binary::new(VersionNumber::new(1, 2, 3), "precise-amd64").unwrap();
        assert_eq!(v.encode(), "1.2.3-precise-amd64");
    }

    #[test]
    fn test_decode() {
        let v = Binary::decode("1.20.0-x").unwrap();
        assert_eq!(v.number(), VersionNumber::new(1, 20, 0));
        assert_eq!(v.platform, "x");
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 20);
        assert_eq!(v.patch(), 0);
    }

    #[test]
    fn test_decode_rejects_partial() {
        for bad in [
            "",
            "garbage",
            "1.2.3",
            "1.2-x",
            "1.2.3.4-x",
            "1.2.3-",
            "1.2.3--x",
            "01.2.3-x",
            "1.2.x-y",
            "-1.2.3-x",
            "1.2.3-x/y",
            "1.2.3-x y",
            "99999999999.0.0-x",
        ] {
            let err = Binary::decode(bad).unwrap_err();
            assert!(
                matches!(err, Error::MalformedVersion { .. }),
                "{:?} should be malformed, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_number_ordering_ignores_platform() {
        let a = Binary::decode("1.2.3-zzz").unwrap();
        let b = Binary::decode("1.10.0-aaa").unwrap();
        assert!(a.number() < b.number());
        assert_ne!(
            Binary::decode("1.2.3-a").unwrap(),
            Binary::decode("1.2.3-b").unwrap()
        );
    }

    #[test]
    fn test_with_platform() {
        let v = Binary::decode("2.0.1-precise").unwrap();
        let alias = v.with_platform("raring").unwrap();
        assert_eq!(alias.number(), v.number());
        assert_eq!(alias.encode(), "2.0.1-raring");
        assert!(v.with_platform("").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let v = Binary::decode("1.0.0-x").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.0.0-x\"");
        let back: Binary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<Binary>("\"nope\"").is_err());
    }

    // Property-based tests
    use proptest::prelude::*;

    fn platform_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9._-]{0,20}"
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Decoding an encoded descriptor yields the same descriptor
        #[test]
        fn prop_encode_decode_roundtrip(
            major: u32,
            minor: u32,
            patch: u32,
            platform in platform_strategy()
        ) {
            let v = Binary::new(VersionNumber::new(major, minor, patch), platform)?;
            let decoded = Binary::decode(&v.encode())?;
            prop_assert_eq!(decoded, v);
        }

        /// Anything that decodes re-encodes to the identical string
        #[test]
        fn prop_decode_is_canonical(s in "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}-[a-z0-9-]{1,8}") {
            if let Ok(v) = Binary::decode(&s) {
                prop_assert_eq!(v.encode(), s);
            }
        }
    }
}
