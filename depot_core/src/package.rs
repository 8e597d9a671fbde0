//! Package references.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Revision sentinel meaning "latest, not yet resolved".
pub const LATEST_REVISION: i64 = -1;

/// A package `namespace/name` at a revision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageRef {
    namespace: String,
    name: String,
    revision: i64,
}

impl PackageRef {
    /// Reference to the latest revision of `namespace/name`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        let input = format!("{}/{}", namespace, name);
        validate_namespace(&input, &namespace)?;
        validate_name(&input, &name)?;
        Ok(Self {
            namespace,
            name,
            revision: LATEST_REVISION,
        })
    }

    /// Parse `namespace/name` or `namespace/name-<revision>`.
    pub fn parse(s: &str) -> Result<Self> {
        let Some((namespace, rest)) = s.split_once('/') else {
            return Err(Error::invalid_reference(s, "expected namespace/name"));
        };

        let (name, revision) = match rest.rsplit_once('-') {
            Some((name, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => {
                let revision = rev
                    .parse::<i64>()
                    .map_err(|e| Error::invalid_reference(s, format!("bad revision: {}", e)))?;
                (name, revision)
            }
            _ => (rest, LATEST_REVISION),
        };

        validate_namespace(s, namespace)?;
        validate_name(s, name)?;
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            revision,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `namespace/name` without the revision.
    pub fn path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// True while the revision is still [`LATEST_REVISION`].
    pub fn is_latest(&self) -> bool {
        self.revision == LATEST_REVISION
    }

    /// Same package at another revision.
    pub fn with_revision(&self, revision: i64) -> Self {
        Self {
            revision,
            ..self.clone()
        }
    }
}

fn validate_namespace(input: &str, namespace: &str) -> Result<()> {
    let valid = namespace
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && namespace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ':' | '.' | '_' | '-'));
    if !valid {
        return Err(Error::invalid_reference(
            input,
            format!("invalid namespace {:?}", namespace),
        ));
    }
    Ok(())
}

fn validate_name(input: &str, name: &str) -> Result<()> {
    if !name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err(Error::invalid_reference(
            input,
            "name must start with a lowercase letter",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::invalid_reference(
            input,
            format!("invalid name {:?}", name),
        ));
    }
    // A numeric segment would be read back as a revision.
    if name
        .split('-')
        .any(|seg| seg.is_empty() || seg.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(Error::invalid_reference(
            input,
            format!("name {:?} has an empty or numeric segment", name),
        ));
    }
    Ok(())
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)?;
        if self.revision != LATEST_REVISION {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

impl FromStr for PackageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PackageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PackageRef::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Make a string safe to use as a single path segment.
///
/// ASCII letters, digits, `.` and `-` are kept; every other byte becomes
/// `_xx_` with two lowercase hex digits. Distinct inputs map to distinct
/// outputs.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' {
            out.push(b as char);
        } else {
            out.push('_');
            out.push_str(&hex::encode([b]));
            out.push('_');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_revision() {
        let r = PackageRef::parse("local:precise/wordpress-3").unwrap();
        assert_eq!(r.namespace(), "local:precise");
        assert_eq!(r.name(), "wordpress");
        assert_eq!(r.revision(), 3);
        assert!(!r.is_latest());
        assert_eq!(r.to_string(), "local:precise/wordpress-3");
    }

    #[test]
    fn test_parse_latest() {
        let r = PackageRef::parse("cs/mysql-proxy").unwrap();
        assert_eq!(r.name(), "mysql-proxy");
        assert_eq!(r.revision(), LATEST_REVISION);
        assert!(r.is_latest());
        assert_eq!(r.to_string(), "cs/mysql-proxy");
    }

    #[test]
    fn test_with_revision() {
        let r = PackageRef::new("cs", "mysql").unwrap();
        let pinned = r.with_revision(12);
        assert_eq!(pinned.to_string(), "cs/mysql-12");
        assert_eq!(pinned.path(), "cs/mysql");
        assert!(r.is_latest());
    }

    #[test]
    fn test_parse_invalid() {
        for bad in [
            "",
            "mysql",
            "/mysql",
            "cs/",
            "cs/Mysql",
            "cs/1mysql",
            "cs/my_sql",
            "cs/mysql--1",
            "cs/mysql-1-2",
            "cs/a/b",
            "Cs/mysql",
        ] {
            assert!(PackageRef::parse(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("abc-1.2"), "abc-1.2");
        assert_eq!(
            quote("local:precise/wordpress-3"),
            "local_3a_precise_2f_wordpress-3"
        );
        assert_eq!(quote("a_b"), "a_5f_b");
    }

    #[test]
    fn test_serde_as_string() {
        let r = PackageRef::parse("cs/mysql-4").unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"cs/mysql-4\"");
        let back: PackageRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Distinct strings never quote to the same name
        #[test]
        fn prop_quote_injective(a in ".{0,16}", b in ".{0,16}") {
            if a != b {
                prop_assert_ne!(quote(&a), quote(&b));
            }
        }

        /// Quoted strings contain only name-safe characters
        #[test]
        fn prop_quote_is_name_safe(s in ".{0,32}") {
            let q = quote(&s);
            prop_assert!(q.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_')));
        }

        /// References survive a display/parse round trip
        #[test]
        fn prop_reference_roundtrip(
            ns in "[a-z][a-z0-9:]{0,8}",
            name in "[a-z]{1,8}(-[a-z][a-z0-9]{0,4}){0,2}",
            revision in -1i64..10_000
        ) {
            let r = PackageRef::new(ns, name)?.with_revision(revision);
            prop_assert_eq!(PackageRef::parse(&r.to_string())?, r);
        }
    }
}
