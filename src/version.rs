// SPDX-License-Identifier: MPL-2.0

//! Semantic versions: parsing, ordering, and the two solve-order priorities
//! the decision loop chooses candidate versions with.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A single dot-separated identifier inside a pre-release or build segment.
///
/// Numeric identifiers compare numerically; alphanumeric identifiers compare
/// lexically; a numeric identifier always sorts before an alphanumeric one
/// (per the semver precedence rules).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum Identifier {
    Numeric(u64),
    AlphaNumeric(String),
}

impl Identifier {
    fn parse(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse::<u64>() {
                return Self::Numeric(n);
            }
        }
        Self::AlphaNumeric(s.to_string())
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::AlphaNumeric(a), Self::AlphaNumeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::AlphaNumeric(_)) => Ordering::Less,
            (Self::AlphaNumeric(_), Self::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::AlphaNumeric(s) => write!(f, "{s}"),
        }
    }
}

/// A semantic version: `major.minor.patch[-prerelease][+build]`.
///
/// Ordering follows semver precedence: core version numbers compare
/// numerically, a version with a pre-release always sorts before the same
/// core version without one, and build metadata never affects ordering or
/// equality.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pre: Vec<Identifier>,
    build: Vec<Identifier>,
}

/// Error returned when a string is not a valid semantic version.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum VersionParseError {
    /// The version string did not have the `major.minor.patch` shape.
    #[error("invalid version {0:?}: expected major.minor.patch[-pre][+build]")]
    Malformed(String),
    /// A numeric component (major/minor/patch) did not parse as an integer.
    #[error("invalid version {0:?}: {1} is not a number")]
    NotANumber(String, String),
}

impl Version {
    /// Construct a release version with no pre-release or build metadata.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Version `0.0.0`.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Attach a pre-release segment, e.g. `Version::new(1,0,0).with_pre("beta.1")`.
    pub fn with_pre(mut self, pre: &str) -> Self {
        self.pre = pre.split('.').map(Identifier::parse).collect();
        self
    }

    /// True if this version carries a pre-release segment.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    pub fn bump_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// The version produced by a caret bump (`^v`): the next version that
    /// would break compatibility with `v`, per the usual "leftmost nonzero
    /// component" rule (0.x.y is narrower than x.y.z for x > 0).
    pub fn next_breaking(&self) -> Self {
        if self.major > 0 {
            self.bump_major()
        } else if self.minor > 0 {
            self.bump_minor()
        } else {
            self.bump_patch()
        }
    }

    /// Key for the GET/UPGRADE solve order: non-prerelease versions first,
    /// highest first. Standard semver `Ord` already places every release
    /// above any pre-release of the same core, so "prioritize" is simply
    /// descending order; this helper names that choice at call sites
    /// (`nextCandidate`, `bestVersionFor`, `depWhere`).
    pub fn prioritize_key(&self) -> impl Ord + '_ {
        std::cmp::Reverse(self)
    }

    /// Key for the DOWNGRADE solve order: lowest version first.
    pub fn antiprioritize_key(&self) -> impl Ord + '_ {
        self
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch == other.patch
            && self.pre == other.pre
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-")?;
            for (i, id) in self.pre.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{id}")?;
            }
        }
        if !self.build.is_empty() {
            write!(f, "+")?;
            for (i, id) in self.build.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{id}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (core_and_pre, build) = match s.split_once('+') {
            Some((a, b)) => (a, b),
            None => (s, ""),
        };
        let (core, pre) = match core_and_pre.split_once('-') {
            Some((a, b)) => (a, b),
            None => (core_and_pre, ""),
        };
        let mut parts = core.split('.');
        let (Some(maj), Some(min), Some(pat), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VersionParseError::Malformed(s.to_string()));
        };
        let parse_u64 = |p: &str| {
            p.parse::<u64>()
                .map_err(|_| VersionParseError::NotANumber(s.to_string(), p.to_string()))
        };
        let mut version = Version::new(parse_u64(maj)?, parse_u64(min)?, parse_u64(pat)?);
        if !pre.is_empty() {
            version.pre = pre.split('.').map(Identifier::parse).collect();
        }
        if !build.is_empty() {
            version.build = build.split('.').map(Identifier::parse).collect();
        }
        Ok(version)
    }
}

impl From<(u64, u64, u64)> for Version {
    fn from((major, minor, patch): (u64, u64, u64)) -> Self {
        Self::new(major, minor, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release() {
        let v: Version = "1.2.3".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn parses_prerelease_and_build() {
        let v: Version = "1.2.3-beta.1+exp.sha.5114f85".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 3).with_pre("beta.1"));
        assert_eq!(v.to_string(), "1.2.3-beta.1+exp.sha.5114f85");
    }

    #[test]
    fn rejects_malformed() {
        assert!("1.2".parse::<Version>().is_err());
        assert!("1.2.x".parse::<Version>().is_err());
    }

    #[test]
    fn prerelease_sorts_before_release() {
        let pre: Version = "1.0.0-alpha".parse().unwrap();
        let release = Version::new(1, 0, 0);
        assert!(pre < release);
    }

    #[test]
    fn numeric_identifiers_compare_numerically() {
        let a: Version = "1.0.0-alpha.2".parse().unwrap();
        let b: Version = "1.0.0-alpha.10".parse().unwrap();
        assert!(a < b, "numeric pre-release identifiers must not compare as strings");
    }

    #[test]
    fn build_metadata_is_ignored_in_ordering_and_equality() {
        let a: Version = "1.0.0+001".parse().unwrap();
        let b: Version = "1.0.0+002".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn next_breaking_follows_caret_rule() {
        assert_eq!(Version::new(1, 2, 3).next_breaking(), Version::new(2, 0, 0));
        assert_eq!(Version::new(0, 2, 3).next_breaking(), Version::new(0, 3, 0));
        assert_eq!(Version::new(0, 0, 3).next_breaking(), Version::new(0, 0, 4));
    }
}
