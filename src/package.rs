// SPDX-License-Identifier: MPL-2.0

//! Package identity, and the three shapes it takes on as a solve proceeds:
//! an unconstrained reference, a constrained dependency, and a concrete
//! selection.

use std::fmt;

use crate::range::VersionConstraint;
use crate::version::Version;

/// A package's identity, independent of any version constraint: the triple
/// a caller's `source`/`description` convention distinguishes (e.g. two
/// git remotes that happen to share a crate name are different `PackageRef`s).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageRef {
    pub name: String,
    pub source: String,
    pub description: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, source: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            description: description.into(),
        }
    }

    /// A reference identified by name alone, with an empty source and
    /// description. The common case in tests and single-source oracles.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, "", "")
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// True if two references name the same package instance (same name,
/// source, and description), as opposed to merely sharing a display name.
pub fn same_package(a: &PackageRef, b: &PackageRef) -> bool {
    a == b
}

/// A dependency: a package reference plus the range of versions that
/// satisfy it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageDep {
    pub package: PackageRef,
    pub constraint: VersionConstraint,
}

impl PackageDep {
    pub fn new(package: PackageRef, constraint: VersionConstraint) -> Self {
        Self { package, constraint }
    }

    /// Shorthand for a dependency constrained to every version of `package`.
    pub fn any(package: PackageRef) -> Self {
        Self::new(package, VersionConstraint::any())
    }

    /// The reference this dependency is about, without its constraint.
    pub fn to_ref(&self) -> PackageRef {
        self.package.clone()
    }

    /// Replace this dependency's constraint, keeping its package identity.
    pub fn with_constraint(&self, constraint: VersionConstraint) -> Self {
        Self::new(self.package.clone(), constraint)
    }

    pub fn allows(&self, v: &Version) -> bool {
        self.constraint.allows(v)
    }

    pub fn allows_all(&self, other: &Self) -> bool {
        self.constraint.allows_all(&other.constraint)
    }

    pub fn allows_any(&self, other: &Self) -> bool {
        self.constraint.allows_any(&other.constraint)
    }

    pub fn is_empty(&self) -> bool {
        self.constraint.is_empty()
    }
}

impl fmt::Display for PackageDep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.package.name, self.constraint)
    }
}

/// A concrete choice: a package reference pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageId {
    pub package: PackageRef,
    pub version: Version,
}

impl PackageId {
    pub fn new(package: PackageRef, version: Version) -> Self {
        Self { package, version }
    }

    pub fn to_ref(&self) -> PackageRef {
        self.package.clone()
    }

    /// The dependency satisfied by exactly this selection.
    pub fn to_dep(&self) -> PackageDep {
        PackageDep::new(self.package.clone(), VersionConstraint::exact(self.version.clone()))
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.package.name, self.version)
    }
}
