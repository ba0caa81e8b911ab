// SPDX-License-Identifier: MPL-2.0

//! The external collaborators the solver consumes: a source of versions and
//! their pubspecs, and a probe for the current SDK. Package source
//! plumbing, pubspec parsing, and lockfile I/O are all out of scope here.
//! The solver only ever sees these two narrow interfaces.

use std::convert::Infallible;

use indexmap::IndexMap;

use crate::package::{PackageDep, PackageId, PackageRef};
use crate::range::VersionConstraint;
use crate::version::Version;

/// Which direction a solve should prefer when more than one version of a
/// package would satisfy its constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMode {
    /// First-time resolution: prefer the highest allowed non-prerelease,
    /// same as `Upgrade`.
    Get,
    /// Prefer the highest allowed version.
    Upgrade,
    /// Prefer the lowest allowed version.
    Downgrade,
}

impl SolveMode {
    /// GET and UPGRADE share a priority; only DOWNGRADE inverts it.
    pub fn prefers_highest(self) -> bool {
        !matches!(self, Self::Downgrade)
    }
}

/// A package's manifest as the oracle reports it: its dependencies and the
/// SDK versions it requires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pubspec {
    pub dependencies: Vec<PackageDep>,
    pub dart_sdk_constraint: VersionConstraint,
    pub flutter_sdk_constraint: Option<VersionConstraint>,
}

impl Pubspec {
    pub fn new(dependencies: Vec<PackageDep>) -> Self {
        Self {
            dependencies,
            dart_sdk_constraint: VersionConstraint::any(),
            flutter_sdk_constraint: None,
        }
    }

    pub fn with_dart_sdk(mut self, constraint: VersionConstraint) -> Self {
        self.dart_sdk_constraint = constraint;
        self
    }

    pub fn with_flutter_sdk(mut self, constraint: VersionConstraint) -> Self {
        self.flutter_sdk_constraint = Some(constraint);
        self
    }
}

/// The outcome of listing a package's versions: either an ordered list, or
/// the fact that the oracle has never heard of this package at all (which
/// the solver folds into a learned prohibition rather than an error).
#[derive(Debug, Clone)]
pub enum VersionsLookup {
    Found(Vec<PackageId>),
    NotFound,
}

/// Reports the current SDK(s) the solve is running under.
pub trait SdkProbe {
    fn dart_version(&self) -> Version;
    fn flutter_version(&self) -> Option<Version>;
    fn flutter_available(&self) -> bool;
}

/// An SDK probe fixed at construction; the common case for tests and for a
/// CLI that has already detected its host SDKs once at startup.
#[derive(Debug, Clone)]
pub struct FixedSdk {
    dart: Version,
    flutter: Option<Version>,
}

impl FixedSdk {
    pub fn dart_only(dart: Version) -> Self {
        Self { dart, flutter: None }
    }

    pub fn with_flutter(dart: Version, flutter: Version) -> Self {
        Self {
            dart,
            flutter: Some(flutter),
        }
    }
}

impl SdkProbe for FixedSdk {
    fn dart_version(&self) -> Version {
        self.dart.clone()
    }

    fn flutter_version(&self) -> Option<Version> {
        self.flutter.clone()
    }

    fn flutter_available(&self) -> bool {
        self.flutter.is_some()
    }
}

/// Lists and describes package versions. The solver's only source of truth
/// about what exists; everything about *how* versions are fetched (a
/// registry, git, a path) lives behind this trait, not in the solver.
pub trait VersionOracle {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All versions of `package`, sorted by `mode`'s priority
    /// (highest-first for GET/UPGRADE, lowest-first for DOWNGRADE).
    fn versions(&self, package: &PackageRef, mode: SolveMode) -> Result<VersionsLookup, Self::Error>;

    /// The manifest of one concrete version.
    fn describe(&self, id: &PackageId) -> Result<Pubspec, Self::Error>;
}

/// An in-memory oracle: register `(PackageId, Pubspec)` pairs and get back
/// something the solver can resolve against with no real package source
/// plumbing. Not meant for production use; exists for tests and the
/// walkthrough binary.
#[derive(Debug, Clone, Default)]
pub struct MemoryOracle {
    packages: IndexMap<PackageRef, Vec<(Version, Pubspec)>>,
}

impl MemoryOracle {
    fn versions_sorted(&self, package: &PackageRef, mode: SolveMode) -> Option<Vec<PackageId>> {
        let versions = self.packages.get(package)?;
        let mut ids: Vec<PackageId> = versions
            .iter()
            .map(|(v, _)| PackageId::new(package.clone(), v.clone()))
            .collect();
        if mode.prefers_highest() {
            ids.sort_by_key(|id| id.version.prioritize_key());
        } else {
            ids.sort_by_key(|id| id.version.antiprioritize_key());
        }
        Some(ids)
    }
}

impl VersionOracle for MemoryOracle {
    type Error = Infallible;

    fn versions(&self, package: &PackageRef, mode: SolveMode) -> Result<VersionsLookup, Infallible> {
        Ok(match self.versions_sorted(package, mode) {
            Some(ids) => VersionsLookup::Found(ids),
            None => VersionsLookup::NotFound,
        })
    }

    fn describe(&self, id: &PackageId) -> Result<Pubspec, Infallible> {
        let versions = self.packages.get(&id.package).expect("describe called on an unregistered package");
        let (_, pubspec) = versions
            .iter()
            .find(|(v, _)| *v == id.version)
            .expect("describe called on an unregistered version");
        Ok(pubspec.clone())
    }
}

/// Builds a [`MemoryOracle`] by registering one `(PackageId, Pubspec)` pair
/// at a time.
#[derive(Debug, Clone, Default)]
pub struct OracleBuilder {
    packages: IndexMap<PackageRef, Vec<(Version, Pubspec)>>,
}

impl OracleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, id: PackageId, pubspec: Pubspec) -> Self {
        self.packages.entry(id.package).or_default().push((id.version, pubspec));
        self
    }

    pub fn build(self) -> MemoryOracle {
        MemoryOracle { packages: self.packages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn versions_sorted_highest_first_for_get() {
        let oracle = OracleBuilder::new()
            .add(PackageId::new(PackageRef::named("foo"), v("1.0.0")), Pubspec::default())
            .add(PackageId::new(PackageRef::named("foo"), v("2.0.0")), Pubspec::default())
            .build();
        let VersionsLookup::Found(ids) = oracle.versions(&PackageRef::named("foo"), SolveMode::Get).unwrap() else {
            panic!("expected Found");
        };
        assert_eq!(ids[0].version, v("2.0.0"));
    }

    #[test]
    fn versions_sorted_lowest_first_for_downgrade() {
        let oracle = OracleBuilder::new()
            .add(PackageId::new(PackageRef::named("foo"), v("1.0.0")), Pubspec::default())
            .add(PackageId::new(PackageRef::named("foo"), v("2.0.0")), Pubspec::default())
            .build();
        let VersionsLookup::Found(ids) = oracle
            .versions(&PackageRef::named("foo"), SolveMode::Downgrade)
            .unwrap()
        else {
            panic!("expected Found");
        };
        assert_eq!(ids[0].version, v("1.0.0"));
    }

    #[test]
    fn unregistered_package_is_not_found() {
        let oracle = MemoryOracle::default();
        assert!(matches!(
            oracle.versions(&PackageRef::named("foo"), SolveMode::Get).unwrap(),
            VersionsLookup::NotFound
        ));
    }
}
