// SPDX-License-Identifier: MPL-2.0

//! A CDCL (conflict-driven clause learning) dependency version solver, in the
//! style of the Dart `pub` and Rust `pubgrub` resolvers.
//!
//! Version solving consists of efficiently finding a set of packages and
//! versions that satisfy every dependency of a project, choosing the highest
//! (or, in `Downgrade` mode, the lowest) version of each package the
//! remaining constraints allow. When that is not possible, the solver
//! produces a human-readable explanation of exactly which constraints
//! conflict and why.
//!
//! # Package identity
//!
//! Packages are identified by [`PackageRef`] (name plus source and
//! description, so two sources can both publish a package of the same
//! name), constrained by [`PackageDep`] (a [`PackageRef`] plus a
//! [`VersionConstraint`]), and selected as [`PackageId`] (a [`PackageRef`]
//! pinned to one [`Version`]).
//!
//! # The oracle and the SDK probe
//!
//! The solver never reads a registry, a lockfile, or the filesystem itself.
//! It asks two narrow collaborators: a [`VersionOracle`], which lists a
//! package's versions and describes one version's manifest, and an
//! [`SdkProbe`], which reports the current Dart/Flutter SDK versions so the
//! solver can gate candidates whose `pubspec` declares an incompatible SDK
//! constraint. [`MemoryOracle`] (built with [`OracleBuilder`]) and
//! [`FixedSdk`] are in-memory implementations of each, meant for tests and
//! small embedded use, not a real package source.
//!
//! ```
//! use semver_solve::{
//!     resolve, FixedSdk, OracleBuilder, PackageDep, PackageId, PackageRef, Pubspec, SolveConfig,
//! };
//!
//! let root = PackageRef::named("root");
//! let foo = PackageRef::named("foo");
//!
//! let oracle = OracleBuilder::new()
//!     .add(
//!         PackageId::new(foo.clone(), "1.0.0".parse().unwrap()),
//!         Pubspec::new(vec![]),
//!     )
//!     .add(
//!         PackageId::new(foo.clone(), "1.0.1".parse().unwrap()),
//!         Pubspec::new(vec![]),
//!     )
//!     .build();
//! let sdk = FixedSdk::dart_only("3.0.0".parse().unwrap());
//!
//! let result = resolve(
//!     &oracle,
//!     &sdk,
//!     root.clone(),
//!     "1.0.0".parse().unwrap(),
//!     vec![PackageDep::any(foo.clone())],
//!     SolveConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(result.decision_for("foo").unwrap().version, "1.0.1".parse().unwrap());
//! ```
//!
//! # Failure explanation
//!
//! When no assignment satisfies every dependency, [`resolve`] returns a
//! [`crate::error::SolveError::NoSolution`] wrapping a [`NoSolutionError`].
//! Its derivation tree is a binary tree of incompatibilities: leaves are
//! [`External`] facts (a dependency, a missing version, an SDK mismatch),
//! and internal nodes are [`Derived`] by resolving two earlier
//! incompatibilities against each other. [`NoSolutionError::explain`] (and
//! the underlying [`DefaultStringReporter`]) renders that tree as a
//! numbered, line-wrapped proof:
//!
//! ```
//! # use semver_solve::{resolve, FixedSdk, OracleBuilder, PackageDep, PackageId, PackageRef, Pubspec, SolveConfig, SolveError};
//! #
//! let root = PackageRef::named("root");
//! let foo = PackageRef::named("foo");
//! let oracle = OracleBuilder::new().build();
//! let sdk = FixedSdk::dart_only("3.0.0".parse().unwrap());
//!
//! match resolve(
//!     &oracle,
//!     &sdk,
//!     root,
//!     "1.0.0".parse().unwrap(),
//!     vec![PackageDep::any(foo)],
//!     SolveConfig::default(),
//! ) {
//!     Ok(result) => println!("{:?}", result.decisions),
//!     Err(SolveError::NoSolution(err)) => eprintln!("{}", err.explain()),
//!     Err(err) => panic!("{err}"),
//! }
//! ```

#![warn(missing_docs)]

mod constraint;
mod error;
mod normalize;
mod oracle;
mod package;
mod range;
mod report;
mod solver;
mod term;
mod version;

pub use constraint::{satisfaction, Constraint, Satisfaction};
pub use error::{NoSolutionError, SolveError};
pub use normalize::Normalizer;
pub use oracle::{FixedSdk, MemoryOracle, OracleBuilder, Pubspec, SdkProbe, SolveMode, VersionOracle, VersionsLookup};
pub use package::{same_package, PackageDep, PackageId, PackageRef};
pub use range::{VersionConstraint, VersionRange};
pub use report::{
    DefaultStringReportFormatter, DefaultStringReporter, DerivationTree, Derived, External, ReportFormatter, TermMap,
};
pub use solver::{resolve, resolve_with_sink, DecisionSink, SolveConfig, SolveResult};
pub use term::{Clause, Term};
pub use version::{Version, VersionParseError};
