// SPDX-License-Identifier: MPL-2.0

//! Integration-style resolution scenarios against [`MemoryOracle`], built
//! against the public `resolve` entry point rather than any solver internal.

use semver_solve::{
    resolve, FixedSdk, OracleBuilder, PackageDep, PackageId, PackageRef, Pubspec, SolveConfig, SolveError, SolveMode,
    VersionConstraint, VersionRange,
};

fn v(s: &str) -> semver_solve::Version {
    s.parse().unwrap()
}

fn pkg(name: &str) -> PackageRef {
    PackageRef::named(name)
}

fn caret(s: &str) -> VersionConstraint {
    VersionRange::caret(v(s)).into()
}

fn dart_sdk() -> FixedSdk {
    FixedSdk::dart_only(v("3.0.0"))
}

#[test]
fn selects_highest_allowed_version_under_get() {
    let foo = pkg("foo");
    let oracle = OracleBuilder::new()
        .add(PackageId::new(foo.clone(), v("1.0.0")), Pubspec::new(vec![]))
        .add(PackageId::new(foo.clone(), v("1.0.1")), Pubspec::new(vec![]))
        .add(PackageId::new(foo.clone(), v("2.0.0")), Pubspec::new(vec![]))
        .build();

    let result = resolve(
        &oracle,
        &dart_sdk(),
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::new(foo.clone(), caret("1.0.0"))],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap();

    assert_eq!(result.decision_for("foo").unwrap().version, v("1.0.1"));
}

#[test]
fn conflicting_transitive_requirement_fails_with_a_traceable_explanation() {
    let foo = pkg("foo");
    let bar = pkg("bar");
    let oracle = OracleBuilder::new()
        .add(PackageId::new(foo.clone(), v("1.0.0")), Pubspec::new(vec![]))
        .add(PackageId::new(foo.clone(), v("2.0.0")), Pubspec::new(vec![]))
        .add(
            PackageId::new(bar.clone(), v("1.0.0")),
            Pubspec::new(vec![PackageDep::new(foo.clone(), caret("2.0.0"))]),
        )
        .build();

    let err = resolve(
        &oracle,
        &dart_sdk(),
        pkg("root"),
        v("1.0.0"),
        vec![
            PackageDep::new(foo.clone(), caret("1.0.0")),
            PackageDep::new(bar.clone(), caret("1.0.0")),
        ],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap_err();

    let SolveError::NoSolution(no_solution) = err else {
        panic!("expected NoSolution, got {err:?}");
    };
    let explanation = no_solution.explain();
    assert!(explanation.contains("foo"), "explanation should mention foo: {explanation}");
    assert!(explanation.contains("bar"), "explanation should mention bar: {explanation}");
}

#[test]
fn sdk_gate_skips_incompatible_versions_and_selects_the_compatible_one() {
    let foo = pkg("foo");
    let oracle = OracleBuilder::new()
        .add(
            PackageId::new(foo.clone(), v("0.9.0")),
            Pubspec::new(vec![]).with_dart_sdk(VersionRange::at_least(v("2.0.0"), true).into()),
        )
        .add(
            PackageId::new(foo.clone(), v("1.0.0")),
            Pubspec::new(vec![]).with_dart_sdk(VersionRange::at_least(v("3.0.0"), true).into()),
        )
        .build();

    // Host Dart SDK is 2.18.0: too old for foo 1.0.0, new enough for foo 0.9.0.
    let sdk = FixedSdk::dart_only(v("2.18.0"));

    let result = resolve(
        &oracle,
        &sdk,
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::any(foo.clone())],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap();

    assert_eq!(result.decision_for("foo").unwrap().version, v("0.9.0"));
}

#[test]
fn downgrade_mode_selects_the_lowest_allowed_version() {
    let foo = pkg("foo");
    let oracle = OracleBuilder::new()
        .add(PackageId::new(foo.clone(), v("1.0.0")), Pubspec::new(vec![]))
        .add(PackageId::new(foo.clone(), v("1.1.0")), Pubspec::new(vec![]))
        .add(PackageId::new(foo.clone(), v("2.0.0")), Pubspec::new(vec![]))
        .build();

    let result = resolve(
        &oracle,
        &dart_sdk(),
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::new(foo.clone(), VersionRange::at_least(v("1.0.0"), true).into())],
        SolveConfig::new(SolveMode::Downgrade),
    )
    .unwrap();

    assert_eq!(result.decision_for("foo").unwrap().version, v("1.0.0"));
}

#[test]
fn backjump_truncates_decisions_past_the_unique_alternative() {
    // root -> a (one version) -> b (one version) -> c, where a has two
    // candidate versions but only a 1.0.0 leads anywhere: a 2.0.0 requires a
    // c version that does not exist, so the solve must backjump all the way
    // past b and c to reconsider a, landing on a 1.0.0 with the rest of the
    // chain decided underneath it.
    let a = pkg("a");
    let b = pkg("b");
    let c = pkg("c");
    let oracle = OracleBuilder::new()
        .add(
            PackageId::new(a.clone(), v("2.0.0")),
            Pubspec::new(vec![PackageDep::new(c.clone(), caret("9.0.0"))]),
        )
        .add(
            PackageId::new(a.clone(), v("1.0.0")),
            Pubspec::new(vec![PackageDep::new(b.clone(), caret("1.0.0"))]),
        )
        .add(
            PackageId::new(b.clone(), v("1.0.0")),
            Pubspec::new(vec![PackageDep::new(c.clone(), caret("1.0.0"))]),
        )
        .add(PackageId::new(c.clone(), v("1.0.0")), Pubspec::new(vec![]))
        .build();

    let result = resolve(
        &oracle,
        &dart_sdk(),
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::new(a.clone(), VersionRange::at_least(v("1.0.0"), true).into())],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap();

    assert_eq!(result.decision_for("a").unwrap().version, v("1.0.0"));
    assert_eq!(result.decision_for("b").unwrap().version, v("1.0.0"));
    assert_eq!(result.decision_for("c").unwrap().version, v("1.0.0"));
}

#[test]
fn adjacent_versions_sharing_an_sdk_rejection_are_reported_as_one_range() {
    // foo 1.0.0 and 1.1.0 both require a too-new Dart SDK; 0.9.0 does not.
    // The gate should learn a single prohibition spanning the whole
    // incompatible run rather than rejecting each version independently.
    let foo = pkg("foo");
    let too_new: VersionConstraint = VersionRange::at_least(v("3.0.0"), true).into();
    let oracle = OracleBuilder::new()
        .add(PackageId::new(foo.clone(), v("0.9.0")), Pubspec::new(vec![]))
        .add(
            PackageId::new(foo.clone(), v("1.0.0")),
            Pubspec::new(vec![]).with_dart_sdk(too_new.clone()),
        )
        .add(
            PackageId::new(foo.clone(), v("1.1.0")),
            Pubspec::new(vec![]).with_dart_sdk(too_new),
        )
        .build();

    let result = resolve(
        &oracle,
        &FixedSdk::dart_only(v("2.18.0")),
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::any(foo.clone())],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap();

    assert_eq!(result.decision_for("foo").unwrap().version, v("0.9.0"));
}

#[test]
fn missing_package_fails_rather_than_hanging() {
    let oracle = OracleBuilder::new().build();

    let err = resolve(
        &oracle,
        &dart_sdk(),
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::any(pkg("ghost"))],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap_err();

    assert!(matches!(err, SolveError::NoSolution(_)));
}

#[test]
fn repeated_solves_over_the_same_oracle_are_deterministic() {
    let foo = pkg("foo");
    let bar = pkg("bar");
    let oracle = OracleBuilder::new()
        .add(PackageId::new(foo.clone(), v("1.0.0")), Pubspec::new(vec![]))
        .add(PackageId::new(foo.clone(), v("1.1.0")), Pubspec::new(vec![]))
        .add(
            PackageId::new(bar.clone(), v("1.0.0")),
            Pubspec::new(vec![PackageDep::new(foo.clone(), caret("1.0.0"))]),
        )
        .build();

    let run = || {
        resolve(
            &oracle,
            &dart_sdk(),
            pkg("root"),
            v("1.0.0"),
            vec![PackageDep::new(bar.clone(), caret("1.0.0"))],
            SolveConfig::new(SolveMode::Get),
        )
        .unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.decisions, second.decisions);
}

#[test]
fn flutter_requirement_rejects_when_flutter_is_unavailable() {
    let foo = pkg("foo");
    let oracle = OracleBuilder::new()
        .add(
            PackageId::new(foo.clone(), v("1.0.0")),
            Pubspec::new(vec![]).with_flutter_sdk(VersionConstraint::any()),
        )
        .add(PackageId::new(foo.clone(), v("0.9.0")), Pubspec::new(vec![]))
        .build();

    // No Flutter SDK at all: only the version with no Flutter requirement is eligible.
    let result = resolve(
        &oracle,
        &dart_sdk(),
        pkg("root"),
        v("1.0.0"),
        vec![PackageDep::any(foo.clone())],
        SolveConfig::new(SolveMode::Get),
    )
    .unwrap();

    assert_eq!(result.decision_for("foo").unwrap().version, v("0.9.0"));
}
