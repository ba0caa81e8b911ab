// SPDX-License-Identifier: MPL-2.0

//! Property tests over the `VersionConstraint` set algebra and the
//! `Normalizer`'s maximality guarantee.

use proptest::prelude::*;

use semver_solve::{Normalizer, Version, VersionConstraint, VersionRange};

fn arb_version() -> impl Strategy<Value = Version> {
    (0u64..6, 0u64..6, 0u64..6).prop_map(|(major, minor, patch)| Version::new(major, minor, patch))
}

/// A handful of closed or half-open ranges built from small versions, so
/// intersections and unions actually overlap often enough to be interesting.
fn arb_range() -> impl Strategy<Value = VersionRange> {
    prop_oneof![
        arb_version().prop_map(VersionRange::exact),
        (arb_version(), any::<bool>()).prop_map(|(v, inc)| VersionRange::at_least(v, inc)),
        (arb_version(), any::<bool>()).prop_map(|(v, inc)| VersionRange::at_most(v, inc)),
        arb_version().prop_map(VersionRange::caret),
        (arb_version(), any::<bool>(), arb_version(), any::<bool>()).prop_filter_map(
            "only well-formed bounds produce a range",
            |(lo, inc_lo, hi, inc_hi)| VersionRange::between(lo, inc_lo, hi, inc_hi),
        ),
    ]
}

fn arb_constraint() -> impl Strategy<Value = VersionConstraint> {
    prop::collection::vec(arb_range(), 0..4).prop_map(VersionConstraint::from_ranges)
}

proptest! {
    #[test]
    fn intersect_allows_exactly_what_both_sides_allow(a in arb_constraint(), b in arb_constraint(), v in arb_version()) {
        let allowed = a.intersect(&b).allows(&v);
        prop_assert_eq!(allowed, a.allows(&v) && b.allows(&v));
    }

    #[test]
    fn union_allows_exactly_what_either_side_allows(a in arb_constraint(), b in arb_constraint(), v in arb_version()) {
        let allowed = a.union(&b).allows(&v);
        prop_assert_eq!(allowed, a.allows(&v) || b.allows(&v));
    }

    #[test]
    fn complement_allows_exactly_what_the_original_does_not(a in arb_constraint(), v in arb_version()) {
        prop_assert_eq!(a.complement().allows(&v), !a.allows(&v));
    }

    #[test]
    fn difference_allows_exactly_a_without_b(a in arb_constraint(), b in arb_constraint(), v in arb_version()) {
        let allowed = a.difference(&b).allows(&v);
        prop_assert_eq!(allowed, a.allows(&v) && !b.allows(&v));
    }

    #[test]
    fn allows_all_agrees_with_difference_being_empty(a in arb_constraint(), b in arb_constraint()) {
        prop_assert_eq!(a.allows_all(&b), b.difference(&a).is_empty());
    }

    #[test]
    fn maximize_never_changes_which_base_versions_are_allowed(
        mut base in prop::collection::vec(arb_version(), 1..8),
        c in arb_constraint(),
    ) {
        base.sort();
        base.dedup();
        let normalizer = Normalizer::new(base.clone());
        let maximized = normalizer.maximize(&c);
        for version in &base {
            prop_assert_eq!(
                maximized.allows(version),
                c.allows(version),
                "maximize must preserve membership of every base version"
            );
        }
    }

    #[test]
    fn maximize_is_idempotent(mut base in prop::collection::vec(arb_version(), 1..8), c in arb_constraint()) {
        base.sort();
        base.dedup();
        let normalizer = Normalizer::new(base);
        let once = normalizer.maximize(&c);
        let twice = normalizer.maximize(&once);
        prop_assert_eq!(once, twice);
    }
}
