// SPDX-License-Identifier: MPL-2.0

//! Rewrites ranges against the concrete versions that actually exist for a
//! package, so that equivalent constraints collapse to a canonical,
//! minimal-range form.
//!
//! One [`Normalizer`] per package, with a memoized lower-bound lookup since
//! the same base is reused across every `normalize_range` call made while
//! that package is in scope during a solve.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::range::{VersionConstraint, VersionRange};
use crate::version::Version;

/// Rewrites ranges against a fixed, sorted list of versions that actually
/// exist for one package (the package's *base*).
pub struct Normalizer {
    base: Vec<Version>,
    lower_bound_index_cache: RefCell<FxHashMap<Version, usize>>,
}

impl Normalizer {
    /// `base` need not be pre-sorted; it is sorted on construction.
    pub fn new(mut base: Vec<Version>) -> Self {
        base.sort();
        base.dedup();
        Self {
            base,
            lower_bound_index_cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn base(&self) -> &[Version] {
        &self.base
    }

    /// The least index `i` in `base` such that `base[i] >= v`, or `base.len()`
    /// if no such version exists. Memoized per `v`.
    fn lower_bound_index(&self, v: &Version) -> usize {
        if let Some(&i) = self.lower_bound_index_cache.borrow().get(v) {
            return i;
        }
        let i = self.base.partition_point(|b| b < v);
        self.lower_bound_index_cache.borrow_mut().insert(v.clone(), i);
        i
    }

    /// The smallest base version strictly greater than every version `r`
    /// allows, or `None` if `r` is unbounded above relative to the base.
    fn strict_least_upper_bound(&self, r: &VersionRange) -> Option<Version> {
        let max = r.max()?;
        let i = self.lower_bound_index(max);
        if i == self.base.len() {
            return None;
        }
        let b = &self.base[i];
        if !r.include_max() || b != max {
            Some(b.clone())
        } else {
            self.base.get(i + 1).cloned()
        }
    }

    /// Rewrite a single range so its upper bound snaps to the next existing
    /// base version (exclusive), leaving no gap that contains no real
    /// version. Unbounded-above ranges are returned unchanged.
    pub fn normalize_range(&self, r: &VersionRange) -> VersionRange {
        if r.max().is_none() {
            return r.clone();
        }
        match self.strict_least_upper_bound(r) {
            Some(bound) => match r.min() {
                Some(min) => VersionRange::between(min.clone(), r.include_min(), bound, false)
                    .unwrap_or_else(|| r.clone()),
                None => VersionRange::at_most(bound, false),
            },
            None => match r.min() {
                Some(min) => VersionRange::at_least(min.clone(), r.include_min()),
                None => VersionRange::any(),
            },
        }
    }

    /// Rewrite every range of `constraint` and rebuild the union. Ranges
    /// that, after normalization, leave no gap containing a real version
    /// merge naturally once [`VersionConstraint::from_ranges`] re-sorts them.
    pub fn maximize(&self, constraint: &VersionConstraint) -> VersionConstraint {
        VersionConstraint::from_ranges(constraint.ranges().iter().map(|r| self.normalize_range(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn base() -> Normalizer {
        Normalizer::new(vec![v("1.0.0"), v("2.0.0"), v("3.0.0")])
    }

    #[test]
    fn maximize_caret_collapses_to_adjacent_base_version() {
        let n = base();
        let caret: VersionConstraint = VersionRange::caret(v("1.0.0")).into();
        let got = n.maximize(&caret);
        let want: VersionConstraint = VersionRange::between(v("1.0.0"), true, v("2.0.0"), false)
            .unwrap()
            .into();
        assert_eq!(got, want);
    }

    #[test]
    fn maximize_merges_two_releases_spanning_a_gap() {
        let n = base();
        let input = VersionConstraint::from_ranges([
            VersionRange::exact(v("1.0.0")),
            VersionRange::exact(v("2.0.0")),
        ]);
        let got = n.maximize(&input);
        let want: VersionConstraint = VersionRange::between(v("1.0.0"), true, v("3.0.0"), false)
            .unwrap()
            .into();
        assert_eq!(got, want);
    }

    #[test]
    fn maximize_keeps_disjoint_releases_separate() {
        let n = base();
        let input = VersionConstraint::from_ranges([
            VersionRange::exact(v("1.0.0")),
            VersionRange::exact(v("3.0.0")),
        ]);
        let got = n.maximize(&input);
        assert_eq!(got.ranges().len(), 2);
        assert!(got.allows(&v("1.0.0")));
        assert!(got.allows(&v("3.0.0")));
        assert!(!got.allows(&v("2.0.0")));
    }

    #[test]
    fn normalize_range_is_idempotent() {
        let n = base();
        let r = VersionRange::caret(v("1.0.0"));
        let once = n.normalize_range(&r);
        let twice = n.normalize_range(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn unbounded_above_range_is_unaffected() {
        let n = base();
        let r = VersionRange::at_least(v("1.5.0"), true);
        assert_eq!(n.normalize_range(&r), r);
    }
}
