// SPDX-License-Identifier: MPL-2.0

//! Version ranges and the constraints built out of them.
//!
//! A [`VersionRange`] is a single contiguous interval of versions. A
//! [`VersionConstraint`] is the set of versions allowed by zero or more such
//! intervals; it is kept normalized (sorted, pairwise non-overlapping and
//! non-touching) so that every accessor can assume a canonical shape.

use std::cmp::Ordering;
use std::fmt;

use crate::version::Version;

/// A contiguous interval of versions: `(min, max)`, each endpoint either
/// inclusive, exclusive, or unbounded.
///
/// A `VersionRange` is never empty: constructors and [`VersionRange::intersect`]
/// return `None` rather than produce a range with no members.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionRange {
    min: Option<Version>,
    include_min: bool,
    max: Option<Version>,
    include_max: bool,
}

impl VersionRange {
    /// The range containing every version.
    pub fn any() -> Self {
        Self {
            min: None,
            include_min: false,
            max: None,
            include_max: false,
        }
    }

    /// The range containing exactly one version.
    pub fn exact(v: Version) -> Self {
        Self {
            min: Some(v.clone()),
            include_min: true,
            max: Some(v),
            include_max: true,
        }
    }

    /// `v <= x` (or `v < x` if `inclusive` is false).
    pub fn at_least(v: Version, inclusive: bool) -> Self {
        Self {
            min: Some(v),
            include_min: inclusive,
            max: None,
            include_max: false,
        }
    }

    /// `x <= v` (or `x < v` if `inclusive` is false).
    pub fn at_most(v: Version, inclusive: bool) -> Self {
        Self {
            min: None,
            include_min: false,
            max: Some(v),
            include_max: inclusive,
        }
    }

    /// The half-open interval `[min, max)`, or `None` if it is empty.
    pub fn between(min: Version, include_min: bool, max: Version, include_max: bool) -> Option<Self> {
        let range = Self {
            min: Some(min),
            include_min,
            max: Some(max),
            include_max,
        };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// The caret range `^v`: `v <= x < v.next_breaking()`.
    pub fn caret(v: Version) -> Self {
        let ceiling = v.next_breaking();
        Self {
            min: Some(v),
            include_min: true,
            max: Some(ceiling),
            include_max: false,
        }
    }

    /// The widest range that stays "compatible with" `v` in the caret sense.
    /// An alias for [`VersionRange::caret`] under the name adjacency-range
    /// collapsing uses for it.
    pub fn compatible_with(v: Version) -> Self {
        Self::caret(v)
    }

    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    pub fn include_min(&self) -> bool {
        self.include_min
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn include_max(&self) -> bool {
        self.include_max
    }

    /// Whether this range, taken alone, contains no version.
    ///
    /// Only possible when both endpoints are the same version and at least
    /// one of them is exclusive (`between` already filters this out, but
    /// `VersionRange`s built by hand or by [`VersionRange::intersect`] can
    /// still reach this state).
    pub fn is_empty(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(lo), Some(hi)) => match lo.cmp(hi) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.include_min && self.include_max),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    pub fn contains(&self, v: &Version) -> bool {
        let above_min = match &self.min {
            None => true,
            Some(lo) => match v.cmp(lo) {
                Ordering::Greater => true,
                Ordering::Equal => self.include_min,
                Ordering::Less => false,
            },
        };
        let below_max = match &self.max {
            None => true,
            Some(hi) => match v.cmp(hi) {
                Ordering::Less => true,
                Ordering::Equal => self.include_max,
                Ordering::Greater => false,
            },
        };
        above_min && below_max
    }

    /// The overlap of two ranges, or `None` if they share no version.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let (min, include_min) = match lower_cmp(
            (self.min.as_ref(), self.include_min),
            (other.min.as_ref(), other.include_min),
        ) {
            Ordering::Greater => (self.min.clone(), self.include_min),
            _ => (other.min.clone(), other.include_min),
        };
        let (max, include_max) = match upper_cmp(
            (self.max.as_ref(), self.include_max),
            (other.max.as_ref(), other.include_max),
        ) {
            Ordering::Less => (self.max.clone(), self.include_max),
            _ => (other.max.clone(), other.include_max),
        };
        let range = Self {
            min,
            include_min,
            max,
            include_max,
        };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// True if `self`'s lower bound sits at or before `other`'s, so that a
    /// left-to-right merge scan can assume `self` comes first.
    fn starts_no_later_than(&self, other: &Self) -> bool {
        lower_cmp(
            (self.min.as_ref(), self.include_min),
            (other.min.as_ref(), other.include_min),
        ) != Ordering::Greater
    }

    /// Whether `self` (assumed to start no later than `other`) overlaps or
    /// touches `other`, so their union is itself a single contiguous range.
    fn meets(&self, other: &Self) -> bool {
        match (&self.max, &other.min) {
            (None, _) => true,
            (_, None) => true,
            (Some(hi), Some(lo)) => match hi.cmp(lo) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => self.include_max || other.include_min,
            },
        }
    }

    /// Merge two overlapping or touching ranges into one. Panics if they
    /// don't meet; callers must check [`VersionRange::meets`] first (or go
    /// through [`VersionConstraint`], which maintains that invariant).
    fn union_touching(&self, other: &Self) -> Self {
        debug_assert!(self.meets(other) || other.meets(self));
        let (min, include_min) = match lower_cmp(
            (self.min.as_ref(), self.include_min),
            (other.min.as_ref(), other.include_min),
        ) {
            Ordering::Greater => (other.min.clone(), other.include_min),
            _ => (self.min.clone(), self.include_min),
        };
        let (max, include_max) = match upper_cmp(
            (self.max.as_ref(), self.include_max),
            (other.max.as_ref(), other.include_max),
        ) {
            Ordering::Less => (other.max.clone(), other.include_max),
            _ => (self.max.clone(), self.include_max),
        };
        Self {
            min,
            include_min,
            max,
            include_max,
        }
    }
}

/// Ordering of two lower bounds by where they sit on the version line:
/// unbounded (`-inf`) first, then by version, and an inclusive bound sorts
/// before an exclusive bound at the same version (it covers one more point).
fn lower_cmp(a: (Option<&Version>, bool), b: (Option<&Version>, bool)) -> Ordering {
    match (a.0, b.0) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => av.cmp(bv).then_with(|| match (a.1, b.1) {
            (true, true) | (false, false) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }),
    }
}

/// Ordering of two upper bounds: unbounded (`+inf`) last, then by version,
/// and an inclusive bound sorts after an exclusive bound at the same version.
fn upper_cmp(a: (Option<&Version>, bool), b: (Option<&Version>, bool)) -> Ordering {
    match (a.0, b.0) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(av), Some(bv)) => av.cmp(bv).then_with(|| match (a.1, b.1) {
            (true, true) | (false, false) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
        }),
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (Some(v), None) => {
                write!(f, "{}{v}", if self.include_min { ">=" } else { ">" })
            }
            (None, Some(v)) => {
                write!(f, "{}{v}", if self.include_max { "<=" } else { "<" })
            }
            (Some(lo), Some(hi)) if lo == hi && self.include_min && self.include_max => {
                write!(f, "{lo}")
            }
            (Some(lo), Some(hi)) => write!(
                f,
                "{}{lo} {}{hi}",
                if self.include_min { ">=" } else { ">" },
                if self.include_max { "<=" } else { "<" },
            ),
        }
    }
}

/// The set of versions accepted by a package dependency: a union of
/// [`VersionRange`]s, kept sorted and merged so that no two stored ranges
/// overlap or touch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VersionConstraint {
    ranges: Vec<VersionRange>,
}

impl VersionConstraint {
    /// The constraint satisfied by no version.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// The constraint satisfied by every version.
    pub fn any() -> Self {
        Self {
            ranges: vec![VersionRange::any()],
        }
    }

    /// The constraint satisfied by exactly one version.
    pub fn exact(v: Version) -> Self {
        Self {
            ranges: vec![VersionRange::exact(v)],
        }
    }

    /// Build a normalized constraint from an arbitrary, possibly overlapping
    /// or unsorted, set of ranges.
    pub fn from_ranges(ranges: impl IntoIterator<Item = VersionRange>) -> Self {
        let mut ranges: Vec<VersionRange> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        ranges.sort_by(|a, b| {
            lower_cmp((a.min(), a.include_min()), (b.min(), b.include_min()))
        });
        let mut merged: Vec<VersionRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if last.meets(&range) => {
                    *last = last.union_touching(&range);
                }
                _ => merged.push(range),
            }
        }
        Self { ranges: merged }
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn allows(&self, v: &Version) -> bool {
        self.ranges.iter().any(|r| r.contains(v))
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::from_ranges(self.ranges.iter().cloned().chain(other.ranges.iter().cloned()))
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(r) = a.intersect(b) {
                    out.push(r);
                }
            }
        }
        Self::from_ranges(out)
    }

    /// The versions allowed by neither constraint.
    pub fn complement(&self) -> Self {
        if self.ranges.is_empty() {
            return Self::any();
        }
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut cursor: Option<(Option<Version>, bool)> = Some((None, false));
        for range in &self.ranges {
            if let Some((lo, lo_inclusive)) = cursor.take() {
                if let Some(hi) = range.min() {
                    let gap = VersionRange {
                        min: lo,
                        include_min: lo_inclusive,
                        max: Some(hi.clone()),
                        include_max: !range.include_min(),
                    };
                    if !gap.is_empty() {
                        out.push(gap);
                    }
                }
            }
            cursor = range.max().map(|hi| (Some(hi.clone()), !range.include_max()));
        }
        if let Some((lo, lo_inclusive)) = cursor {
            out.push(VersionRange {
                min: lo,
                include_min: lo_inclusive,
                max: None,
                include_max: false,
            });
        }
        Self::from_ranges(out)
    }

    /// The versions allowed by `self` but not by `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.intersect(&other.complement())
    }

    /// True if every version `other` allows is also allowed by `self`.
    pub fn allows_all(&self, other: &Self) -> bool {
        other.difference(self).is_empty()
    }

    /// True if some version is allowed by both `self` and `other`.
    pub fn allows_any(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return write!(f, "no versions");
        }
        if self.ranges.len() == 1 {
            return write!(f, "{}", self.ranges[0]);
        }
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            write!(f, "({r})")?;
        }
        Ok(())
    }
}

impl From<VersionRange> for VersionConstraint {
    fn from(r: VersionRange) -> Self {
        Self::from_ranges([r])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn contains_respects_inclusivity() {
        let r = VersionRange::between(v("1.0.0"), true, v("2.0.0"), false).unwrap();
        assert!(r.contains(&v("1.0.0")));
        assert!(r.contains(&v("1.9.9")));
        assert!(!r.contains(&v("2.0.0")));
    }

    #[test]
    fn between_rejects_empty_interval() {
        assert!(VersionRange::between(v("2.0.0"), false, v("2.0.0"), true).is_none());
        assert!(VersionRange::between(v("2.0.0"), true, v("2.0.0"), true).is_some());
    }

    #[test]
    fn intersect_narrows_bounds() {
        let a = VersionRange::between(v("1.0.0"), true, v("3.0.0"), false).unwrap();
        let b = VersionRange::between(v("2.0.0"), true, v("4.0.0"), false).unwrap();
        let got = a.intersect(&b).unwrap();
        assert_eq!(got.min(), Some(&v("2.0.0")));
        assert_eq!(got.max(), Some(&v("3.0.0")));
    }

    #[test]
    fn intersect_disjoint_ranges_is_none() {
        let a = VersionRange::between(v("1.0.0"), true, v("2.0.0"), false).unwrap();
        let b = VersionRange::at_least(v("2.0.0"), true);
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn touching_exclusive_inclusive_ranges_merge() {
        let a = VersionRange::between(v("1.0.0"), true, v("2.0.0"), false).unwrap();
        let b = VersionRange::at_least(v("2.0.0"), true);
        let merged = VersionConstraint::from_ranges([a, b]);
        assert_eq!(merged.ranges().len(), 1);
        assert!(merged.allows(&v("2.0.0")));
    }

    #[test]
    fn strictly_separate_ranges_stay_separate() {
        let a = VersionRange::between(v("1.0.0"), true, v("2.0.0"), false).unwrap();
        let b = VersionRange::at_least(v("3.0.0"), true);
        let c = VersionConstraint::from_ranges([a, b]);
        assert_eq!(c.ranges().len(), 2);
        assert!(!c.allows(&v("2.5.0")));
    }

    #[test]
    fn complement_of_any_is_empty_and_vice_versa() {
        assert!(VersionConstraint::any().complement().is_empty());
        assert_eq!(VersionConstraint::empty().complement(), VersionConstraint::any());
    }

    #[test]
    fn complement_punches_a_hole() {
        let c: VersionConstraint = VersionRange::between(v("1.0.0"), true, v("2.0.0"), false)
            .unwrap()
            .into();
        let comp = c.complement();
        assert!(comp.allows(&v("0.9.0")));
        assert!(comp.allows(&v("2.0.0")));
        assert!(!comp.allows(&v("1.5.0")));
    }

    #[test]
    fn allows_all_and_allows_any() {
        let wide: VersionConstraint = VersionRange::at_least(v("1.0.0"), true).into();
        let narrow: VersionConstraint =
            VersionRange::between(v("1.0.0"), true, v("2.0.0"), false).unwrap().into();
        assert!(wide.allows_all(&narrow));
        assert!(!narrow.allows_all(&wide));
        assert!(wide.allows_any(&narrow));
    }

    #[test]
    fn caret_excludes_next_breaking() {
        let c: VersionConstraint = VersionRange::caret(v("1.2.3")).into();
        assert!(c.allows(&v("1.9.9")));
        assert!(!c.allows(&v("2.0.0")));
    }

    #[test]
    fn display_formats_single_and_union_ranges() {
        let single: VersionConstraint =
            VersionRange::between(v("1.0.0"), true, v("2.0.0"), false).unwrap().into();
        assert_eq!(single.to_string(), ">=1.0.0 <2.0.0");

        let union = single.union(&VersionRange::at_least(v("3.0.0"), true).into());
        assert_eq!(union.to_string(), "(>=1.0.0 <2.0.0) || (>=3.0.0)");
    }
}
