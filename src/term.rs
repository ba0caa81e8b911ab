// SPDX-License-Identifier: MPL-2.0

//! Signed atomic predicates over a package's version, and the clauses built
//! out of them.

use std::fmt;

use crate::package::{PackageDep, PackageRef};
use crate::version::Version;

/// A signed predicate: "selecting from `dep.constraint`" (positive) or its
/// negation (negative). Positive term *t* is satisfied by an assignment of
/// version `v` iff `t.dep.allows(v)`; a negative term negates that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub dep: PackageDep,
    pub negative: bool,
}

impl Term {
    pub fn positive(dep: PackageDep) -> Self {
        Self { dep, negative: false }
    }

    pub fn negative(dep: PackageDep) -> Self {
        Self { dep, negative: true }
    }

    pub fn package(&self) -> &PackageRef {
        &self.dep.package
    }

    /// Whether the assignment `v` satisfies this term.
    pub fn satisfied_by(&self, v: &Version) -> bool {
        self.dep.allows(v) != self.negative
    }

    /// The same predicate over the same package, opposite sign.
    pub fn negate(&self) -> Self {
        Self {
            dep: self.dep.clone(),
            negative: !self.negative,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "not {}", self.dep)
        } else {
            write!(f, "{}", self.dep)
        }
    }
}

/// A disjunction of terms. The three canonical shapes a solve constructs:
/// a bare requirement `[+d]`, a prohibition `[-d]`, and a dependency edge
/// `[-a, +b]` ("selecting from a implies selecting from b").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    terms: Vec<Term>,
}

impl Clause {
    /// The root (or a caller) demands a dependency outright.
    pub fn requirement(dep: PackageDep) -> Self {
        Self {
            terms: vec![Term::positive(dep)],
        }
    }

    /// No selection in `dep`'s range is allowed.
    pub fn prohibition(dep: PackageDep) -> Self {
        Self {
            terms: vec![Term::negative(dep)],
        }
    }

    /// Selecting from `depender` implies selecting from `target`:
    /// `[-depender, +target]`.
    pub fn dependency(depender: PackageDep, target: PackageDep) -> Self {
        Self {
            terms: vec![Term::negative(depender), Term::positive(target)],
        }
    }

    /// A clause built from an arbitrary learned set of terms (conflict
    /// resolution's output).
    pub fn learned(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "⊥");
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::VersionRange;

    fn dep(name: &str) -> PackageDep {
        PackageDep::any(PackageRef::named(name))
    }

    #[test]
    fn negate_flips_sign_and_keeps_dep() {
        let t = Term::positive(dep("foo"));
        let n = t.negate();
        assert!(n.negative);
        assert_eq!(n.dep, t.dep);
        assert_eq!(n.negate(), t);
    }

    #[test]
    fn satisfied_by_respects_sign() {
        let v: Version = "1.0.0".parse().unwrap();
        let d = PackageDep::new(
            PackageRef::named("foo"),
            VersionRange::at_least(v.clone(), true).into(),
        );
        assert!(Term::positive(d.clone()).satisfied_by(&v));
        assert!(!Term::negative(d).satisfied_by(&v));
    }

    #[test]
    fn dependency_clause_has_negative_depender_and_positive_target() {
        let c = Clause::dependency(dep("a"), dep("b"));
        assert_eq!(c.terms().len(), 2);
        assert!(c.terms()[0].negative);
        assert!(!c.terms()[1].negative);
    }
}
