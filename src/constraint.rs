// SPDX-License-Identifier: MPL-2.0

//! Per-package accumulated state, and the satisfaction test that drives
//! unit propagation.

use std::fmt;

use crate::package::{same_package, PackageDep};
use crate::term::Term;
use crate::version::Version;

/// The running evidence accumulated about one package across the terms
/// propagation has derived so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The intersection of every positive obligation seen for this package:
    /// exactly one dep (one package instance), the deps narrowed so far.
    Positive(PackageDep),
    /// A non-empty list of deps, all naming this package, each a disjoint
    /// forbidden subrange (distinguished by source/description when more
    /// than one package instance of the same name is in play).
    Negative(Vec<PackageDep>),
}

impl Constraint {
    /// The initial constraint derived from a single term.
    pub fn from_term(t: &Term) -> Self {
        if t.negative {
            Self::Negative(vec![t.dep.clone()])
        } else {
            Self::Positive(t.dep.clone())
        }
    }

    /// The positive dep, if this constraint fixes a single package instance.
    pub fn positive_dep(&self) -> Option<&PackageDep> {
        match self {
            Self::Positive(dep) => Some(dep),
            Self::Negative(_) => None,
        }
    }

    /// Fold additional evidence `t` into this constraint. `t.dep.package.name`
    /// must match this constraint's package name.
    pub fn with_term(&self, t: &Term) -> Self {
        match self {
            Self::Positive(dep) => {
                if !same_package(&dep.package, &t.dep.package) {
                    // A term about a different instance of the same name is
                    // independent of a fixed positive obligation.
                    return self.clone();
                }
                if t.negative {
                    Self::Positive(dep.with_constraint(dep.constraint.difference(&t.dep.constraint)))
                } else {
                    Self::Positive(dep.with_constraint(dep.constraint.intersect(&t.dep.constraint)))
                }
            }
            Self::Negative(deps) => {
                let matching = deps.iter().position(|d| same_package(&d.package, &t.dep.package));
                if t.negative {
                    match matching {
                        Some(i) => {
                            let mut deps = deps.clone();
                            let merged = deps[i]
                                .with_constraint(deps[i].constraint.union(&t.dep.constraint));
                            deps[i] = merged;
                            Self::Negative(deps)
                        }
                        None => {
                            let mut deps = deps.clone();
                            deps.push(t.dep.clone());
                            Self::Negative(deps)
                        }
                    }
                } else {
                    match matching {
                        Some(i) => Self::Positive(
                            t.dep.with_constraint(t.dep.constraint.difference(&deps[i].constraint)),
                        ),
                        None => Self::Positive(t.dep.clone()),
                    }
                }
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive(dep) => write!(f, "{dep}"),
            Self::Negative(deps) => {
                for (i, d) in deps.iter().enumerate() {
                    if i > 0 {
                        write!(f, " and ")?;
                    }
                    write!(f, "not {d}")?;
                }
                Ok(())
            }
        }
    }
}

/// The result of checking a term against the current partial assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfaction {
    /// True under every completion of the current partial assignment.
    Satisfied,
    /// True under some, but not all, completions.
    Satisfiable,
    /// True under no completion.
    Unsatisfiable,
}

/// `satisfaction(t)` relative to the current state: `decided`, if the
/// package already has a concrete selection, otherwise `constraint`, the
/// accumulated evidence (if any).
pub fn satisfaction(t: &Term, decided: Option<&Version>, constraint: Option<&Constraint>) -> Satisfaction {
    if let Some(version) = decided {
        return if t.satisfied_by(version) {
            Satisfaction::Satisfied
        } else {
            Satisfaction::Unsatisfiable
        };
    }
    let Some(constraint) = constraint else {
        return Satisfaction::Satisfiable;
    };
    match constraint {
        Constraint::Positive(c) => {
            if !t.negative {
                if t.dep.allows_all(c) {
                    Satisfaction::Satisfied
                } else if t.dep.allows_any(c) {
                    Satisfaction::Satisfiable
                } else {
                    Satisfaction::Unsatisfiable
                }
            } else if c.constraint.allows_all(&t.dep.constraint) {
                Satisfaction::Unsatisfiable
            } else {
                Satisfaction::Satisfiable
            }
        }
        Constraint::Negative(cs) => {
            let subsumed = cs.iter().any(|c| c.constraint.allows_all(&t.dep.constraint));
            if subsumed {
                if t.negative {
                    Satisfaction::Satisfied
                } else {
                    Satisfaction::Unsatisfiable
                }
            } else {
                Satisfaction::Satisfiable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRef;
    use crate::range::VersionRange;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn dep_ge(name: &str, min: &str) -> PackageDep {
        PackageDep::new(PackageRef::named(name), VersionRange::at_least(v(min), true).into())
    }

    #[test]
    fn with_term_idempotence() {
        let t = Term::positive(dep_ge("foo", "1.0.0"));
        let c = Constraint::from_term(&t);
        let once = c.with_term(&t);
        let twice = once.with_term(&t);
        assert_eq!(once, twice);
    }

    #[test]
    fn positive_intersect_narrows() {
        let base = Constraint::Positive(dep_ge("foo", "1.0.0"));
        let narrowed = base.with_term(&Term::positive(dep_ge("foo", "2.0.0")));
        let dep = narrowed.positive_dep().unwrap();
        assert!(!dep.allows(&v("1.5.0")));
        assert!(dep.allows(&v("2.5.0")));
    }

    #[test]
    fn positive_with_negative_subtracts() {
        let base = Constraint::Positive(dep_ge("foo", "1.0.0"));
        let narrowed = base.with_term(&Term::negative(dep_ge("foo", "2.0.0")));
        let dep = narrowed.positive_dep().unwrap();
        assert!(dep.allows(&v("1.5.0")));
        assert!(!dep.allows(&v("2.5.0")));
    }

    #[test]
    fn negative_then_positive_becomes_positive_restricted() {
        let base = Constraint::Negative(vec![dep_ge("foo", "2.0.0")]);
        let result = base.with_term(&Term::positive(dep_ge("foo", "1.0.0")));
        let dep = result.positive_dep().unwrap();
        assert!(dep.allows(&v("1.5.0")));
        assert!(!dep.allows(&v("2.5.0")));
    }

    #[test]
    fn satisfaction_decided_version_is_decisive() {
        let t = Term::positive(dep_ge("foo", "1.0.0"));
        assert_eq!(
            satisfaction(&t, Some(&v("2.0.0")), None),
            Satisfaction::Satisfied
        );
        assert_eq!(
            satisfaction(&t, Some(&v("0.5.0")), None),
            Satisfaction::Unsatisfiable
        );
    }

    #[test]
    fn satisfaction_no_constraint_is_satisfiable() {
        let t = Term::positive(dep_ge("foo", "1.0.0"));
        assert_eq!(satisfaction(&t, None, None), Satisfaction::Satisfiable);
    }

    #[test]
    fn satisfaction_against_positive_constraint() {
        let c = Constraint::Positive(dep_ge("foo", "1.0.0"));
        let subset = Term::positive(dep_ge("foo", "2.0.0"));
        assert_eq!(
            satisfaction(&subset, None, Some(&c)),
            Satisfaction::Satisfiable
        );
        let superset = Term::positive(PackageDep::any(PackageRef::named("foo")));
        assert_eq!(
            satisfaction(&superset, None, Some(&c)),
            Satisfaction::Satisfied
        );
    }
}
