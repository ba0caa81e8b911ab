// SPDX-License-Identifier: MPL-2.0

//! Turns a conflict derivation into a concise, numbered proof of why a
//! solve failed.
//!
//! `DerivationTree` splits into `External` (a leaf cause) and `Derived` (an
//! incompatibility resolved from two others). `DefaultStringReporter` walks
//! the tree once, assigning a citation number to every derivation referenced
//! more than once (tracked via `ref_count`/`shared_with_ref`) so a shared
//! sub-derivation is explained once and cited by number thereafter. The
//! final pass word-wraps the assembled lines with left-padded line numbers.

use std::fmt;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::package::{PackageDep, PackageRef};
use crate::term::Term;

/// Terms of a derived incompatibility, keyed by package for display,
/// insertion-ordered so the report text is reproducible.
pub type TermMap = IndexMap<PackageRef, Term>;

/// The proof that a solve failed: either a single external cause, or an
/// incompatibility derived from two others.
#[derive(Debug, Clone)]
pub enum DerivationTree {
    External(External),
    Derived(Derived),
}

/// A cause that is not itself derived from other incompatibilities.
#[derive(Debug, Clone)]
pub enum External {
    /// The initial incompatibility: we are solving for the root package.
    NotRoot(PackageRef, crate::version::Version),
    /// No version of this dependency satisfies its constraint (whether
    /// because the oracle reports none at all, or because every version it
    /// reports falls outside the constraint).
    Prohibited(PackageDep),
    /// Every version in the adjacent run rejects the current SDK; `reason`
    /// names which SDK and what it required.
    SdkIncompatible(PackageDep, String),
    /// `depender` depends on `target`.
    FromDependencyOf(PackageDep, PackageDep),
}

impl fmt::Display for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRoot(package, version) => {
                write!(f, "we are solving dependencies of {package} {version}")
            }
            Self::Prohibited(dep) => {
                if dep.constraint == crate::range::VersionConstraint::any() {
                    write!(f, "there is no available version for {}", dep.package)
                } else {
                    write!(f, "there is no version of {} in {}", dep.package, dep.constraint)
                }
            }
            Self::SdkIncompatible(dep, reason) => {
                write!(f, "{} requires {reason}", dep)
            }
            Self::FromDependencyOf(depender, target) => {
                let depender_full = depender.constraint == crate::range::VersionConstraint::any();
                let target_full = target.constraint == crate::range::VersionConstraint::any();
                match (depender_full, target_full) {
                    (true, true) => write!(f, "{} depends on {}", depender.package, target.package),
                    (true, false) => write!(f, "{} depends on {}", depender.package, target),
                    (false, true) => write!(f, "{depender} depends on {}", target.package),
                    (false, false) => write!(f, "{depender} depends on {target}"),
                }
            }
        }
    }
}

/// An incompatibility derived from two others.
#[derive(Debug, Clone)]
pub struct Derived {
    pub terms: TermMap,
    /// If this incompatibility appears more than once in the tree, the id
    /// shared across its occurrences so it is only explained once.
    pub shared_id: Option<usize>,
    pub cause1: Box<DerivationTree>,
    pub cause2: Box<DerivationTree>,
}

impl DerivationTree {
    pub fn packages(&self) -> FxHashSet<&PackageRef> {
        let mut out = FxHashSet::default();
        match self {
            Self::External(external) => match external {
                External::FromDependencyOf(depender, target) => {
                    out.insert(&depender.package);
                    out.insert(&target.package);
                }
                External::NotRoot(p, _) | External::Prohibited(PackageDep { package: p, .. })
                | External::SdkIncompatible(PackageDep { package: p, .. }, _) => {
                    out.insert(p);
                }
            },
            Self::Derived(derived) => {
                out.extend(derived.terms.keys());
                out.extend(derived.cause1.packages());
                out.extend(derived.cause2.packages());
            }
        }
        out
    }

    /// Fold a [`External::Prohibited`] leaf into whichever sibling cause it
    /// is paired with, removing redundant "there is no version of X" lines.
    pub fn collapse_prohibited(&mut self) {
        match self {
            Self::External(_) => {}
            Self::Derived(derived) => match (derived.cause1.deref_mut(), derived.cause2.deref_mut()) {
                (Self::External(External::Prohibited(dep)), other) => {
                    other.collapse_prohibited();
                    if let Some(merged) = other.clone().merge_prohibited(dep.clone()) {
                        *self = merged;
                    }
                }
                (other, Self::External(External::Prohibited(dep))) => {
                    other.collapse_prohibited();
                    if let Some(merged) = other.clone().merge_prohibited(dep.clone()) {
                        *self = merged;
                    }
                }
                _ => {
                    derived.cause1.collapse_prohibited();
                    derived.cause2.collapse_prohibited();
                }
            },
        }
    }

    fn merge_prohibited(self, dep: PackageDep) -> Option<Self> {
        match self {
            Self::Derived(_) => Some(self),
            Self::External(External::NotRoot(..)) => None,
            Self::External(External::Prohibited(existing)) => Some(Self::External(External::Prohibited(
                existing.with_constraint(existing.constraint.union(&dep.constraint)),
            ))),
            Self::External(External::SdkIncompatible(..)) => None,
            Self::External(External::FromDependencyOf(depender, target)) => {
                if depender.package == dep.package {
                    Some(Self::External(External::FromDependencyOf(
                        depender.with_constraint(depender.constraint.union(&dep.constraint)),
                        target,
                    )))
                } else {
                    Some(Self::External(External::FromDependencyOf(
                        depender,
                        target.with_constraint(target.constraint.union(&dep.constraint)),
                    )))
                }
            }
        }
    }
}

/// Formats the pieces `DefaultStringReporter` assembles into lines.
pub trait ReportFormatter {
    fn format_external(&self, external: &External) -> String;
    fn format_terms(&self, terms: &TermMap) -> String;
    fn explain_both_external(&self, e1: &External, e2: &External, current: &TermMap) -> String;
    fn explain_both_ref(
        &self,
        ref1: usize,
        d1: &Derived,
        ref2: usize,
        d2: &Derived,
        current: &TermMap,
    ) -> String;
    fn explain_ref_and_external(
        &self,
        ref_id: usize,
        derived: &Derived,
        external: &External,
        current: &TermMap,
    ) -> String;
    fn and_explain_external(&self, external: &External, current: &TermMap) -> String;
    fn and_explain_ref(&self, ref_id: usize, derived: &Derived, current: &TermMap) -> String;
    fn and_explain_prior_and_external(
        &self,
        prior: &External,
        external: &External,
        current: &TermMap,
    ) -> String;
}

#[derive(Default, Debug)]
pub struct DefaultStringReportFormatter;

impl ReportFormatter for DefaultStringReportFormatter {
    fn format_external(&self, external: &External) -> String {
        external.to_string()
    }

    fn format_terms(&self, terms: &TermMap) -> String {
        let terms_vec: Vec<_> = terms.iter().collect();
        match terms_vec.as_slice() {
            [] => "version solving failed".into(),
            [(_, t)] if !t.negative => format!("{} is forbidden", t.dep),
            [(_, t)] => format!("{} is mandatory", t.dep),
            [(_, t1), (_, t2)] if !t1.negative && t2.negative => {
                self.format_external(&External::FromDependencyOf(t1.dep.clone(), t2.dep.clone()))
            }
            [(_, t1), (_, t2)] if t1.negative && !t2.negative => {
                self.format_external(&External::FromDependencyOf(t2.dep.clone(), t1.dep.clone()))
            }
            slice => {
                let parts: Vec<_> = slice.iter().map(|(_, t)| t.to_string()).collect();
                format!("{} are incompatible", parts.join(", "))
            }
        }
    }

    fn explain_both_external(&self, e1: &External, e2: &External, current: &TermMap) -> String {
        format!(
            "Because {} and {}, {}.",
            self.format_external(e1),
            self.format_external(e2),
            self.format_terms(current)
        )
    }

    fn explain_both_ref(
        &self,
        ref1: usize,
        d1: &Derived,
        ref2: usize,
        d2: &Derived,
        current: &TermMap,
    ) -> String {
        format!(
            "Because {} ({ref1}) and {} ({ref2}), {}.",
            self.format_terms(&d1.terms),
            self.format_terms(&d2.terms),
            self.format_terms(current)
        )
    }

    fn explain_ref_and_external(
        &self,
        ref_id: usize,
        derived: &Derived,
        external: &External,
        current: &TermMap,
    ) -> String {
        format!(
            "Because {} ({ref_id}) and {}, {}.",
            self.format_terms(&derived.terms),
            self.format_external(external),
            self.format_terms(current)
        )
    }

    fn and_explain_external(&self, external: &External, current: &TermMap) -> String {
        format!("And because {}, {}.", self.format_external(external), self.format_terms(current))
    }

    fn and_explain_ref(&self, ref_id: usize, derived: &Derived, current: &TermMap) -> String {
        format!(
            "And because {} ({ref_id}), {}.",
            self.format_terms(&derived.terms),
            self.format_terms(current)
        )
    }

    fn and_explain_prior_and_external(
        &self,
        prior: &External,
        external: &External,
        current: &TermMap,
    ) -> String {
        format!(
            "And because {} and {}, {}.",
            self.format_external(prior),
            self.format_external(external),
            self.format_terms(current)
        )
    }
}

/// Builds the report line by line, tracking which lines earned a citation
/// number so later lines can refer back to them.
struct LineBuilder {
    ref_count: usize,
    shared_with_ref: FxHashMap<usize, usize>,
    lines: Vec<String>,
    /// Parallel to `lines`: the citation number assigned to that line, if any.
    refs: Vec<Option<usize>>,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            ref_count: 0,
            shared_with_ref: FxHashMap::default(),
            lines: Vec::new(),
            refs: Vec::new(),
        }
    }

    fn build_recursive(&mut self, derived: &Derived, formatter: &impl ReportFormatter) {
        self.build_recursive_helper(derived, formatter);
        if let Some(id) = derived.shared_id {
            if !self.shared_with_ref.contains_key(&id) {
                self.add_line_ref();
                self.shared_with_ref.insert(id, self.ref_count);
            }
        }
    }

    fn build_recursive_helper(&mut self, current: &Derived, formatter: &impl ReportFormatter) {
        match (current.cause1.deref(), current.cause2.deref()) {
            (DerivationTree::External(e1), DerivationTree::External(e2)) => {
                self.push_line(formatter.explain_both_external(e1, e2, &current.terms));
            }
            (DerivationTree::Derived(derived), DerivationTree::External(external))
            | (DerivationTree::External(external), DerivationTree::Derived(derived)) => {
                self.report_one_each(derived, external, &current.terms, formatter);
            }
            (DerivationTree::Derived(d1), DerivationTree::Derived(d2)) => {
                match (self.line_ref_of(d1.shared_id), self.line_ref_of(d2.shared_id)) {
                    (Some(r1), Some(r2)) => {
                        self.push_line(formatter.explain_both_ref(r1, d1, r2, d2, &current.terms));
                    }
                    (Some(r1), None) => {
                        self.build_recursive(d2, formatter);
                        self.push_line(formatter.and_explain_ref(r1, d1, &current.terms));
                    }
                    (None, Some(r2)) => {
                        self.build_recursive(d1, formatter);
                        self.push_line(formatter.and_explain_ref(r2, d2, &current.terms));
                    }
                    (None, None) => {
                        self.build_recursive(d1, formatter);
                        if d1.shared_id.is_some() {
                            self.build_recursive(current, formatter);
                        } else {
                            self.add_line_ref();
                            let r1 = self.ref_count;
                            self.build_recursive(d2, formatter);
                            self.push_line(formatter.and_explain_ref(r1, d1, &current.terms));
                        }
                    }
                }
            }
        }
    }

    fn report_one_each(
        &mut self,
        derived: &Derived,
        external: &External,
        current_terms: &TermMap,
        formatter: &impl ReportFormatter,
    ) {
        match self.line_ref_of(derived.shared_id) {
            Some(ref_id) => {
                self.push_line(formatter.explain_ref_and_external(ref_id, derived, external, current_terms));
            }
            None => self.report_recurse_one_each(derived, external, current_terms, formatter),
        }
    }

    fn report_recurse_one_each(
        &mut self,
        derived: &Derived,
        external: &External,
        current_terms: &TermMap,
        formatter: &impl ReportFormatter,
    ) {
        match (derived.cause1.deref(), derived.cause2.deref()) {
            (DerivationTree::Derived(prior_derived), DerivationTree::External(prior_external))
            | (DerivationTree::External(prior_external), DerivationTree::Derived(prior_derived)) => {
                self.build_recursive(prior_derived, formatter);
                self.push_line(formatter.and_explain_prior_and_external(prior_external, external, current_terms));
            }
            _ => {
                self.build_recursive(derived, formatter);
                self.push_line(formatter.and_explain_external(external, current_terms));
            }
        }
    }

    fn push_line(&mut self, line: String) {
        self.lines.push(line);
        self.refs.push(None);
    }

    fn add_line_ref(&mut self) {
        self.ref_count += 1;
        if let Some(r) = self.refs.last_mut() {
            *r = Some(self.ref_count);
        }
    }

    fn line_ref_of(&self, shared_id: Option<usize>) -> Option<usize> {
        shared_id.and_then(|id| self.shared_with_ref.get(&id).copied())
    }
}

/// Produces the final, word-wrapped failure explanation.
pub struct DefaultStringReporter;

impl DefaultStringReporter {
    pub fn report(tree: &DerivationTree) -> String {
        Self::report_with_formatter(tree, &DefaultStringReportFormatter)
    }

    pub fn report_with_formatter(tree: &DerivationTree, formatter: &impl ReportFormatter) -> String {
        match tree {
            DerivationTree::External(external) => formatter.format_external(external),
            DerivationTree::Derived(derived) => {
                let mut builder = LineBuilder::new();
                builder.build_recursive(derived, formatter);
                word_wrap(&builder.lines, &builder.refs)
            }
        }
    }
}

const WRAP_WIDTH: usize = 76;

/// Left-pads each numbered line with its citation number, right-aligned in
/// a fixed column, and wraps continuation lines under the same margin.
fn word_wrap(lines: &[String], refs: &[Option<usize>]) -> String {
    let max_ref = refs.iter().filter_map(|r| *r).max().unwrap_or(0);
    let number_width = max_ref.to_string().len();
    let margin = number_width + 2; // "N. "
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let prefix = match refs[i] {
            Some(n) => format!("{n:>number_width$}. "),
            None => " ".repeat(margin),
        };
        let wrapped = wrap_text(line, WRAP_WIDTH.saturating_sub(margin));
        for (j, part) in wrapped.iter().enumerate() {
            if j > 0 {
                out.push('\n');
            }
            if j == 0 {
                out.push_str(&prefix);
            } else {
                out.push_str(&" ".repeat(margin));
            }
            out.push_str(part);
        }
    }
    out
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRef;
    use crate::range::VersionRange;
    use crate::version::Version;

    fn dep(name: &str) -> PackageDep {
        PackageDep::any(PackageRef::named(name))
    }

    #[test]
    fn external_prohibited_reports_no_available_version() {
        let external = External::Prohibited(dep("foo"));
        assert_eq!(external.to_string(), "there is no available version for foo");
    }

    #[test]
    fn external_prohibited_with_range_names_the_range() {
        let narrowed = dep("foo").with_constraint(VersionRange::at_least("2.0.0".parse().unwrap(), true).into());
        let external = External::Prohibited(narrowed);
        assert_eq!(external.to_string(), "there is no version of foo in >=2.0.0");
    }

    #[test]
    fn from_dependency_of_full_ranges_omits_constraints() {
        let external = External::FromDependencyOf(dep("a"), dep("b"));
        assert_eq!(external.to_string(), "a depends on b");
    }

    #[test]
    fn simplest_report_combines_two_externals() {
        let mut terms = TermMap::new();
        terms.insert(PackageRef::named("root"), Term::positive(dep("root")));
        let tree = DerivationTree::Derived(Derived {
            terms,
            shared_id: None,
            cause1: Box::new(DerivationTree::External(External::NotRoot(
                PackageRef::named("root"),
                Version::new(1, 0, 0),
            ))),
            cause2: Box::new(DerivationTree::External(External::Prohibited(dep("foo")))),
        });
        let report = DefaultStringReporter::report(&tree);
        assert!(report.contains("Because"));
        assert!(report.contains("root is mandatory") || report.contains("root is forbidden"));
    }

    #[test]
    fn word_wrap_splits_long_lines_and_aligns_margin() {
        let lines = vec!["x ".repeat(60)];
        let refs = vec![Some(1)];
        let wrapped = word_wrap(&lines, &refs);
        assert!(wrapped.starts_with("1. "));
        assert!(wrapped.lines().count() > 1);
        assert!(wrapped.lines().nth(1).unwrap().starts_with("   "));
    }
}
