// SPDX-License-Identifier: MPL-2.0

//! Clause index, decision stack, and unit propagation with
//! non-chronological backjumping.
//!
//! Decisions and accumulated constraints live in parallel stacks: a `Vec`
//! snapshot is pushed before each decision and restored wholesale on
//! backjump, rather than as per-level diffs.

use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::constraint::{satisfaction, Constraint, Satisfaction};
use crate::package::{PackageDep, PackageId, PackageRef};
use crate::report::{Derived, DerivationTree, External, TermMap};
use crate::term::{Clause, Term};
use crate::version::Version;

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Why an incompatibility holds, independent of its clause form. Either the
/// leaf of a derivation tree, or a pointer to the two incompatibilities it
/// was resolved from.
#[derive(Debug, Clone)]
pub enum Cause {
    NotRoot(PackageRef, Version),
    Prohibited(PackageDep),
    SdkIncompatible(PackageDep, String),
    Dependency(PackageDep, PackageDep),
    Derived(usize, usize),
}

/// A clause plus the reason it holds.
#[derive(Debug, Clone)]
pub struct Incompatibility {
    pub clause: Clause,
    pub cause: Cause,
}

#[derive(Debug, Clone)]
struct Implication {
    /// The other terms of the clause that forced this one.
    reason: Vec<Term>,
    /// The incompatibility whose propagation derived it.
    source: usize,
}

/// The result of checking whether a clause still has room to be satisfied.
enum UnitOutcome {
    /// Already satisfied, or more than one term could still go either way:
    /// nothing to propagate yet.
    Holds,
    /// Exactly one term is not yet ruled out; it must hold.
    Unit(Term),
    /// Every term is ruled out.
    Contradiction,
}

/// A conflict that could not be resolved locally: the solve has failed.
pub struct GlobalConflict {
    pub root_incompatibility: usize,
}

pub struct State {
    incompatibilities: Vec<Incompatibility>,
    clauses_by_name: FxIndexMap<String, Vec<usize>>,
    decisions: Vec<PackageId>,
    decisions_by_name: FxIndexMap<String, PackageId>,
    constraints: FxIndexMap<String, Constraint>,
    constraints_stack: Vec<FxIndexMap<String, Constraint>>,
    implications: FxIndexMap<String, Implication>,
    implications_stack: Vec<FxIndexMap<String, Implication>>,
}

impl State {
    pub fn new() -> Self {
        Self {
            incompatibilities: Vec::new(),
            clauses_by_name: FxIndexMap::default(),
            decisions: Vec::new(),
            decisions_by_name: FxIndexMap::default(),
            constraints: FxIndexMap::default(),
            constraints_stack: Vec::new(),
            implications: FxIndexMap::default(),
            implications_stack: Vec::new(),
        }
    }

    pub fn decisions(&self) -> &[PackageId] {
        &self.decisions
    }

    pub fn decision_for(&self, name: &str) -> Option<&PackageId> {
        self.decisions_by_name.get(name)
    }

    pub fn constraint_for(&self, name: &str) -> Option<&Constraint> {
        self.constraints.get(name)
    }

    pub fn clauses_for(&self, name: &str) -> impl Iterator<Item = &Incompatibility> {
        self.clauses_by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.incompatibilities[i])
    }

    /// Every incompatibility added so far, in learning order.
    pub(crate) fn incompatibilities(&self) -> &[Incompatibility] {
        &self.incompatibilities
    }

    /// The dep of the first accumulated constraint that fixes a single
    /// package instance, in the order packages first became constrained.
    pub(crate) fn find_positive_constraint(&self) -> Option<PackageDep> {
        self.constraints.values().find_map(|c| c.positive_dep().cloned())
    }

    /// `satisfaction(t)` against the current decisions and accumulated
    /// constraints: the same test [`State::unit_to_propagate`] uses,
    /// exposed for the decision loop's own clause scan.
    pub(crate) fn term_satisfaction(&self, term: &Term) -> Satisfaction {
        let name = &term.package().name;
        let decided = self.decisions_by_name.get(name).map(|id| &id.version);
        let constraint = self.constraints.get(name);
        satisfaction(term, decided, constraint)
    }

    /// Re-run unit propagation over every existing clause mentioning `name`,
    /// e.g. after a decision changes what satisfies them.
    pub(crate) fn recheck_clauses_for(&mut self, name: &str) -> Result<(), GlobalConflict> {
        let idxs = self.clauses_by_name.get(name).cloned().unwrap_or_default();
        for idx in idxs {
            self.process(idx)?;
        }
        Ok(())
    }

    /// Snapshot the current map state, append `id` to the decision stack,
    /// and subsume its per-package accumulated constraint (the concrete
    /// selection now speaks for it).
    pub fn push_decision(&mut self, id: PackageId) {
        self.constraints_stack.push(self.constraints.clone());
        self.implications_stack.push(self.implications.clone());
        self.decisions.push(id.clone());
        self.decisions_by_name.insert(id.package.name.clone(), id.clone());
        self.constraints.shift_remove(&id.package.name);
    }

    /// Add a clause to the index and immediately propagate its consequences.
    /// Grows `incompatibilities` monotonically: learned clauses are never
    /// retracted, only decisions and the snapshot stacks unwind.
    pub fn add_incompatibility(&mut self, clause: Clause, cause: Cause) -> Result<(), GlobalConflict> {
        let idx = self.incompatibilities.len();
        for term in clause.terms() {
            self.clauses_by_name
                .entry(term.package().name.clone())
                .or_default()
                .push(idx);
        }
        self.incompatibilities.push(Incompatibility { clause, cause });
        self.process(idx)
    }

    fn process(&mut self, idx: usize) -> Result<(), GlobalConflict> {
        match self.unit_to_propagate(idx) {
            UnitOutcome::Holds => Ok(()),
            UnitOutcome::Unit(u) => {
                let name = u.package().name.clone();
                let reason = self.incompatibilities[idx]
                    .clause
                    .terms()
                    .iter()
                    .filter(|t| **t != u)
                    .cloned()
                    .collect();
                self.propagate_unit(name, u, Implication { reason, source: idx })
            }
            UnitOutcome::Contradiction => self.resolve_conflict(idx),
        }
    }

    fn unit_to_propagate(&self, idx: usize) -> UnitOutcome {
        let clause = &self.incompatibilities[idx].clause;
        let mut satisfiable: Vec<Term> = Vec::new();
        for term in clause.terms() {
            let name = &term.package().name;
            let decided = self.decisions_by_name.get(name).map(|id| &id.version);
            let constraint = self.constraints.get(name);
            match satisfaction(term, decided, constraint) {
                Satisfaction::Satisfied => return UnitOutcome::Holds,
                Satisfaction::Satisfiable => satisfiable.push(term.clone()),
                Satisfaction::Unsatisfiable => {}
            }
        }
        match satisfiable.len() {
            0 => UnitOutcome::Contradiction,
            1 => UnitOutcome::Unit(satisfiable.into_iter().next().unwrap()),
            _ => UnitOutcome::Holds,
        }
    }

    /// Worklist over newly derived units: fold each into its package's
    /// accumulated constraint, and re-check every clause that mentions that
    /// package for a freshly forced unit or a contradiction.
    fn propagate_unit(&mut self, name: String, term: Term, implication: Implication) -> Result<(), GlobalConflict> {
        let mut worklist = vec![(name, term, implication)];
        while let Some((name, term, implication)) = worklist.pop() {
            let old = self.constraints.get(&name).cloned();
            let new = match &old {
                None => Constraint::from_term(&term),
                Some(c) => c.with_term(&term),
            };
            if Some(&new) == old.as_ref() {
                continue;
            }
            self.constraints.insert(name.clone(), new);
            self.implications.insert(name.clone(), implication);
            let clause_idxs = self.clauses_by_name.get(&name).cloned().unwrap_or_default();
            for idx in clause_idxs {
                match self.unit_to_propagate(idx) {
                    UnitOutcome::Holds => continue,
                    UnitOutcome::Unit(u) => {
                        let reason = self.incompatibilities[idx]
                            .clause
                            .terms()
                            .iter()
                            .filter(|t| **t != u)
                            .cloned()
                            .collect();
                        let next_name = u.package().name.clone();
                        worklist.push((next_name, u, Implication { reason, source: idx }));
                    }
                    UnitOutcome::Contradiction => {
                        return self.resolve_conflict(idx);
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve the clause at `conflicting_idx` (every term unsatisfiable)
    /// against the antecedent that most recently forced a term of it,
    /// learn the resulting clause, and backjump to the shallowest decision
    /// that could have caused this conflict.
    fn resolve_conflict(&mut self, conflicting_idx: usize) -> Result<(), GlobalConflict> {
        let conflict = self.incompatibilities[conflicting_idx].clone();
        // The package whose most recent derivation made this clause
        // contradictory: the one this clause shares with `implications`.
        let forced_name = conflict
            .clause
            .terms()
            .iter()
            .find(|t| self.implications.contains_key(&t.package().name))
            .map(|t| t.package().name.clone());

        let Some(forced_name) = forced_name else {
            // No term of this clause was ever derived via propagation: it
            // was contradictory the moment it was added, with no decisions
            // to undo.
            return Err(GlobalConflict {
                root_incompatibility: self.learn(conflicting_idx, conflicting_idx, Vec::new()),
            });
        };

        let antecedent = self.implications[&forced_name].source;
        let mut implicators: Vec<Term> = self.implications[&forced_name].reason.clone();
        for term in conflict.clause.terms() {
            if term.package().name != forced_name {
                implicators.push(term.clone());
            }
        }
        dedup_terms(&mut implicators);

        let targets = self.transitive_implicators(&implicators);
        match self.backjump_to(&targets) {
            Some(_) => {
                let learned_idx = self.learn(antecedent, conflicting_idx, implicators);
                self.process(learned_idx)
            }
            None => Err(GlobalConflict {
                root_incompatibility: self.learn(antecedent, conflicting_idx, implicators),
            }),
        }
    }

    fn learn(&mut self, antecedent: usize, conflicting: usize, terms: Vec<Term>) -> usize {
        let idx = self.incompatibilities.len();
        let clause = Clause::learned(terms);
        for term in clause.terms() {
            self.clauses_by_name
                .entry(term.package().name.clone())
                .or_default()
                .push(idx);
        }
        self.incompatibilities.push(Incompatibility {
            clause,
            cause: Cause::Derived(antecedent, conflicting),
        });
        idx
    }

    fn transitive_implicators(&self, terms: &[Term]) -> FxHashSet<PackageRef> {
        let mut seen_names: FxHashSet<String> = FxHashSet::default();
        let mut out: FxHashSet<PackageRef> = FxHashSet::default();
        let mut worklist: Vec<Term> = terms.to_vec();
        while let Some(t) = worklist.pop() {
            let name = t.package().name.clone();
            out.insert(t.package().clone());
            if seen_names.insert(name.clone()) {
                if let Some(imp) = self.implications.get(&name) {
                    worklist.extend(imp.reason.clone());
                }
            }
        }
        out
    }

    /// Undo every decision from the most recent one naming a package in
    /// `targets` onward, restoring the constraint/implication maps to
    /// exactly what they were before that decision was made.
    fn backjump_to(&mut self, targets: &FxHashSet<PackageRef>) -> Option<usize> {
        let i = self.decisions.iter().rposition(|id| targets.contains(&id.package))?;
        for id in &self.decisions[i..] {
            self.decisions_by_name.shift_remove(&id.package.name);
        }
        self.decisions.truncate(i);
        self.constraints = self.constraints_stack[i].clone();
        self.implications = self.implications_stack[i].clone();
        self.constraints_stack.truncate(i);
        self.implications_stack.truncate(i);
        Some(i)
    }

    /// Build the numbered failure explanation rooted at `idx`.
    pub fn build_derivation_tree(&self, idx: usize) -> DerivationTree {
        let mut counts: FxHashMap<usize, u32> = FxHashMap::default();
        self.count_refs(idx, &mut counts);
        let mut shared_ids: FxHashMap<usize, usize> = FxHashMap::default();
        let mut next_id = 0usize;
        self.build_tree(idx, &counts, &mut shared_ids, &mut next_id)
    }

    fn count_refs(&self, idx: usize, counts: &mut FxHashMap<usize, u32>) {
        *counts.entry(idx).or_insert(0) += 1;
        if let Cause::Derived(a, b) = self.incompatibilities[idx].cause {
            self.count_refs(a, counts);
            self.count_refs(b, counts);
        }
    }

    fn build_tree(
        &self,
        idx: usize,
        counts: &FxHashMap<usize, u32>,
        shared_ids: &mut FxHashMap<usize, usize>,
        next_id: &mut usize,
    ) -> DerivationTree {
        let incompat = &self.incompatibilities[idx];
        match &incompat.cause {
            Cause::NotRoot(p, v) => DerivationTree::External(External::NotRoot(p.clone(), v.clone())),
            Cause::Prohibited(dep) => DerivationTree::External(External::Prohibited(dep.clone())),
            Cause::SdkIncompatible(dep, reason) => {
                DerivationTree::External(External::SdkIncompatible(dep.clone(), reason.clone()))
            }
            Cause::Dependency(depender, target) => {
                DerivationTree::External(External::FromDependencyOf(depender.clone(), target.clone()))
            }
            Cause::Derived(a, b) => {
                let (a, b) = (*a, *b);
                let shared_id = if counts[&idx] > 1 {
                    Some(*shared_ids.entry(idx).or_insert_with(|| {
                        let id = *next_id;
                        *next_id += 1;
                        id
                    }))
                } else {
                    None
                };
                let mut terms = TermMap::new();
                for t in incompat.clause.terms() {
                    terms.insert(t.package().clone(), t.clone());
                }
                DerivationTree::Derived(Derived {
                    terms,
                    shared_id,
                    cause1: Box::new(self.build_tree(a, counts, shared_ids, next_id)),
                    cause2: Box::new(self.build_tree(b, counts, shared_ids, next_id)),
                })
            }
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_terms(terms: &mut Vec<Term>) {
    let mut seen: Vec<Term> = Vec::new();
    terms.retain(|t| {
        if seen.contains(t) {
            false
        } else {
            seen.push(t.clone());
            true
        }
    });
}
