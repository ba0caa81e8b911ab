// SPDX-License-Identifier: MPL-2.0

//! The decision loop: picks a candidate package, gates it against the SDKs
//! in scope, decides it, and folds its dependencies into the clause index.
//! Drives [`crate::solver::state::State`] to either a complete assignment
//! or a [`crate::error::SolveError::NoSolution`].
//!
//! Talks to two narrow collaborators, [`crate::oracle::VersionOracle`] and
//! [`crate::oracle::SdkProbe`], and additionally runs an adjacency-range
//! search (`dep_where`) so candidates rejected by the SDK gate are learned
//! as a single prohibition over a whole run of versions rather than one
//! prohibition per version.

mod state;

use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

use crate::constraint::Satisfaction;
use crate::error::{NoSolutionError, SolveError};
use crate::normalize::Normalizer;
use crate::oracle::{Pubspec, SdkProbe, SolveMode, VersionOracle, VersionsLookup};
use crate::package::{PackageDep, PackageId, PackageRef};
use crate::range::{VersionConstraint, VersionRange};
use crate::term::Clause;
use crate::version::Version;

use state::{Cause, GlobalConflict, State};

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Tunables for one [`resolve`] call: which direction to prefer among
/// satisfying versions, and the ambient safety valves a real solve never
/// needs but a test fixture gone wrong might.
pub struct SolveConfig {
    pub mode: SolveMode,
    /// Abort with [`SolveError::Bug`] past this many decisions. `None`
    /// (the default) never checks. A test-only guard against a fixture
    /// whose oracle data loops forever.
    pub max_decisions: Option<usize>,
    should_cancel: Option<Box<dyn FnMut() -> bool>>,
}

impl SolveConfig {
    pub fn new(mode: SolveMode) -> Self {
        Self {
            mode,
            max_decisions: None,
            should_cancel: None,
        }
    }

    pub fn with_max_decisions(mut self, max: usize) -> Self {
        self.max_decisions = Some(max);
        self
    }

    /// Called once per decision-loop iteration, the single cooperative
    /// suspension point a caller may use to cancel a solve in progress.
    /// Returning `true` stops the solve with [`SolveError::Canceled`].
    pub fn with_cancellation(mut self, hook: impl FnMut() -> bool + 'static) -> Self {
        self.should_cancel = Some(Box::new(hook));
        self
    }
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self::new(SolveMode::Get)
    }
}

impl std::fmt::Debug for SolveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolveConfig")
            .field("mode", &self.mode)
            .field("max_decisions", &self.max_decisions)
            .field("should_cancel", &self.should_cancel.is_some())
            .finish()
    }
}

/// What a successful solve produced: the full decision stack (root
/// included), each decided package's manifest, and every version the oracle
/// reported while the solve was in progress (for a caller that wants to
/// report "2.1.0 was available but 2.0.4 was selected").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolveResult {
    pub root_package: PackageRef,
    pub decisions: Vec<PackageId>,
    pub pubspecs: IndexMap<String, Pubspec>,
    pub available_versions: IndexMap<String, Vec<Version>>,
}

impl SolveResult {
    pub fn decision_for(&self, name: &str) -> Option<&PackageId> {
        self.decisions.iter().find(|id| id.package.name == name)
    }
}

/// The final consumer of a solve: something that does what a lockfile
/// writer, a `pub get` summary printer, or a test assertion would do with
/// the decisions. Kept out of the solver itself, same as the oracle and
/// SDK probe.
pub trait DecisionSink {
    fn accept(&mut self, result: &SolveResult);
}

impl<F: FnMut(&SolveResult)> DecisionSink for F {
    fn accept(&mut self, result: &SolveResult) {
        self(result)
    }
}

/// Resolve `root_dependencies` against `oracle`, gated by `sdk`, per
/// `config`. On success, every transitive dependency has exactly one
/// selected version; on failure, the error carries a numbered explanation
/// of the conflict.
pub fn resolve<O: VersionOracle, S: SdkProbe>(
    oracle: &O,
    sdk: &S,
    root: PackageRef,
    root_version: Version,
    root_dependencies: Vec<PackageDep>,
    config: SolveConfig,
) -> Result<SolveResult, SolveError> {
    Resolver::new(oracle, sdk, config).run(root, root_version, root_dependencies)
}

/// Like [`resolve`], but also hands the result to `sink` before returning it.
pub fn resolve_with_sink<O: VersionOracle, S: SdkProbe>(
    oracle: &O,
    sdk: &S,
    root: PackageRef,
    root_version: Version,
    root_dependencies: Vec<PackageDep>,
    config: SolveConfig,
    sink: &mut impl DecisionSink,
) -> Result<SolveResult, SolveError> {
    let result = resolve(oracle, sdk, root, root_version, root_dependencies, config)?;
    sink.accept(&result);
    Ok(result)
}

fn oracle_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> SolveError {
    SolveError::OracleError(Box::new(e))
}

struct Resolver<'a, O: VersionOracle, S: SdkProbe> {
    oracle: &'a O,
    sdk: &'a S,
    config: SolveConfig,
    state: State,
    describe_cache: FxIndexMap<PackageId, Pubspec>,
    available_versions: FxIndexMap<PackageRef, Vec<Version>>,
    normalizers: FxIndexMap<PackageRef, Normalizer>,
}

impl<'a, O: VersionOracle, S: SdkProbe> Resolver<'a, O, S> {
    fn new(oracle: &'a O, sdk: &'a S, config: SolveConfig) -> Self {
        Self {
            oracle,
            sdk,
            config,
            state: State::new(),
            describe_cache: FxIndexMap::default(),
            available_versions: FxIndexMap::default(),
            normalizers: FxIndexMap::default(),
        }
    }

    fn conflict_to_error(&self, conflict: GlobalConflict) -> SolveError {
        let tree = self.state.build_derivation_tree(conflict.root_incompatibility);
        SolveError::NoSolution(NoSolutionError::new(tree))
    }

    fn run(
        mut self,
        root: PackageRef,
        root_version: Version,
        root_dependencies: Vec<PackageDep>,
    ) -> Result<SolveResult, SolveError> {
        log::info!("solving {root} {root_version} in {:?} mode", self.config.mode);

        let root_id = PackageId::new(root.clone(), root_version.clone());
        self.state.push_decision(root_id.clone());
        self.describe_cache
            .insert(root_id, Pubspec::new(root_dependencies.clone()));

        for dep in root_dependencies {
            self.state
                .add_incompatibility(
                    Clause::requirement(dep),
                    Cause::NotRoot(root.clone(), root_version.clone()),
                )
                .map_err(|c| self.conflict_to_error(c))?;
        }

        loop {
            if let Some(cancel) = self.config.should_cancel.as_mut() {
                if cancel() {
                    return Err(SolveError::Canceled);
                }
            }
            if let Some(max) = self.config.max_decisions {
                if self.state.decisions().len() > max {
                    return Err(SolveError::Bug(format!(
                        "exceeded max_decisions ({max}); likely a runaway oracle fixture"
                    )));
                }
            }
            let Some(id) = self.next_candidate()? else {
                log::info!("solve complete: {} packages decided", self.state.decisions().len());
                break;
            };
            self.select_version(id)?;
        }

        Ok(self.build_result(root))
    }

    /// Candidate selection: prefer a package already pinned to a
    /// single positive obligation, otherwise scan for the best satisfiable
    /// positive term of an unsatisfied clause. Recurses in place whenever
    /// resolving a candidate's best version only manages to learn a
    /// prohibition (no version satisfied it), since that can unblock or
    /// change what the next scan finds.
    fn next_candidate(&mut self) -> Result<Option<PackageId>, SolveError> {
        loop {
            if let Some(dep) = self.state.find_positive_constraint() {
                log::debug!("candidate from accumulated constraint: {dep}");
                if let Some(id) = self.best_version_for(&dep)? {
                    return Ok(Some(id));
                }
                continue;
            }
            let Some(dep) = self.find_satisfiable_candidate_term() else {
                return Ok(None);
            };
            log::debug!("candidate from unsatisfied clause: {dep}");
            if let Some(id) = self.best_version_for(&dep)? {
                return Ok(Some(id));
            }
        }
    }

    /// The satisfiable positive term of the unsatisfied clause whose dep
    /// allows the highest maximum version, skipping any clause that
    /// already has a satisfied term. Ranked with a
    /// `PriorityQueue<_, _, BuildHasherDefault<FxHasher>>`, keeping only the
    /// highest-ranked dep seen per package via `push_increase`.
    fn find_satisfiable_candidate_term(&self) -> Option<PackageDep> {
        let mut ranked: PriorityQueue<String, UpperBoundRank, BuildHasherDefault<FxHasher>> = PriorityQueue::default();
        let mut deps: FxIndexMap<String, PackageDep> = FxIndexMap::default();
        'clauses: for incompat in self.state.incompatibilities() {
            let mut candidate = None;
            for term in incompat.clause.terms() {
                match self.state.term_satisfaction(term) {
                    Satisfaction::Satisfied => continue 'clauses,
                    Satisfaction::Satisfiable if !term.negative => candidate = Some(&term.dep),
                    _ => {}
                }
            }
            if let Some(dep) = candidate {
                let rank = UpperBoundRank(upper_bound(dep).cloned());
                let name = dep.package.name.clone();
                let is_new_best = match ranked.get(&name) {
                    Some((_, existing)) => rank > *existing,
                    None => true,
                };
                if is_new_best {
                    deps.insert(name.clone(), dep.clone());
                }
                ranked.push_increase(name, rank);
            }
        }
        let (name, _) = ranked.pop()?;
        deps.remove(&name)
    }

    /// The highest- (or lowest-, under DOWNGRADE) priority version of
    /// `dep.package` that `dep` still allows. Returns `None` after learning
    /// a prohibition when no existing version qualifies; the caller is
    /// expected to retry candidate selection.
    fn best_version_for(&mut self, dep: &PackageDep) -> Result<Option<PackageId>, SolveError> {
        let lookup = self
            .oracle
            .versions(&dep.package, self.config.mode)
            .map_err(oracle_err)?;
        let ids = match lookup {
            VersionsLookup::NotFound => {
                log::debug!("oracle has never heard of {}", dep.package);
                self.learn_prohibition(PackageDep::any(dep.package.clone()))?;
                return Ok(None);
            }
            VersionsLookup::Found(ids) => ids,
        };

        if !self.available_versions.contains_key(&dep.package) {
            let mut versions: Vec<Version> = ids.iter().map(|id| id.version.clone()).collect();
            versions.sort();
            self.normalizers
                .insert(dep.package.clone(), Normalizer::new(versions.clone()));
            self.available_versions.insert(dep.package.clone(), versions);
        }

        match ids.into_iter().find(|id| dep.allows(&id.version)) {
            Some(id) => Ok(Some(id)),
            None => {
                log::debug!("no version of {} satisfies {}", dep.package, dep.constraint);
                self.learn_prohibition(dep.clone())?;
                Ok(None)
            }
        }
    }

    fn learn_prohibition(&mut self, dep: PackageDep) -> Result<(), SolveError> {
        let constraint = match self.normalizers.get(&dep.package) {
            Some(n) => n.maximize(&dep.constraint),
            None => dep.constraint.clone(),
        };
        let dep = dep.with_constraint(constraint);
        log::debug!("learning prohibition: not {dep}");
        self.state
            .add_incompatibility(Clause::prohibition(dep.clone()), Cause::Prohibited(dep))
            .map_err(|c| self.conflict_to_error(c))
    }

    /// Gate `id` against the SDKs in scope, and if it passes, decide it,
    /// re-propagate the clauses its name already appears in, and add a
    /// dependency clause for each of its own dependencies.
    fn select_version(&mut self, id: PackageId) -> Result<(), SolveError> {
        let pubspec = self.describe_cached(&id)?;
        if !self.validate_sdk_constraint(&id, &pubspec)? {
            log::info!("{id} rejected by SDK gate");
            return Ok(());
        }

        log::info!("deciding {id}");
        self.state.push_decision(id.clone());
        self.state
            .recheck_clauses_for(&id.package.name)
            .map_err(|c| self.conflict_to_error(c))?;

        for dep in &pubspec.dependencies {
            let depender = self.adjacency_dependency(&id, dep)?;
            self.state
                .add_incompatibility(
                    Clause::dependency(depender.clone(), dep.clone()),
                    Cause::Dependency(depender, dep.clone()),
                )
                .map_err(|c| self.conflict_to_error(c))?;
        }
        Ok(())
    }

    fn describe_cached(&mut self, id: &PackageId) -> Result<Pubspec, SolveError> {
        if let Some(p) = self.describe_cache.get(id) {
            return Ok(p.clone());
        }
        let pubspec = self.oracle.describe(id).map_err(oracle_err)?;
        self.describe_cache.insert(id.clone(), pubspec.clone());
        Ok(pubspec)
    }

    /// Reject `id` if it demands an SDK the host doesn't satisfy, learning
    /// a prohibition over the widest adjacent run of versions that share
    /// the same SDK rejection so the decision loop doesn't re-fetch and
    /// re-reject its neighbors one at a time.
    fn validate_sdk_constraint(&mut self, id: &PackageId, pubspec: &Pubspec) -> Result<bool, SolveError> {
        let dart_version = self.sdk.dart_version();
        if !pubspec.dart_sdk_constraint.allows(&dart_version) {
            log::debug!("{id} requires Dart {}, host has {dart_version}", pubspec.dart_sdk_constraint);
            let reason = format!("Dart SDK {}", pubspec.dart_sdk_constraint);
            let pred_dart_version = dart_version.clone();
            if let Some(dep) = self.dep_where(id, move |p: &Pubspec| !p.dart_sdk_constraint.allows(&pred_dart_version))? {
                self.state
                    .add_incompatibility(Clause::prohibition(dep.clone()), Cause::SdkIncompatible(dep, reason))
                    .map_err(|c| self.conflict_to_error(c))?;
            }
            return Ok(false);
        }

        if let Some(flutter_constraint) = pubspec.flutter_sdk_constraint.clone() {
            let flutter_available = self.sdk.flutter_available();
            let flutter_version = self.sdk.flutter_version();
            let flutter_ok = flutter_available
                && flutter_version
                    .as_ref()
                    .map(|v| flutter_constraint.allows(v))
                    .unwrap_or(false);
            if !flutter_ok {
                log::debug!("{id} requires the Flutter SDK, which is unavailable or incompatible here");
                let reason = if flutter_available {
                    format!("Flutter SDK {flutter_constraint}")
                } else {
                    "the Flutter SDK".to_string()
                };
                if let Some(dep) = self.dep_where(id, move |p: &Pubspec| match &p.flutter_sdk_constraint {
                    None => false,
                    Some(c) => {
                        !flutter_available
                            || !flutter_version.as_ref().map(|v| c.allows(v)).unwrap_or(false)
                    }
                })? {
                    self.state
                        .add_incompatibility(Clause::prohibition(dep.clone()), Cause::SdkIncompatible(dep, reason))
                        .map_err(|c| self.conflict_to_error(c))?;
                }
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The widest dep on `id`'s package, expressed in its narrowest
    /// equivalent form, whose constraint covers exactly the maximal
    /// contiguous run of versions adjacent to `id` for which `pred` holds.
    /// `pred(id)` must already be true; if it happens not to be (it never
    /// is, for either of this module's two callers), returns `None`.
    fn dep_where(&mut self, id: &PackageId, pred: impl Fn(&Pubspec) -> bool) -> Result<Option<PackageDep>, SolveError> {
        let id_pubspec = self.describe_cached(id)?;
        if !pred(&id_pubspec) {
            return Ok(None);
        }

        let lookup = self.oracle.versions(&id.package, self.config.mode).map_err(oracle_err)?;
        let VersionsLookup::Found(found) = lookup else {
            return Ok(Some(id.to_dep()));
        };
        let mut ascending = found;
        ascending.sort_by(|a, b| a.version.cmp(&b.version));
        let Some(pos) = ascending.iter().position(|x| x.version == id.version) else {
            return Ok(Some(id.to_dep()));
        };

        let mut lo = pos;
        while lo > 0 {
            let prev_pubspec = self.describe_cached(&ascending[lo - 1])?;
            if pred(&prev_pubspec) {
                lo -= 1;
            } else {
                break;
            }
        }
        let mut hi = pos;
        while hi + 1 < ascending.len() {
            let next_pubspec = self.describe_cached(&ascending[hi + 1])?;
            if pred(&next_pubspec) {
                hi += 1;
            } else {
                break;
            }
        }

        let constraint = adjacency_range(&ascending, lo, hi);
        Ok(Some(PackageDep::new(id.package.clone(), constraint)))
    }

    /// The widest adjacent run of `id`'s package that declares exactly the
    /// same dependency `dep`, as the depender side of a dependency clause.
    fn adjacency_dependency(&mut self, id: &PackageId, dep: &PackageDep) -> Result<PackageDep, SolveError> {
        let target = dep.clone();
        let found = self.dep_where(id, move |p: &Pubspec| {
            p.dependencies
                .iter()
                .any(|d| d.package == target.package && d.constraint == target.constraint)
        })?;
        Ok(found.unwrap_or_else(|| id.to_dep()))
    }

    fn build_result(&self, root: PackageRef) -> SolveResult {
        let mut pubspecs = IndexMap::new();
        for id in self.state.decisions() {
            if let Some(p) = self.describe_cache.get(id) {
                pubspecs.insert(id.package.name.clone(), p.clone());
            }
        }
        let mut available_versions = IndexMap::new();
        for (package, versions) in &self.available_versions {
            available_versions.insert(package.name.clone(), versions.clone());
        }
        SolveResult {
            root_package: root,
            decisions: self.state.decisions().to_vec(),
            pubspecs,
            available_versions,
        }
    }
}

/// Key for "does `a`'s upper bound sit above `b`'s", unbounded-above
/// counting as the highest possible bound.
fn upper_bound(dep: &PackageDep) -> Option<&Version> {
    dep.constraint.ranges().last().and_then(|r| r.max())
}

/// A version bound ordered so that "unbounded above" outranks every concrete
/// version, matching [`upper_bound`]'s convention. The `Priority` type fed
/// to the candidate-ranking `PriorityQueue` in [`Resolver::find_satisfiable_candidate_term`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct UpperBoundRank(Option<Version>);

impl PartialOrd for UpperBoundRank {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UpperBoundRank {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (&self.0, &other.0) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

/// The narrowest [`VersionConstraint`] whose allowed versions, among those
/// `ascending` lists, are exactly `ascending[lo..=hi]`.
fn adjacency_range(ascending: &[PackageId], lo: usize, hi: usize) -> VersionConstraint {
    let len = ascending.len();
    if lo == 0 && hi == len - 1 {
        return VersionConstraint::any();
    }
    if hi == len - 1 {
        return VersionRange::at_least(ascending[lo].version.clone(), true).into();
    }
    if lo == 0 {
        return VersionRange::at_most(ascending[hi + 1].version.clone(), false).into();
    }
    if lo == hi {
        return VersionConstraint::exact(ascending[lo].version.clone());
    }
    let caret = VersionRange::compatible_with(ascending[lo].version.clone());
    let caret_matches_run = !caret.contains(&ascending[lo - 1].version)
        && !caret.contains(&ascending[hi + 1].version)
        && (lo..=hi).all(|i| caret.contains(&ascending[i].version));
    if caret_matches_run {
        return caret.into();
    }
    VersionRange::between(
        ascending[lo].version.clone(),
        true,
        ascending[hi + 1].version.clone(),
        false,
    )
    .map(Into::into)
    .unwrap_or_else(VersionConstraint::any)
}
