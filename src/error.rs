// SPDX-License-Identifier: MPL-2.0

//! The solver's error taxonomy: a `NoSolution` variant wrapping the
//! derivation tree, an oracle-error passthrough variant, and a catch-all
//! for internal invariant violations.

use thiserror::Error;

use crate::report::DerivationTree;

/// Wraps the root incompatibility a failed solve terminates on.
#[derive(Debug, Clone)]
pub struct NoSolutionError {
    pub derivation_tree: DerivationTree,
}

impl NoSolutionError {
    pub fn new(derivation_tree: DerivationTree) -> Self {
        Self { derivation_tree }
    }

    /// The human-readable explanation, via [`crate::report::DefaultStringReporter`].
    pub fn explain(&self) -> String {
        crate::report::DefaultStringReporter::report(&self.derivation_tree)
    }
}

impl std::fmt::Display for NoSolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.explain())
    }
}

impl std::error::Error for NoSolutionError {}

/// Everything that can go wrong running [`crate::solver::resolve`].
#[derive(Debug, Error)]
pub enum SolveError {
    /// No assignment satisfies every transitive dependency; the payload is
    /// a numbered proof of the conflict.
    #[error("{0}")]
    NoSolution(#[from] NoSolutionError),

    /// The oracle failed for a reason other than "package not found" (which
    /// is instead folded into a learned prohibition and never surfaces
    /// here). Propagated to the caller unchanged.
    #[error("dependency oracle failed: {0}")]
    OracleError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The `should_cancel` hook asked the solve to stop.
    #[error("solve canceled")]
    Canceled,

    /// An internal invariant was violated, e.g. the decision loop picked a
    /// version the accumulated constraint did not actually allow. Always a
    /// bug in this crate, never a consequence of oracle data.
    #[error("internal solver error: {0}")]
    Bug(String),
}
