//! Error taxonomy of the solver core.
//!
//! Contract violations and unsupported constructs fail fast, safety
//! violations are raised before any solver state is built, propagator
//! failures unwind through model enumeration, and search exhaustion is an
//! ordinary `Ok(None)` rather than an error.

use thiserror::Error;

use crate::basic_types::Id;

/// Raised by a [`crate::engine::propagation::Propagator`] callback; aborts
/// the enumeration it interrupted.
#[derive(Debug, Clone, Error)]
#[error("propagator failure: {message}")]
pub struct PropagatorError {
    pub message: String,
}

impl PropagatorError {
    pub fn new(message: impl Into<String>) -> PropagatorError {
        PropagatorError {
            message: message.into(),
        }
    }
}

/// A fatal condition encountered by the ground solver.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// The ground input contains a construct the internal solver does not
    /// implement (weight rules, weak constraints, aggregate bodies).
    #[error("internal solver does not support {0}")]
    UnsupportedConstruct(&'static str),

    /// An API entry point was used outside its legal state.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),

    /// A propagator callback failed during propagation.
    #[error(transparent)]
    Propagator(#[from] PropagatorError),
}

/// A non-ground program failed the liberal domain-expansion safety check.
///
/// Carries the most informative offending rule together with the variables
/// that could not be bounded.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct SafetyError {
    pub rule: Id,
    pub variables: Vec<Id>,
    pub detail: String,
}
