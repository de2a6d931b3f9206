//! The solver-to-propagator interface.
//!
//! A propagator observes the current partial assignment and may submit
//! ground nogoods through the sink it is handed for the duration of one
//! call; the solver splices them into its watch structures before the next
//! propagation step. Passing a sink instead of a solver back-reference
//! keeps the borrow discipline one-directional.

use crate::basic_types::Interpretation;
use crate::basic_types::PropagatorError;
use crate::nogoods::Nogood;

/// Receives nogoods emitted by a propagator during one `propagate` call.
pub trait NogoodSink {
    fn emit(&mut self, nogood: Nogood);
}

/// An external learner attached to a solver.
pub trait Propagator {
    /// A display name used in diagnostics.
    fn name(&self) -> &str {
        "Propagator"
    }

    /// Called after unit propagation stabilises, and once more between the
    /// last propagation and model emission so freshly added nogoods can
    /// still veto a would-be model.
    ///
    /// `changed` is a superset of the atoms whose truth value changed since
    /// the last call. The interpretations are borrowed for the duration of
    /// the call only; emitted nogoods must be ground.
    fn propagate(
        &mut self,
        partial: &Interpretation,
        assigned: &Interpretation,
        changed: &Interpretation,
        sink: &mut dyn NogoodSink,
    ) -> Result<(), PropagatorError>;
}

/// Handle returned by `add_propagator`, usable to unregister it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropagatorId(pub(crate) usize);

/// Sink collecting emitted nogoods into the solver's insertion queue.
pub(crate) struct QueueSink<'a> {
    pub(crate) queue: &'a mut Vec<Nogood>,
}

impl NogoodSink for QueueSink<'_> {
    fn emit(&mut self, nogood: Nogood) {
        self.queue.push(nogood);
    }
}
