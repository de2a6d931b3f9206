//! The ground-solver engines: the shared CDNL search state, the plain SAT
//! enumeration solver and the ASP solver with unfounded-set detection.

mod cdnl;
mod ground_asp;
pub mod propagation;
mod search_state;
pub mod termination;
mod verification_tree;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::SolverError;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::PropagatorId;
use crate::nogoods::Nogood;

pub use cdnl::CdnlSolver;
pub use ground_asp::InternalGroundAspSolver;
pub use search_state::Counters;
pub use verification_tree::ExternalAtomVerificationTree;

/// The public contract of the nogood-based enumeration solvers.
pub trait SatSolver {
    /// Queues a ground nogood for insertion before the next model is
    /// produced. Nogoods whose atoms leave the solver's universe are
    /// silently dropped.
    fn add_nogood(&mut self, nogood: Nogood);

    /// Clears the assignment and asserts each assumption at decision
    /// level 0.
    fn restart_with_assumptions(&mut self, assumptions: &[Id]);

    /// Produces the next model, or `Ok(None)` when enumeration is
    /// exhausted; a subsequent call continues the enumeration.
    fn get_next_model(&mut self) -> Result<Option<Interpretation>, SolverError>;

    fn add_propagator(&mut self, propagator: Box<dyn Propagator>) -> PropagatorId;

    fn remove_propagator(&mut self, id: PropagatorId);

    /// Announces the best known cost vector for pruning; implementations
    /// may ignore the call.
    fn set_optimum(&mut self, optimum: &[i32]);

    /// Explains why the instance has no model, as a nogood over the given
    /// explanation atoms. Legal only when enumeration reported exhaustion
    /// without ever producing a model.
    fn get_inconsistency_cause(
        &mut self,
        explanation_atoms: &Interpretation,
    ) -> Result<Nogood, SolverError>;
}
