//! Ground programs as delivered by the grounder oracle, and their annotated
//! wrapper.

mod annotated;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::SafetyError;
use crate::registry::Registry;

pub use annotated::AnnotatedGroundProgram;

/// A ground disjunctive program.
#[derive(Clone, Debug, Default)]
pub struct GroundProgram {
    /// Ground atoms known to be true.
    pub edb: Interpretation,
    /// Ground disjunctive rules; each literal is a ground-atom literal with
    /// an optional NAF bit.
    pub idb: Vec<Id>,
    /// `#maxint` for the integer builtins.
    pub max_int: u32,
    /// Atoms to hide from reported models.
    pub mask: Interpretation,
}

/// The grounder oracle: turns a (non-ground) program into a finite ground
/// program. The solver core never looks behind this interface; a grounding
/// that cannot be made finite is reported as a safety error.
pub trait Grounder {
    fn ground(
        &mut self,
        reg: &mut Registry,
        edb: &Interpretation,
        idb: &[Id],
    ) -> Result<GroundProgram, SafetyError>;
}
