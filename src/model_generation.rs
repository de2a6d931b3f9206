//! The model-generator façade: owns an input interpretation, gates it
//! through the liberal safety check, lazily drives the grounder once, and
//! yields one answer set per call.

use log::debug;
use thiserror::Error;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::SafetyError;
use crate::basic_types::SolverError;
use crate::engine::InternalGroundAspSolver;
use crate::engine::SatSolver;
use crate::options::SolverOptions;
use crate::program::AnnotatedGroundProgram;
use crate::program::Grounder;
use crate::registry::Registry;
use crate::safety::LiberalSafetyChecker;

/// A failure while generating models: either the program was rejected
/// before any solver was built, or the solver itself failed.
#[derive(Debug, Clone, Error)]
pub enum ModelGenerationError {
    #[error(transparent)]
    Safety(#[from] SafetyError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[derive(Debug, PartialEq, Eq)]
enum GeneratorState {
    Fresh,
    Iterating,
    Exhausted,
}

/// Generates the answer sets of a program whose only external atoms are
/// handled by propagators attached to the underlying solver.
///
/// The first call to [`PlainModelGenerator::next_model`] runs the safety
/// check, grounds the program and builds the internal solver; every call
/// forwards to the solver, whose output is already projected through the
/// program mask.
pub struct PlainModelGenerator<'reg, G: Grounder> {
    registry: &'reg mut Registry,
    grounder: G,
    input: Interpretation,
    idb: Vec<Id>,
    eatoms: Vec<Id>,
    options: Option<SolverOptions>,
    solver: Option<InternalGroundAspSolver>,
    optimum: Option<Vec<i32>>,
    state: GeneratorState,
}

impl<'reg, G: Grounder> PlainModelGenerator<'reg, G> {
    /// `input` is the (post-processed) set of input facts; `eatoms` lists
    /// the external-atom occurrences of `idb` for the annotation masks.
    pub fn new(
        registry: &'reg mut Registry,
        grounder: G,
        input: Interpretation,
        idb: Vec<Id>,
        eatoms: Vec<Id>,
        options: SolverOptions,
    ) -> PlainModelGenerator<'reg, G> {
        PlainModelGenerator {
            registry,
            grounder,
            input,
            idb,
            eatoms,
            options: Some(options),
            solver: None,
            optimum: None,
            state: GeneratorState::Fresh,
        }
    }

    /// Best-known cost vector, forwarded to the solver for pruning.
    pub fn set_optimum(&mut self, optimum: Vec<i32>) {
        if let Some(solver) = self.solver.as_mut() {
            solver.set_optimum(&optimum);
        } else {
            self.optimum = Some(optimum);
        }
    }

    /// Access to the underlying solver once it exists, e.g. to attach
    /// propagators after the first grounding.
    pub fn solver_mut(&mut self) -> Option<&mut InternalGroundAspSolver> {
        self.solver.as_mut()
    }

    fn initialise(&mut self) -> Result<(), ModelGenerationError> {
        // the safety check gates the grounder: unsafe programs are rejected
        // before any solver state exists
        let verdict = LiberalSafetyChecker::new(self.registry, self.idb.clone()).verdict();
        if !verdict.is_safe {
            let error = verdict
                .into_error(self.registry)
                .expect("unsafe verdicts render an error");
            self.state = GeneratorState::Exhausted;
            return Err(error.into());
        }

        let ground = self
            .grounder
            .ground(self.registry, &self.input, &self.idb)?;
        let annotated = AnnotatedGroundProgram::new(self.registry, ground, self.eatoms.clone());
        let options = self.options.take().unwrap_or_default();
        let mut solver = InternalGroundAspSolver::new(self.registry, annotated, options)?;
        if let Some(optimum) = self.optimum.take() {
            solver.set_optimum(&optimum);
        }
        self.solver = Some(solver);
        self.state = GeneratorState::Iterating;
        debug!("model generator initialised");
        Ok(())
    }

    /// The next answer set, or `Ok(None)` once enumeration is exhausted.
    pub fn next_model(&mut self) -> Result<Option<Interpretation>, ModelGenerationError> {
        match self.state {
            GeneratorState::Exhausted => return Ok(None),
            GeneratorState::Fresh => self.initialise()?,
            GeneratorState::Iterating => {}
        }

        let solver = self
            .solver
            .as_mut()
            .expect("the iterating state implies a solver");
        let model = solver.get_next_model()?;
        if model.is_none() {
            self.state = GeneratorState::Exhausted;
        }
        Ok(model)
    }
}
