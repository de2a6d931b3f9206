//! A SAT-style enumeration solver over nogoods with conflict-driven
//! learning.

use log::debug;
use log::warn;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::SolverError;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::PropagatorId;
use crate::engine::propagation::QueueSink;
use crate::engine::search_state::Counters;
use crate::engine::search_state::SearchState;
use crate::engine::termination::TerminationCondition;
use crate::engine::SatSolver;
use crate::nogoods::Nogood;
use crate::nogoods::NogoodSet;
use crate::options::SolverOptions;

/// Enumerates the assignments over the atoms of a [`NogoodSet`] that
/// violate none of its nogoods. Enumeration works by flipping the decision
/// literal of the deepest non-exhausted level after each model, so two
/// successive models always differ in at least one decision.
pub struct CdnlSolver {
    state: SearchState,
    propagators: Vec<Option<Box<dyn Propagator>>>,
    nogoods_to_add: Vec<Nogood>,
    termination: Option<Box<dyn TerminationCondition>>,
    first_model: bool,
    model_count: u64,
}

impl CdnlSolver {
    pub fn new(nogoods: NogoodSet, options: SolverOptions) -> CdnlSolver {
        let mut state = SearchState::new(nogoods, options);
        state.collect_universe_from_nogoods();
        state.init_watching_structures();
        CdnlSolver {
            state,
            propagators: Vec::new(),
            nogoods_to_add: Vec::new(),
            termination: None,
            first_model: true,
            model_count: 0,
        }
    }

    /// Installs a cooperative cancellation condition, polled at the top of
    /// the search loop. A stopped search reports no model for the current
    /// call and leaves the solver state intact.
    pub fn set_termination(&mut self, termination: Box<dyn TerminationCondition>) {
        self.termination = Some(termination);
    }

    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    pub fn log_statistics(&self) {
        self.state.counters.log_statistics();
    }

    /// The nogoods that are currently contradictory; non-empty only while
    /// a conflict is pending or after level-0 inconsistency.
    pub fn contradictory_nogoods(&self) -> Vec<Nogood> {
        self.state.contradictory_nogoods()
    }

    fn should_stop(&mut self) -> bool {
        self.termination
            .as_mut()
            .is_some_and(|condition| condition.should_stop())
    }

    fn backtrack(&mut self, dl: u32) {
        for address in self.state.atoms_above_level(dl) {
            self.state.clear_fact(address);
        }
        self.state.counters.num_backtracks += 1;
    }

    fn flip_decision_literal(&mut self) {
        let literal = self.state.decision_literal_of_level[&self.state.current_dl];
        self.state.current_dl -= 1;
        self.state.exhausted_dl = self.state.current_dl;
        let dl = self.state.current_dl;
        debug!("flipping decision literal {:?} onto level {}", literal, dl);
        self.backtrack(dl);
        self.state.set_fact(literal.negated(), dl, None);
    }

    /// Propagates all unit nogoods; returns the violated nogood if the
    /// assignment became contradictory.
    fn unit_propagation(&mut self) -> Option<Nogood> {
        while let Some((literal, dl, cause)) = self.state.next_unit_propagation() {
            self.state.set_fact(literal, dl, Some(cause));
        }
        self.state.violated_nogood()
    }

    fn call_propagators(&mut self) -> Result<(), SolverError> {
        let mut sink = QueueSink {
            queue: &mut self.nogoods_to_add,
        };
        for propagator in self.propagators.iter_mut().flatten() {
            propagator.propagate(
                &self.state.interpretation,
                &self.state.assigned,
                &self.state.changed,
                &mut sink,
            )?;
        }
        Ok(())
    }

    fn load_added_nogoods(&mut self) {
        for nogood in std::mem::take(&mut self.nogoods_to_add) {
            let _ = self.state.add_nogood_and_watch(nogood);
        }
    }

    fn handle_conflict(&mut self, violated: &Nogood) {
        if self.state.current_dl > self.state.exhausted_dl {
            let (learned, backjump_dl) = self.state.analysis(violated);
            if let Some(index) = self.state.add_nogood_and_watch(learned) {
                self.state.recent_conflicts.push(index);
            }
            // never jump below the exhausted level, that could regenerate
            // previously reported models
            self.state.current_dl = backjump_dl.max(self.state.exhausted_dl);
            let dl = self.state.current_dl;
            self.backtrack(dl);
        } else {
            self.flip_decision_literal();
        }
    }

    fn guess_next_literal(&mut self) {
        self.state.current_dl += 1;
        let guess = self.state.guess();
        let dl = self.state.current_dl;
        let _ = self.state.decision_literal_of_level.insert(dl, guess);
        self.state.set_fact(guess, dl, None);
    }
}

impl SatSolver for CdnlSolver {
    fn add_nogood(&mut self, nogood: Nogood) {
        self.nogoods_to_add.push(nogood);
    }

    fn restart_with_assumptions(&mut self, assumptions: &[Id]) {
        debug!("resetting solver with {} assumptions", assumptions.len());
        for address in self.state.assigned_atoms() {
            self.state.clear_fact(address);
        }
        self.state.reset_levels();
        for assumption in assumptions {
            self.state.set_fact(
                Id::literal(assumption.address(), !assumption.is_naf(), true),
                0,
                None,
            );
        }
    }

    fn get_next_model(&mut self) -> Result<Option<Interpretation>, SolverError> {
        // nogoods queued since the last call must take effect before the
        // previous model is handled
        self.load_added_nogoods();

        if !self.first_model && self.state.complete() {
            if self.state.current_dl == 0 {
                debug!("no more models");
                return Ok(None);
            }
            self.flip_decision_literal();
        }
        self.first_model = false;

        // runs again even on a complete assignment while new nogoods keep
        // arriving, so external learners can veto a would-be model
        let mut another_iteration = false;
        while !self.state.complete() || another_iteration || self.state.has_contradiction() {
            if self.should_stop() {
                debug!("search cancelled cooperatively");
                return Ok(None);
            }
            another_iteration = false;

            match self.unit_propagation() {
                Some(violated) => {
                    if self.state.current_dl == 0 {
                        return Ok(None);
                    }
                    self.handle_conflict(&violated);
                }
                None => {
                    let count_before = self.state.nogoods.count();
                    self.call_propagators()?;
                    self.load_added_nogoods();
                    if self.state.nogoods.count() != count_before {
                        another_iteration = true;
                    }
                    self.state.changed.clear();

                    if self.state.nogoods.count() == count_before && !self.state.complete() {
                        self.guess_next_literal();
                    }
                }
            }
            self.load_added_nogoods();
        }

        debug!("got model");
        self.model_count += 1;
        self.state.counters.num_models += 1;
        let mut model = self.state.interpretation.clone();
        model.intersect_with(&self.state.assigned);
        Ok(Some(model))
    }

    fn add_propagator(&mut self, propagator: Box<dyn Propagator>) -> PropagatorId {
        self.propagators.push(Some(propagator));
        PropagatorId(self.propagators.len() - 1)
    }

    fn remove_propagator(&mut self, id: PropagatorId) {
        self.propagators[id.0] = None;
    }

    fn set_optimum(&mut self, _optimum: &[i32]) {
        warn!("set_optimum is not supported by the internal solver, ignoring");
    }

    fn get_inconsistency_cause(
        &mut self,
        explanation_atoms: &Interpretation,
    ) -> Result<Nogood, SolverError> {
        self.load_added_nogoods();
        let model = self.get_next_model()?;
        if model.is_none() && (self.model_count == 0 || self.state.has_contradiction()) {
            Ok(self.state.inconsistency_explanation(explanation_atoms))
        } else {
            Err(SolverError::ContractViolation(
                "inconsistency causes can only be computed for instances without any model",
            ))
        }
    }
}
