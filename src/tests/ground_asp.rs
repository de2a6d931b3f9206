#![cfg(test)]

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::PropagatorError;
use crate::basic_types::SolverError;
use crate::engine::propagation::NogoodSink;
use crate::engine::propagation::Propagator;
use crate::engine::InternalGroundAspSolver;
use crate::engine::SatSolver;
use crate::nogoods::Nogood;
use crate::options::SolverOptions;
use crate::program::AnnotatedGroundProgram;
use crate::registry::Rule;
use crate::registry::RuleKind;
use crate::tests::helpers::model;
use crate::tests::helpers::GroundProgramBuilder;

#[test]
fn empty_program_has_exactly_the_empty_model() {
    let mut builder = GroundProgramBuilder::new();
    let mut solver = builder.solver();
    let models = builder.collect_models(&mut solver, 5);
    assert_eq!(models, vec![model(&[])]);
}

#[test]
fn clark_completion_propagates_the_single_model() {
    // p :- q.  q.
    let mut builder = GroundProgramBuilder::new();
    let p = builder.atom("p");
    let q = builder.fact("q");
    let _ = builder.rule(&[p], &[q], &[]);

    let mut solver = builder.solver();
    let models = builder.collect_models(&mut solver, 5);
    assert_eq!(models, vec![model(&["p", "q"])]);
}

#[test]
fn disjunctive_fact_enumerates_both_models() {
    // a v b.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a, b], &[], &[]);

    let mut solver = builder.solver();
    let mut models = builder.collect_models(&mut solver, 5);
    models.sort();
    assert_eq!(models, vec![model(&["a"]), model(&["b"])]);
}

#[test]
fn unfounded_set_elimination_rejects_the_cyclic_model() {
    // a :- b.  b :- a.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a], &[b], &[]);
    let _ = builder.rule(&[b], &[a], &[]);

    let mut solver = builder.solver();
    let models = builder.collect_models(&mut solver, 5);
    assert_eq!(models, vec![model(&[])]);
}

#[test]
fn loop_nogoods_keep_externally_supported_cycles() {
    // a :- b.  b :- a.  a v c.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let c = builder.atom("c");
    let _ = builder.rule(&[a], &[b], &[]);
    let _ = builder.rule(&[b], &[a], &[]);
    let _ = builder.rule(&[a, c], &[], &[]);

    let mut solver = builder.solver();
    let mut models = builder.collect_models(&mut solver, 5);
    models.sort();
    assert_eq!(models, vec![model(&["a", "b"]), model(&["c"])]);
}

#[test]
fn negation_as_failure_flips_between_models() {
    // a :- not b.  b :- not a.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a], &[], &[b]);
    let _ = builder.rule(&[b], &[], &[a]);

    let mut solver = builder.solver();
    let mut models = builder.collect_models(&mut solver, 5);
    models.sort();
    assert_eq!(models, vec![model(&["a"]), model(&["b"])]);
}

#[test]
fn successive_models_are_distinct() {
    // two independent choices: a v b.  c v d.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let c = builder.atom("c");
    let d = builder.atom("d");
    let _ = builder.rule(&[a, b], &[], &[]);
    let _ = builder.rule(&[c, d], &[], &[]);

    let mut solver = builder.solver();
    let models = builder.collect_models(&mut solver, 10);
    assert_eq!(models.len(), 4);
    for (index, left) in models.iter().enumerate() {
        for right in models.iter().skip(index + 1) {
            assert_ne!(left, right);
        }
    }
}

#[test]
fn constraint_against_fact_is_inconsistent() {
    // a.  :- a.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.fact("a");
    let _ = builder.rule(&[], &[a], &[]);

    let mut solver = builder.solver();
    assert_eq!(solver.get_next_model().expect("no propagators"), None);

    let explanation_atoms: Interpretation = [a.address()].into_iter().collect();
    let cause = solver
        .get_inconsistency_cause(&explanation_atoms)
        .expect("instance is inconsistent");
    let expected = Nogood::from_literals([Id::literal(a.address(), true, true)]);
    assert_eq!(cause, expected);
}

#[test]
fn inconsistency_cause_requires_a_model_free_instance() {
    let mut builder = GroundProgramBuilder::new();
    let _ = builder.fact("a");

    let mut solver = builder.solver();
    let explanation_atoms = Interpretation::new();
    let result = solver.get_inconsistency_cause(&explanation_atoms);
    assert!(matches!(result, Err(SolverError::ContractViolation(_))));
}

#[test]
fn weight_rules_are_rejected_at_construction() {
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let rule = builder.reg.store_rule(Rule {
        kind: RuleKind::WeightRule,
        head: vec![a],
        body: vec![],
        weight: Some(1),
        level: Some(1),
    });
    builder.idb.push(rule);

    let program = builder.ground_program();
    let annotated = AnnotatedGroundProgram::new(&mut builder.reg, program, Vec::new());
    let result =
        InternalGroundAspSolver::new(&mut builder.reg, annotated, SolverOptions::default());
    assert!(matches!(
        result,
        Err(SolverError::UnsupportedConstruct("weight rules"))
    ));
}

#[test]
fn weak_constraints_are_rejected_at_construction() {
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let rule = builder.reg.store_rule(Rule {
        kind: RuleKind::WeakConstraint,
        head: vec![],
        body: vec![a],
        weight: Some(1),
        level: Some(1),
    });
    builder.idb.push(rule);

    let program = builder.ground_program();
    let annotated = AnnotatedGroundProgram::new(&mut builder.reg, program, Vec::new());
    let result =
        InternalGroundAspSolver::new(&mut builder.reg, annotated, SolverOptions::default());
    assert!(matches!(
        result,
        Err(SolverError::UnsupportedConstruct("weak constraints"))
    ));
}

#[test]
fn restart_with_assumptions_restricts_enumeration() {
    // a v b. assuming not a leaves only { b }.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a, b], &[], &[]);

    let mut solver = builder.solver();
    solver.restart_with_assumptions(&[a.negated()]);
    let models = builder.collect_models(&mut solver, 5);
    assert_eq!(models, vec![model(&["b"])]);
}

/// Forbids one atom by persistently emitting the unary nogood over it.
struct ForbidAtom {
    literal: Id,
}

impl Propagator for ForbidAtom {
    fn name(&self) -> &str {
        "ForbidAtom"
    }

    fn propagate(
        &mut self,
        _partial: &Interpretation,
        _assigned: &Interpretation,
        _changed: &Interpretation,
        sink: &mut dyn NogoodSink,
    ) -> Result<(), PropagatorError> {
        sink.emit(Nogood::from_literals([self.literal]));
        Ok(())
    }
}

#[test]
fn propagator_nogoods_veto_models() {
    // a v b. with a propagator forbidding a.
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a, b], &[], &[]);

    let mut solver = builder.solver();
    let _ = solver.add_propagator(Box::new(ForbidAtom {
        literal: Id::literal(a.address(), true, true),
    }));
    let models = builder.collect_models(&mut solver, 5);
    assert_eq!(models, vec![model(&["b"])]);
}

struct FailingPropagator;

impl Propagator for FailingPropagator {
    fn propagate(
        &mut self,
        _partial: &Interpretation,
        _assigned: &Interpretation,
        _changed: &Interpretation,
        _sink: &mut dyn NogoodSink,
    ) -> Result<(), PropagatorError> {
        Err(PropagatorError::new("external source unavailable"))
    }
}

#[test]
fn propagator_errors_abort_enumeration() {
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a, b], &[], &[]);

    let mut solver = builder.solver();
    let _ = solver.add_propagator(Box::new(FailingPropagator));
    assert!(matches!(
        solver.get_next_model(),
        Err(SolverError::Propagator(_))
    ));
}

#[test]
fn out_of_universe_nogoods_are_silently_dropped() {
    let mut builder = GroundProgramBuilder::new();
    let a = builder.atom("a");
    let b = builder.atom("b");
    let _ = builder.rule(&[a, b], &[], &[]);
    let stranger = builder.atom("unrelated");

    let mut solver = builder.solver();
    solver.add_nogood(Nogood::from_literals([Id::literal(
        stranger.address(),
        true,
        true,
    )]));
    let mut models = builder.collect_models(&mut solver, 5);
    models.sort();
    assert_eq!(models, vec![model(&["a"]), model(&["b"])]);
}
