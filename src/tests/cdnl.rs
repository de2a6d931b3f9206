#![cfg(test)]

use std::collections::BTreeSet;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::engine::CdnlSolver;
use crate::engine::SatSolver;
use crate::nogoods::Nogood;
use crate::nogoods::NogoodSet;
use crate::options::SolverOptions;

fn pos(addr: u32) -> Id {
    Id::literal(addr, true, true)
}

fn neg(addr: u32) -> Id {
    Id::literal(addr, false, true)
}

fn solver_over(nogoods: &[Nogood]) -> CdnlSolver {
    let mut set = NogoodSet::new();
    for nogood in nogoods {
        let _ = set.add_nogood(nogood.clone());
    }
    CdnlSolver::new(set, SolverOptions::default())
}

fn enumerate(solver: &mut CdnlSolver, limit: usize) -> Vec<BTreeSet<u32>> {
    let mut models = Vec::new();
    while models.len() < limit {
        match solver.get_next_model().expect("no propagators attached") {
            Some(model) => models.push(model.iter().collect()),
            None => break,
        }
    }
    models
}

#[test]
fn empty_nogood_set_has_exactly_the_empty_model() {
    let mut solver = solver_over(&[]);
    let models = enumerate(&mut solver, 5);
    assert_eq!(models, vec![BTreeSet::new()]);
}

#[test]
fn enumerates_all_assignments_violating_no_nogood() {
    // forbid both atoms true together
    let mut solver = solver_over(&[Nogood::from_literals([pos(1), pos(2)])]);
    let models = enumerate(&mut solver, 10);
    assert_eq!(models.len(), 3);

    let unique: BTreeSet<_> = models.iter().cloned().collect();
    assert_eq!(unique.len(), 3);
    assert!(!unique.contains(&[1, 2].into_iter().collect::<BTreeSet<u32>>()));
}

#[test]
fn unit_propagation_fixes_forced_atoms() {
    // 1 must be false, 2 must equal 1: only the all-false model remains
    let mut solver = solver_over(&[
        Nogood::from_literals([pos(1)]),
        Nogood::from_literals([neg(1), pos(2)]),
    ]);
    let models = enumerate(&mut solver, 10);
    assert_eq!(models, vec![BTreeSet::new()]);
}

#[test]
fn contradictory_unit_nogoods_are_unsatisfiable() {
    let mut solver = solver_over(&[
        Nogood::from_literals([pos(1)]),
        Nogood::from_literals([neg(1)]),
    ]);
    assert_eq!(solver.get_next_model().expect("no propagators"), None);

    let explanation: Interpretation = [1].into_iter().collect();
    let cause = solver
        .get_inconsistency_cause(&explanation)
        .expect("instance is inconsistent");
    // the conflict is explained entirely by atom 1, in one polarity
    assert!(cause.len() <= 1);
    for literal in cause.iter() {
        assert_eq!(literal.address(), 1);
    }
}

#[test]
fn models_respect_nogoods_learned_between_calls() {
    let mut solver = solver_over(&[Nogood::from_literals([pos(1), pos(2)])]);
    let _first = solver
        .get_next_model()
        .expect("no propagators")
        .expect("satisfiable");

    // forbid atom 2 from now on; the remaining models must avoid it
    solver.add_nogood(Nogood::from_literals([pos(2)]));
    while let Some(model) = solver.get_next_model().expect("no propagators") {
        assert!(!model.get_fact(2));
    }
}

#[test]
fn restart_with_assumptions_pins_literals() {
    let mut solver = solver_over(&[Nogood::from_literals([pos(1), pos(2)])]);
    solver.restart_with_assumptions(&[pos(1)]);

    let models = enumerate(&mut solver, 10);
    assert!(!models.is_empty());
    for model in &models {
        assert!(model.contains(&1));
        assert!(!model.contains(&2));
    }
}
