#![cfg(test)]

use crate::basic_types::Id;
use crate::registry::ExtSourceProperties;
use crate::registry::ExternalAtom;
use crate::registry::InputType;
use crate::registry::Registry;
use crate::registry::Rule;
use crate::safety::LiberalSafetyChecker;

struct Fixture {
    reg: Registry,
    idb: Vec<Id>,
    eatom: Id,
    rule1: Id,
    y: Id,
}

/// `p(X,Y) :- q(X), &ext[X](Y).` and, with `cyclic`, the feedback rule
/// `q(Z) :- p(W,Z).` closing the loop from the external output into its
/// own input.
fn value_invention_program(properties: ExtSourceProperties, cyclic: bool) -> Fixture {
    let mut reg = Registry::new();
    let p = reg.store_constant_term("p");
    let q = reg.store_constant_term("q");
    let g = reg.store_constant_term("ext");
    let x = reg.store_variable_term("X");
    let y = reg.store_variable_term("Y");

    let p_xy = reg.store_atom(vec![p, x, y]);
    let q_x = reg.store_atom(vec![q, x]);
    let mut external = ExternalAtom::new(g, vec![x], vec![InputType::Constant], vec![y]);
    external.properties = properties;
    let eatom = reg.store_external_atom(external);
    let rule1 = reg.store_rule(Rule::regular(vec![p_xy], vec![q_x, eatom]));
    let mut idb = vec![rule1];

    if cyclic {
        let z = reg.store_variable_term("Z");
        let w = reg.store_variable_term("W");
        let q_z = reg.store_atom(vec![q, z]);
        let p_wz = reg.store_atom(vec![p, w, z]);
        idb.push(reg.store_rule(Rule::regular(vec![q_z], vec![p_wz])));
    }

    Fixture {
        reg,
        idb,
        eatom,
        rule1,
        y,
    }
}

#[test]
fn finite_domain_output_makes_the_program_safe() {
    let fixture = value_invention_program(
        ExtSourceProperties {
            finite_domain_outputs: vec![0],
            ..ExtSourceProperties::default()
        },
        false,
    );
    let checker = LiberalSafetyChecker::new(&fixture.reg, fixture.idb.clone());
    let verdict = checker.verdict();

    assert!(verdict.is_safe);
    assert!(verdict.unsafe_rules.is_empty());
    // the external atom is the unique binder of Y and must be preserved
    assert!(verdict.necessary_external_occurrences.contains(&fixture.eatom));
}

#[test]
fn acyclic_value_invention_is_safe_without_annotations() {
    let fixture = value_invention_program(ExtSourceProperties::default(), false);
    let checker = LiberalSafetyChecker::new(&fixture.reg, fixture.idb.clone());
    let verdict = checker.verdict();

    assert!(verdict.is_safe);
    // Y has no binder besides the external output
    assert!(verdict.necessary_external_occurrences.contains(&fixture.eatom));
}

#[test]
fn malign_cycle_is_rejected_and_names_the_unbounded_variable() {
    let fixture = value_invention_program(ExtSourceProperties::default(), true);
    let checker = LiberalSafetyChecker::new(&fixture.reg, fixture.idb.clone());
    let verdict = checker.verdict();

    assert!(!verdict.is_safe);
    let (_, variables) = verdict
        .unsafe_rules
        .iter()
        .find(|(rule, _)| *rule == fixture.rule1)
        .expect("the value-inventing rule is reported");
    assert!(variables.contains(&fixture.y));

    let error = verdict
        .into_error(&fixture.reg)
        .expect("unsafe verdicts render an error");
    assert!(error.detail.contains('Y'));
}

#[test]
fn declared_wellordering_makes_the_cycle_benign() {
    let fixture = value_invention_program(
        ExtSourceProperties {
            wellordering_strlen: vec![(0, 0)],
            ..ExtSourceProperties::default()
        },
        true,
    );
    let checker = LiberalSafetyChecker::new(&fixture.reg, fixture.idb.clone());
    let verdict = checker.verdict();

    assert!(verdict.is_safe);
    assert!(verdict.necessary_external_occurrences.contains(&fixture.eatom));
}

#[test]
fn safety_fixpoint_only_grows() {
    // indirectly observable: repeated analyses of the same program agree
    let fixture = value_invention_program(ExtSourceProperties::default(), true);
    let first = LiberalSafetyChecker::new(&fixture.reg, fixture.idb.clone()).verdict();
    let second = LiberalSafetyChecker::new(&fixture.reg, fixture.idb.clone()).verdict();
    assert_eq!(first.is_safe, second.is_safe);
    assert_eq!(
        first.necessary_external_occurrences,
        second.necessary_external_occurrences
    );
}

#[test]
fn programs_without_external_atoms_are_safe() {
    let mut reg = Registry::new();
    let p = reg.store_constant_term("p");
    let q = reg.store_constant_term("q");
    let x = reg.store_variable_term("X");
    let p_x = reg.store_atom(vec![p, x]);
    let q_x = reg.store_atom(vec![q, x]);
    let rule = reg.store_rule(Rule::regular(vec![p_x], vec![q_x]));

    let checker = LiberalSafetyChecker::new(&reg, vec![rule]);
    let verdict = checker.verdict();
    assert!(verdict.is_safe);
    assert!(verdict.necessary_external_occurrences.is_empty());
}
