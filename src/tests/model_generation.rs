#![cfg(test)]

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::SafetyError;
use crate::model_generation::ModelGenerationError;
use crate::model_generation::PlainModelGenerator;
use crate::options::SolverOptions;
use crate::program::GroundProgram;
use crate::program::Grounder;
use crate::registry::ExternalAtom;
use crate::registry::InputType;
use crate::registry::Registry;
use crate::registry::Rule;
use crate::tests::helpers::GroundProgramBuilder;

/// A grounder for already-ground programs: the input facts become the EDB
/// and the rules pass through unchanged.
struct PassThroughGrounder;

impl Grounder for PassThroughGrounder {
    fn ground(
        &mut self,
        _reg: &mut Registry,
        edb: &Interpretation,
        idb: &[Id],
    ) -> Result<GroundProgram, SafetyError> {
        Ok(GroundProgram {
            edb: edb.clone(),
            idb: idb.to_vec(),
            max_int: 0,
            mask: Interpretation::new(),
        })
    }
}

#[test]
fn generator_grounds_lazily_and_enumerates() {
    // p :- q. with input fact q
    let mut builder = GroundProgramBuilder::new();
    let p = builder.atom("p");
    let q = builder.atom("q");
    let _ = builder.rule(&[p], &[q], &[]);
    let input: Interpretation = [q.address()].into_iter().collect();
    let idb = builder.idb.clone();

    let mut generator = PlainModelGenerator::new(
        &mut builder.reg,
        PassThroughGrounder,
        input,
        idb,
        Vec::new(),
        SolverOptions::default(),
    );

    let first = generator
        .next_model()
        .expect("generation succeeds")
        .expect("one answer set exists");
    let expected: Interpretation = [p.address(), q.address()].into_iter().collect();
    assert_eq!(first, expected);

    assert!(generator.next_model().expect("generation succeeds").is_none());
    // exhausted generators stay exhausted
    assert!(generator.next_model().expect("generation succeeds").is_none());
}

#[test]
fn unsafe_programs_are_rejected_before_grounding() {
    // p(X,Y) :- q(X), &ext[X](Y).   q(Z) :- p(W,Z).
    // the external output feeds its own input through q: malign cycle
    let mut reg = Registry::new();
    let p = reg.store_constant_term("p");
    let q = reg.store_constant_term("q");
    let g = reg.store_constant_term("ext");
    let x = reg.store_variable_term("X");
    let y = reg.store_variable_term("Y");
    let z = reg.store_variable_term("Z");
    let w = reg.store_variable_term("W");

    let p_xy = reg.store_atom(vec![p, x, y]);
    let q_x = reg.store_atom(vec![q, x]);
    let eatom = reg.store_external_atom(ExternalAtom::new(
        g,
        vec![x],
        vec![InputType::Constant],
        vec![y],
    ));
    let rule1 = reg.store_rule(Rule::regular(vec![p_xy], vec![q_x, eatom]));

    let q_z = reg.store_atom(vec![q, z]);
    let p_wz = reg.store_atom(vec![p, w, z]);
    let rule2 = reg.store_rule(Rule::regular(vec![q_z], vec![p_wz]));

    let mut generator = PlainModelGenerator::new(
        &mut reg,
        PassThroughGrounder,
        Interpretation::new(),
        vec![rule1, rule2],
        vec![eatom],
        SolverOptions::default(),
    );

    let result = generator.next_model();
    assert!(matches!(result, Err(ModelGenerationError::Safety(_))));
    // rejection is permanent
    assert!(generator.next_model().expect("exhausted afterwards").is_none());
}
