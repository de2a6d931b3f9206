//! Shared scaffolding for the solver tests.

use std::collections::BTreeSet;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::engine::InternalGroundAspSolver;
use crate::engine::SatSolver;
use crate::options::SolverOptions;
use crate::program::AnnotatedGroundProgram;
use crate::program::GroundProgram;
use crate::registry::Registry;
use crate::registry::Rule;

/// Builds small ground programs over nullary predicates.
pub(crate) struct GroundProgramBuilder {
    pub(crate) reg: Registry,
    pub(crate) edb: Interpretation,
    pub(crate) idb: Vec<Id>,
}

impl GroundProgramBuilder {
    pub(crate) fn new() -> GroundProgramBuilder {
        GroundProgramBuilder {
            reg: Registry::new(),
            edb: Interpretation::new(),
            idb: Vec::new(),
        }
    }

    pub(crate) fn atom(&mut self, name: &str) -> Id {
        let predicate = self.reg.store_constant_term(name);
        self.reg.store_ground_atom(vec![predicate])
    }

    pub(crate) fn fact(&mut self, name: &str) -> Id {
        let atom = self.atom(name);
        self.edb.set_fact(atom.address());
        atom
    }

    pub(crate) fn rule(&mut self, head: &[Id], positive: &[Id], negative: &[Id]) -> Id {
        let body = positive
            .iter()
            .copied()
            .chain(negative.iter().map(|atom| atom.negated()))
            .collect();
        let rule = self.reg.store_rule(Rule::regular(head.to_vec(), body));
        self.idb.push(rule);
        rule
    }

    pub(crate) fn ground_program(&self) -> GroundProgram {
        GroundProgram {
            edb: self.edb.clone(),
            idb: self.idb.clone(),
            max_int: 0,
            mask: Interpretation::new(),
        }
    }

    pub(crate) fn solver(&mut self) -> InternalGroundAspSolver {
        let program = self.ground_program();
        let annotated = AnnotatedGroundProgram::new(&mut self.reg, program, Vec::new());
        InternalGroundAspSolver::new(&mut self.reg, annotated, SolverOptions::default())
            .expect("solver construction must succeed")
    }

    pub(crate) fn render(&self, model: &Interpretation) -> BTreeSet<String> {
        model
            .iter()
            .map(|address| self.reg.ground_atom_by_address(address).text.clone())
            .collect()
    }

    /// Enumerates up to `limit` models and renders them as atom-name sets.
    pub(crate) fn collect_models(
        &self,
        solver: &mut InternalGroundAspSolver,
        limit: usize,
    ) -> Vec<BTreeSet<String>> {
        let mut models = Vec::new();
        while models.len() < limit {
            match solver.get_next_model().expect("enumeration must not fail") {
                Some(model) => models.push(self.render(&model)),
                None => break,
            }
        }
        models
    }
}

pub(crate) fn model(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}
