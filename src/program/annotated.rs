//! A ground program annotated with external-atom replacement masks.

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::hexkin_assert_advanced;
use crate::program::GroundProgram;
use crate::registry::Registry;

/// Wraps a [`GroundProgram`] with one mask per external-atom occurrence
/// (the ground replacement atoms guessed for it) and a mask over all atoms
/// of the program.
#[derive(Debug)]
pub struct AnnotatedGroundProgram {
    base: GroundProgram,
    eatoms: Vec<Id>,
    eatom_masks: Vec<Interpretation>,
    program_mask: Interpretation,
}

impl AnnotatedGroundProgram {
    pub fn new(reg: &mut Registry, base: GroundProgram, eatoms: Vec<Id>) -> AnnotatedGroundProgram {
        let mut program_mask = base.edb.clone();
        for rule_id in &base.idb {
            let rule = reg.rule(*rule_id).clone();
            for literal in rule.head.iter().chain(rule.body.iter()) {
                program_mask.set_fact(literal.address());
            }
        }

        let eatom_masks = eatoms
            .iter()
            .map(|eatom| {
                let predicate = reg.external_atom(*eatom).predicate;
                let positive = reg.external_replacement_predicate(predicate, true);
                let negative = reg.external_replacement_predicate(predicate, false);
                program_mask
                    .iter()
                    .filter(|address| {
                        let atom_predicate = reg.ground_atom_by_address(*address).predicate();
                        atom_predicate == positive || atom_predicate == negative
                    })
                    .collect()
            })
            .collect::<Vec<Interpretation>>();

        hexkin_assert_advanced!(
            {
                let mut union = Interpretation::new();
                for mask in &eatom_masks {
                    union.add(mask);
                }
                let replacement_atoms: Interpretation = program_mask
                    .iter()
                    .filter(|address| reg.ground_atom_id(*address).is_external_aux())
                    .collect();
                union == replacement_atoms
            },
            "external-atom masks must cover exactly the replacement atoms of the program"
        );

        AnnotatedGroundProgram {
            base,
            eatoms,
            eatom_masks,
            program_mask,
        }
    }

    pub fn ground_program(&self) -> &GroundProgram {
        &self.base
    }

    pub fn program_mask(&self) -> &Interpretation {
        &self.program_mask
    }

    pub fn eatoms(&self) -> &[Id] {
        &self.eatoms
    }

    pub fn eatom_mask(&self, index: usize) -> &Interpretation {
        &self.eatom_masks[index]
    }
}
