//! Attributes: predicate-argument positions, the unit of domain-safety
//! reasoning.

use crate::basic_types::Id;
use crate::registry::Registry;

/// A rule-local variable occurrence `(rule, variable term)`.
pub type VariableLocation = (Id, Id);

/// A rule-local atom occurrence `(rule, atom id)`.
pub type AtomLocation = (Id, Id);

/// A node of the attribute dependency graph. Argument indices are
/// 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// An argument position of an ordinary predicate.
    Ordinary { predicate: Id, arg_index: usize },
    /// An input or output position of one external-atom occurrence.
    External {
        rule: Id,
        eatom: Id,
        predicate: Id,
        inputs: Vec<Id>,
        is_input: bool,
        arg_index: usize,
    },
}

impl Attribute {
    pub fn is_external(&self) -> bool {
        matches!(self, Attribute::External { .. })
    }

    pub fn display(&self, reg: &Registry) -> String {
        match self {
            Attribute::Ordinary {
                predicate,
                arg_index,
            } => format!("{}#{}", reg.term_text(*predicate), arg_index),
            Attribute::External {
                rule,
                predicate,
                inputs,
                is_input,
                arg_index,
                ..
            } => {
                let inputs = inputs
                    .iter()
                    .map(|input| reg.term_text(*input))
                    .collect::<Vec<_>>()
                    .join(",");
                format!(
                    "r{}:&{}[{}]#{}{}",
                    rule.address(),
                    reg.term_text(*predicate),
                    inputs,
                    if *is_input { "i" } else { "o" },
                    arg_index
                )
            }
        }
    }
}
