//! Atom representations stored in the registry tables.

use enumset::EnumSet;
use enumset::EnumSetType;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;

/// An ordinary (possibly non-ground) atom. `tuple[0]` is the predicate
/// term, the remaining entries are the argument terms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrdinaryAtom {
    pub tuple: Vec<Id>,
    pub text: String,
}

impl OrdinaryAtom {
    pub fn predicate(&self) -> Id {
        self.tuple[0]
    }

    pub fn arity(&self) -> usize {
        self.tuple.len() - 1
    }

    /// Two atoms unify iff they have the same arity and, argument by
    /// argument, the terms are equal or at least one of them is a variable.
    pub fn unifies_with(&self, other: &OrdinaryAtom) -> bool {
        self.tuple.len() == other.tuple.len()
            && self
                .tuple
                .iter()
                .zip(other.tuple.iter())
                .all(|(lhs, rhs)| {
                    lhs == rhs || lhs.is_variable_term() || rhs.is_variable_term()
                })
    }
}

/// How an external atom interprets one of its input positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputType {
    Constant,
    /// The input interpretation consists of all atoms of the supplied
    /// predicate.
    Predicate,
    Tuple,
}

/// Boolean semantic annotations of an external source.
#[derive(EnumSetType, Debug)]
pub enum ExtProperty {
    /// Monotonic in every input.
    Monotonic,
    /// The inverse of the source relation has finite fibers: bounded
    /// outputs imply bounded inputs.
    FiniteFiber,
}

/// Semantic annotations of an external source, used by the liberal safety
/// checker. Parameterised annotations refer to 0-based input/output
/// positions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtSourceProperties {
    pub flags: EnumSet<ExtProperty>,
    /// Inputs in which the source is monotonic.
    pub monotonic_inputs: Vec<usize>,
    /// Output positions with a finite domain.
    pub finite_domain_outputs: Vec<usize>,
    /// `(output, input)` pairs: the output domain is finite relative to a
    /// safe input.
    pub relative_finite_domain: Vec<(usize, usize)>,
    /// `(input, output)` pairs supporting a string-length well-ordering.
    pub wellordering_strlen: Vec<(usize, usize)>,
    /// `(input, output)` pairs supporting a natural-number well-ordering.
    pub wellordering_natural: Vec<(usize, usize)>,
}

impl ExtSourceProperties {
    pub fn has_finite_domain(&self, output: usize) -> bool {
        self.finite_domain_outputs.contains(&output)
    }

    pub fn has_finite_fiber(&self) -> bool {
        self.flags.contains(ExtProperty::FiniteFiber)
    }

    pub fn has_wellordering_strlen(&self, input: usize, output: usize) -> bool {
        self.wellordering_strlen.contains(&(input, output))
    }

    pub fn has_wellordering_natural(&self, input: usize, output: usize) -> bool {
        self.wellordering_natural.contains(&(input, output))
    }
}

/// One occurrence of an external atom `&g[inputs](outputs)` in a rule body.
///
/// Occurrences are intentionally not interned by value: two syntactically
/// equal occurrences in different rules keep distinct addresses, which is
/// what the safety analysis needs.
#[derive(Clone, Debug)]
pub struct ExternalAtom {
    pub predicate: Id,
    pub inputs: Vec<Id>,
    pub input_types: Vec<InputType>,
    pub outputs: Vec<Id>,
    pub aux_input_predicate: Id,
    pub aux_input_mapping: Vec<Vec<usize>>,
    pub input_mask: Interpretation,
    pub output_mask: Interpretation,
    pub properties: ExtSourceProperties,
}

impl ExternalAtom {
    pub fn new(predicate: Id, inputs: Vec<Id>, input_types: Vec<InputType>, outputs: Vec<Id>) -> ExternalAtom {
        ExternalAtom {
            predicate,
            inputs,
            input_types,
            outputs,
            aux_input_predicate: crate::basic_types::ID_FAIL,
            aux_input_mapping: Vec::new(),
            input_mask: Interpretation::new(),
            output_mask: Interpretation::new(),
            properties: ExtSourceProperties::default(),
        }
    }
}

/// A builtin atom; `tuple[0]` is a builtin operator term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinAtom {
    pub tuple: Vec<Id>,
}

/// An aggregate atom in the original's five-element shape
/// `[lhs, lhsOp, function, rhsOp, rhs]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AggregateAtom {
    pub tuple: Vec<Id>,
}
