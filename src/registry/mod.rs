//! The process-wide interning facility.
//!
//! Terms, atoms and rules are stored once in append-only tables and are
//! referenced everywhere else by [`Id`]. The registry is created before any
//! solver object and outlives them all; ids stay valid for its lifetime.

mod atoms;
mod rules;
mod terms;

use fnv::FnvHashMap;
use fnv::FnvHashSet;

use crate::basic_types::Addr;
use crate::basic_types::Id;
use crate::hexkin_assert_moderate;

pub use atoms::AggregateAtom;
pub use atoms::BuiltinAtom;
pub use atoms::ExtProperty;
pub use atoms::ExtSourceProperties;
pub use atoms::ExternalAtom;
pub use atoms::InputType;
pub use atoms::OrdinaryAtom;
pub use rules::Rule;
pub use rules::RuleKind;
pub use terms::BuiltinOp;
pub use terms::Term;

/// Collects the distinct variable terms of a term tuple in order of first
/// occurrence.
pub fn variables_in_tuple(tuple: &[Id]) -> Vec<Id> {
    let mut seen = FnvHashSet::default();
    tuple
        .iter()
        .copied()
        .filter(|term| term.is_variable_term() && seen.insert(*term))
        .collect()
}

#[derive(Default)]
pub struct Registry {
    terms: Vec<Term>,
    term_index: FnvHashMap<Term, Addr>,
    ground_atoms: Vec<OrdinaryAtom>,
    ground_atom_index: FnvHashMap<Vec<Id>, Addr>,
    nonground_atoms: Vec<OrdinaryAtom>,
    nonground_atom_index: FnvHashMap<Vec<Id>, Addr>,
    external_atoms: Vec<ExternalAtom>,
    builtin_atoms: Vec<BuiltinAtom>,
    builtin_atom_index: FnvHashMap<BuiltinAtom, Addr>,
    aggregate_atoms: Vec<AggregateAtom>,
    aggregate_atom_index: FnvHashMap<AggregateAtom, Addr>,
    rules: Vec<Rule>,
    rule_index: FnvHashMap<Rule, Addr>,
    aux_terms: FnvHashSet<Addr>,
    external_aux_terms: FnvHashSet<Addr>,
    /// `(external predicate, positive)` to replacement predicate.
    replacement_index: FnvHashMap<(Id, bool), Id>,
    /// Replacement predicate to its opposite-polarity sibling.
    replacement_swap: FnvHashMap<Id, Id>,
    aux_counter: u32,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    fn intern_term(&mut self, term: Term) -> Addr {
        if let Some(address) = self.term_index.get(&term) {
            return *address;
        }
        let address = self.terms.len() as Addr;
        let _ = self.term_index.insert(term.clone(), address);
        self.terms.push(term);
        address
    }

    pub fn store_constant_term(&mut self, name: &str) -> Id {
        let address = self.intern_term(Term::Constant(name.to_owned()));
        let id = Id::constant_term(address);
        self.decorate_term(id)
    }

    pub fn store_variable_term(&mut self, name: &str) -> Id {
        Id::variable_term(self.intern_term(Term::Variable(name.to_owned())))
    }

    pub fn store_integer_term(&mut self, value: u32) -> Id {
        Id::integer_term(self.intern_term(Term::Integer(value)))
    }

    pub fn builtin_term(&mut self, op: BuiltinOp) -> Id {
        Id::builtin_term(self.intern_term(Term::Builtin(op)))
    }

    pub fn term(&self, id: Id) -> &Term {
        &self.terms[id.address() as usize]
    }

    pub fn term_text(&self, id: Id) -> String {
        self.term(id).text()
    }

    fn decorate_term(&self, id: Id) -> Id {
        if self.external_aux_terms.contains(&id.address()) {
            id.with_external_aux()
        } else if self.aux_terms.contains(&id.address()) {
            id.with_aux()
        } else {
            id
        }
    }

    fn atom_text(&self, tuple: &[Id]) -> String {
        let mut text = self.term_text(tuple[0]);
        if tuple.len() > 1 {
            text.push('(');
            for (position, argument) in tuple[1..].iter().enumerate() {
                if position > 0 {
                    text.push(',');
                }
                text.push_str(&self.term_text(*argument));
            }
            text.push(')');
        }
        text
    }

    fn decorate_atom(&self, id: Id, predicate: Id) -> Id {
        if self.external_aux_terms.contains(&predicate.address()) {
            id.with_external_aux()
        } else if self.aux_terms.contains(&predicate.address()) {
            id.with_aux()
        } else {
            id
        }
    }

    /// Interns a ground ordinary atom. The tuple must not contain variable
    /// terms.
    pub fn store_ground_atom(&mut self, tuple: Vec<Id>) -> Id {
        hexkin_assert_moderate!(
            tuple.iter().all(|term| !term.is_variable_term()),
            "ground atoms must not contain variables"
        );
        let predicate = tuple[0];
        if let Some(address) = self.ground_atom_index.get(&tuple) {
            return self.decorate_atom(Id::ground_atom(*address), predicate);
        }
        let address = self.ground_atoms.len() as Addr;
        let text = self.atom_text(&tuple);
        let _ = self.ground_atom_index.insert(tuple.clone(), address);
        self.ground_atoms.push(OrdinaryAtom { tuple, text });
        self.decorate_atom(Id::ground_atom(address), predicate)
    }

    /// Interns a non-ground ordinary atom. The tuple must contain at least
    /// one variable term.
    pub fn store_nonground_atom(&mut self, tuple: Vec<Id>) -> Id {
        hexkin_assert_moderate!(
            tuple.iter().any(|term| term.is_variable_term()),
            "non-ground atoms must contain a variable"
        );
        let predicate = tuple[0];
        if let Some(address) = self.nonground_atom_index.get(&tuple) {
            return self.decorate_atom(Id::nonground_atom(*address), predicate);
        }
        let address = self.nonground_atoms.len() as Addr;
        let text = self.atom_text(&tuple);
        let _ = self.nonground_atom_index.insert(tuple.clone(), address);
        self.nonground_atoms.push(OrdinaryAtom { tuple, text });
        self.decorate_atom(Id::nonground_atom(address), predicate)
    }

    /// Interns an ordinary atom, classifying it as ground or non-ground by
    /// its arguments.
    pub fn store_atom(&mut self, tuple: Vec<Id>) -> Id {
        if tuple.iter().any(|term| term.is_variable_term()) {
            self.store_nonground_atom(tuple)
        } else {
            self.store_ground_atom(tuple)
        }
    }

    /// Looks up an ordinary atom behind an atom or literal id; the GROUND
    /// flag selects the table.
    pub fn ordinary_atom(&self, id: Id) -> &OrdinaryAtom {
        if id.is_ground() {
            &self.ground_atoms[id.address() as usize]
        } else {
            &self.nonground_atoms[id.address() as usize]
        }
    }

    pub fn ground_atom_by_address(&self, address: Addr) -> &OrdinaryAtom {
        &self.ground_atoms[address as usize]
    }

    pub fn ground_atom_id(&self, address: Addr) -> Id {
        let predicate = self.ground_atoms[address as usize].tuple[0];
        self.decorate_atom(Id::ground_atom(address), predicate)
    }

    pub fn ground_atom_count(&self) -> usize {
        self.ground_atoms.len()
    }

    /// Stores one external-atom occurrence. Occurrences are not interned:
    /// every call yields a fresh address.
    pub fn store_external_atom(&mut self, atom: ExternalAtom) -> Id {
        let address = self.external_atoms.len() as Addr;
        self.external_atoms.push(atom);
        Id::external_atom(address)
    }

    pub fn external_atom(&self, id: Id) -> &ExternalAtom {
        &self.external_atoms[id.strip_naf().address() as usize]
    }

    pub fn store_builtin_atom(&mut self, tuple: Vec<Id>) -> Id {
        let atom = BuiltinAtom { tuple };
        if let Some(address) = self.builtin_atom_index.get(&atom) {
            return Id::builtin_atom(*address);
        }
        let address = self.builtin_atoms.len() as Addr;
        let _ = self.builtin_atom_index.insert(atom.clone(), address);
        self.builtin_atoms.push(atom);
        Id::builtin_atom(address)
    }

    pub fn builtin_atom(&self, id: Id) -> &BuiltinAtom {
        &self.builtin_atoms[id.strip_naf().address() as usize]
    }

    pub fn store_aggregate_atom(&mut self, tuple: Vec<Id>) -> Id {
        let atom = AggregateAtom { tuple };
        if let Some(address) = self.aggregate_atom_index.get(&atom) {
            return Id::aggregate_atom(*address);
        }
        let address = self.aggregate_atoms.len() as Addr;
        let _ = self.aggregate_atom_index.insert(atom.clone(), address);
        self.aggregate_atoms.push(atom);
        Id::aggregate_atom(address)
    }

    pub fn aggregate_atom(&self, id: Id) -> &AggregateAtom {
        &self.aggregate_atoms[id.strip_naf().address() as usize]
    }

    pub fn store_rule(&mut self, rule: Rule) -> Id {
        if let Some(address) = self.rule_index.get(&rule) {
            return Id::rule(*address);
        }
        let address = self.rules.len() as Addr;
        let _ = self.rule_index.insert(rule.clone(), address);
        self.rules.push(rule);
        Id::rule(address)
    }

    pub fn rule(&self, id: Id) -> &Rule {
        &self.rules[id.address() as usize]
    }

    /// Creates a fresh auxiliary constant usable as a predicate, e.g. for
    /// the rule-body atoms of the Clark completion.
    pub fn fresh_aux_predicate(&mut self, prefix: &str) -> Id {
        loop {
            let name = format!("aux_{}_{}", prefix, self.aux_counter);
            self.aux_counter += 1;
            let term = Term::Constant(name);
            if self.term_index.contains_key(&term) {
                continue;
            }
            let address = self.intern_term(term);
            let _ = self.aux_terms.insert(address);
            return Id::constant_term(address).with_aux();
        }
    }

    /// The replacement predicate `aux_r_g` (positive) or `aux_n_g`
    /// (negative) associated with external predicate `g`. Both directions
    /// of the swap mapping are registered on first use.
    pub fn external_replacement_predicate(&mut self, ext_predicate: Id, positive: bool) -> Id {
        if let Some(id) = self.replacement_index.get(&(ext_predicate, positive)) {
            return *id;
        }
        let name = format!(
            "aux_{}_{}",
            if positive { "r" } else { "n" },
            self.term_text(ext_predicate)
        );
        let address = self.intern_term(Term::Constant(name));
        let _ = self.external_aux_terms.insert(address);
        let id = Id::constant_term(address).with_external_aux();
        let _ = self.replacement_index.insert((ext_predicate, positive), id);
        if let Some(other) = self.replacement_index.get(&(ext_predicate, !positive)).copied() {
            let _ = self.replacement_swap.insert(id, other);
            let _ = self.replacement_swap.insert(other, id);
        }
        id
    }

    pub fn is_external_aux_predicate(&self, term: Id) -> bool {
        self.external_aux_terms.contains(&term.address())
    }

    /// Maps a ground replacement atom to its opposite-polarity sibling
    /// (`aux_r_g(..)` to `aux_n_g(..)` and back), preserving the NAF bit.
    pub fn swap_external_aux_atom(&mut self, atom: Id) -> Id {
        let naf = atom.is_naf();
        let tuple = {
            let ordinary = self.ordinary_atom(atom.strip_naf());
            let mut tuple = ordinary.tuple.clone();
            tuple[0] = *self
                .replacement_swap
                .get(&tuple[0])
                .expect("atom is not a replacement auxiliary");
            tuple
        };
        let swapped = self.store_ground_atom(tuple);
        if naf {
            swapped.negated()
        } else {
            swapped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExternalAtom;
    use super::InputType;
    use super::Registry;
    use super::Rule;

    #[test]
    fn interning_is_by_identity() {
        let mut reg = Registry::new();
        let p = reg.store_constant_term("p");
        let a = reg.store_constant_term("a");
        let first = reg.store_ground_atom(vec![p, a]);
        let second = reg.store_ground_atom(vec![p, a]);
        assert_eq!(first, second);
        assert_eq!(reg.ordinary_atom(first).text, "p(a)");
    }

    #[test]
    fn ground_and_nonground_tables_are_disjoint() {
        let mut reg = Registry::new();
        let p = reg.store_constant_term("p");
        let a = reg.store_constant_term("a");
        let x = reg.store_variable_term("X");
        let ground = reg.store_atom(vec![p, a]);
        let nonground = reg.store_atom(vec![p, x]);
        assert!(ground.is_ordinary_ground_atom());
        assert!(nonground.is_ordinary_nonground_atom());
        assert!(reg.ordinary_atom(nonground).unifies_with(reg.ordinary_atom(ground)));
    }

    #[test]
    fn replacement_predicates_swap() {
        let mut reg = Registry::new();
        let g = reg.store_constant_term("g");
        let pos = reg.external_replacement_predicate(g, true);
        let neg = reg.external_replacement_predicate(g, false);
        assert!(pos.is_external_aux());
        assert_ne!(pos, neg);

        let c = reg.store_constant_term("c");
        let pos_atom = reg.store_ground_atom(vec![pos, c]);
        assert!(pos_atom.is_external_aux());
        let neg_atom = reg.swap_external_aux_atom(pos_atom);
        assert_eq!(reg.ordinary_atom(neg_atom).predicate(), neg);
        assert_eq!(reg.swap_external_aux_atom(neg_atom), pos_atom);
    }

    #[test]
    fn external_occurrences_are_not_interned() {
        let mut reg = Registry::new();
        let g = reg.store_constant_term("g");
        let x = reg.store_variable_term("X");
        let first = reg.store_external_atom(ExternalAtom::new(
            g,
            vec![x],
            vec![InputType::Constant],
            vec![x],
        ));
        let second = reg.store_external_atom(ExternalAtom::new(
            g,
            vec![x],
            vec![InputType::Constant],
            vec![x],
        ));
        assert_ne!(first, second);
    }

    #[test]
    fn rules_are_interned() {
        let mut reg = Registry::new();
        let p = reg.store_constant_term("p");
        let a = reg.store_constant_term("a");
        let atom = reg.store_ground_atom(vec![p, a]);
        let first = reg.store_rule(Rule::regular(vec![atom], vec![]));
        let second = reg.store_rule(Rule::regular(vec![atom], vec![]));
        assert_eq!(first, second);
    }
}
