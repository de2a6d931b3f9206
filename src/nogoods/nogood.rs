//! Nogoods: sets of signed literals that must not be jointly satisfied.

use std::hash::Hash;
use std::hash::Hasher;

use fnv::FnvHashMap;
use fnv::FnvHasher;
use log::trace;

use crate::basic_types::Addr;
use crate::basic_types::Id;
use crate::hexkin_assert_simple;
use crate::registry::Registry;

/// Normalises an atom or literal id for storage inside a [`Nogood`]:
/// property bits are cleared, only the ordinary/ground classification and
/// the NAF bit survive.
pub fn normalized_literal(lit: Id) -> Id {
    Id::literal(lit.address(), !lit.is_naf(), lit.is_ordinary_ground_atom())
}

/// An ordered set of normalised literal ids with a cached hash.
///
/// A nogood is ground iff every literal refers to a ground atom.
#[derive(Clone, Debug, Default)]
pub struct Nogood {
    literals: Vec<Id>,
    hash: u64,
    ground: bool,
}

impl Nogood {
    pub fn new() -> Nogood {
        Nogood {
            literals: Vec::new(),
            hash: 0,
            ground: true,
        }
    }

    pub fn from_literals(literals: impl IntoIterator<Item = Id>) -> Nogood {
        let mut nogood = Nogood::new();
        for literal in literals {
            nogood.insert(literal);
        }
        nogood
    }

    /// Inserts a literal; the id is normalised first, duplicates are
    /// ignored.
    pub fn insert(&mut self, literal: Id) {
        let literal = normalized_literal(literal);
        match self.literals.binary_search(&literal) {
            Ok(_) => {}
            Err(position) => {
                self.literals.insert(position, literal);
                self.ground &= literal.is_ordinary_ground_atom();
                self.recompute_hash();
            }
        }
    }

    fn remove(&mut self, literal: Id) {
        if let Ok(position) = self.literals.binary_search(&literal) {
            let _ = self.literals.remove(position);
            self.ground = self
                .literals
                .iter()
                .all(|lit| lit.is_ordinary_ground_atom());
            self.recompute_hash();
        }
    }

    fn recompute_hash(&mut self) {
        let mut hasher = FnvHasher::default();
        for literal in &self.literals {
            literal.hash(&mut hasher);
        }
        self.hash = hasher.finish();
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    pub fn is_ground(&self) -> bool {
        self.ground
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Id> + '_ {
        self.literals.iter().copied()
    }

    pub fn contains(&self, literal: Id) -> bool {
        self.literals
            .binary_search(&normalized_literal(literal))
            .is_ok()
    }

    /// Resolves this nogood with `other` on the ground atom `pivot`: the
    /// union of both nogoods minus both polarities of the pivot. The pivot
    /// must occur with opposite signs, which makes the resolvent strictly
    /// smaller than the two inputs together.
    pub fn resolve(&self, other: &Nogood, pivot: Addr) -> Nogood {
        let mut resolvent = self.clone();
        for literal in other.iter() {
            resolvent.insert(literal);
        }
        resolvent.remove(Id::literal(pivot, true, true));
        resolvent.remove(Id::literal(pivot, false, true));
        trace!("resolved {:?} with {:?} on {}: {:?}", self, other, pivot, resolvent);
        hexkin_assert_simple!(
            resolvent.len() < self.len() + other.len(),
            "resolvent is not smaller than the union of its inputs; the pivot must occur with opposite signs in both nogoods"
        );
        resolvent
    }

    /// Rebuilds every literal with the argument substitution applied.
    /// The substitution is simultaneous; atoms whose arguments become
    /// variable-free move to the ground table.
    pub fn apply_substitution(&mut self, reg: &mut Registry, subst: &FnvHashMap<Id, Id>) {
        let mut replacement = Nogood::new();
        for literal in &self.literals {
            let mut tuple = reg.ordinary_atom(*literal).tuple.clone();
            let mut changed = false;
            for term in tuple.iter_mut().skip(1) {
                if let Some(image) = subst.get(term) {
                    *term = *image;
                    changed = true;
                }
            }
            let new_literal = if changed {
                let atom = reg.store_atom(tuple);
                Id::literal(atom.address(), !literal.is_naf(), atom.is_ground())
            } else {
                *literal
            };
            replacement.insert(new_literal);
        }
        *self = replacement;
    }

    /// Renames the variables canonically to `X0, X1, …`, ranked by total
    /// occurrence count and then by per-argument-position counts, all
    /// descending. Alpha-equivalent nogoods collapse to one
    /// representative, which keeps resolution-produced duplicates out of
    /// the containers.
    pub fn heuristic_normalization(&mut self, reg: &mut Registry) {
        if self.ground {
            return;
        }

        let mut occurrences: FnvHashMap<Id, Vec<u32>> = FnvHashMap::default();
        let mut first_seen: FnvHashMap<Id, usize> = FnvHashMap::default();
        let mut seen = 0;
        for literal in &self.literals {
            let atom = reg.ordinary_atom(*literal);
            for (position, term) in atom.tuple.iter().enumerate().skip(1) {
                if term.is_variable_term() {
                    let counts = occurrences.entry(*term).or_default();
                    if counts.len() < position + 1 {
                        counts.resize(position + 1, 0);
                    }
                    counts[0] += 1;
                    counts[position] += 1;
                    let _ = first_seen.entry(*term).or_insert_with(|| {
                        seen += 1;
                        seen
                    });
                }
            }
        }

        let width = occurrences.values().map(Vec::len).max().unwrap_or(0);
        let mut ranked: Vec<(Id, Vec<u32>)> = occurrences
            .into_iter()
            .map(|(var, mut counts)| {
                counts.resize(width, 0);
                (var, counts)
            })
            .collect();
        ranked.sort_by(|(lhs_var, lhs), (rhs_var, rhs)| {
            rhs.cmp(lhs)
                .then_with(|| first_seen[lhs_var].cmp(&first_seen[rhs_var]))
        });

        let mut renaming = FnvHashMap::default();
        for (index, (var, _)) in ranked.into_iter().enumerate() {
            let fresh = reg.store_variable_term(&format!("X{index}"));
            let _ = renaming.insert(var, fresh);
        }
        self.apply_substitution(reg, &renaming);
    }

    /// Searches a literal that unifies with the given ground atom, applies
    /// the most general unifier to the whole nogood and collects the
    /// (possibly still non-ground) instance into `instance`. Returns false
    /// when no literal matches.
    pub fn match_against(
        &self,
        reg: &mut Registry,
        ground_atom: Id,
        instance: &mut Nogood,
    ) -> bool {
        let target = reg.ordinary_atom(ground_atom).clone();
        for literal in &self.literals {
            let candidate = reg.ordinary_atom(*literal).clone();
            if !target.unifies_with(&candidate) {
                continue;
            }

            let mut unifier: FnvHashMap<Id, Id> = FnvHashMap::default();
            for (position, term) in candidate.tuple.iter().enumerate() {
                if term.is_variable_term() {
                    let _ = unifier.insert(*term, target.tuple[position]);
                }
            }

            for other in &self.literals {
                if other.is_ordinary_ground_atom() {
                    instance.insert(*other);
                } else {
                    let mut tuple = reg.ordinary_atom(*other).tuple.clone();
                    for term in tuple.iter_mut() {
                        if let Some(image) = unifier.get(term) {
                            *term = *image;
                        }
                    }
                    let atom = reg.store_atom(tuple);
                    instance.insert(Id::literal(
                        atom.address(),
                        !other.is_naf(),
                        atom.is_ground(),
                    ));
                }
            }
            return true;
        }
        false
    }
}

impl PartialEq for Nogood {
    fn eq(&self, other: &Nogood) -> bool {
        self.hash == other.hash && self.literals == other.literals
    }
}

impl Eq for Nogood {}

impl Hash for Nogood {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use fnv::FnvHashMap;

    use super::Nogood;
    use crate::basic_types::Id;
    use crate::registry::Registry;

    fn pos(addr: u32) -> Id {
        Id::literal(addr, true, true)
    }

    fn neg(addr: u32) -> Id {
        Id::literal(addr, false, true)
    }

    #[test]
    fn literals_are_deduplicated_and_sorted() {
        let ng = Nogood::from_literals([pos(3), pos(1), pos(3), neg(2)]);
        assert_eq!(ng.len(), 3);
        assert!(ng.contains(pos(1)));
        assert!(ng.contains(neg(2)));
        assert!(!ng.contains(pos(2)));
        assert!(ng.is_ground());
    }

    #[test]
    fn resolution_is_contractive() {
        let a = Nogood::from_literals([pos(1), pos(2)]);
        let b = Nogood::from_literals([neg(1), pos(3)]);
        let resolvent = a.resolve(&b, 1);
        assert_eq!(resolvent, Nogood::from_literals([pos(2), pos(3)]));
        assert!(resolvent.len() < a.len() + b.len());
    }

    #[test]
    fn equal_content_means_equal_hash() {
        let a = Nogood::from_literals([pos(1), neg(2)]);
        let b = Nogood::from_literals([neg(2), pos(1)]);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_eq!(a, b);
    }

    fn setup_nonground(reg: &mut Registry, var_names: [&str; 2]) -> Nogood {
        let p = reg.store_constant_term("p");
        let q = reg.store_constant_term("q");
        let x = reg.store_variable_term(var_names[0]);
        let y = reg.store_variable_term(var_names[1]);
        // p(X, Y), p(X, X), q(Y): X occurs more often than Y.
        let a = reg.store_atom(vec![p, x, y]);
        let b = reg.store_atom(vec![p, x, x]);
        let c = reg.store_atom(vec![q, y]);
        Nogood::from_literals([
            Id::literal(a.address(), true, false),
            Id::literal(b.address(), true, false),
            Id::literal(c.address(), false, false),
        ])
    }

    #[test]
    fn normalization_canonicalizes_alpha_equivalent_nogoods() {
        let mut reg = Registry::new();
        let mut first = setup_nonground(&mut reg, ["U", "V"]);
        let mut second = setup_nonground(&mut reg, ["A", "B"]);
        assert_ne!(first, second);

        first.heuristic_normalization(&mut reg);
        second.heuristic_normalization(&mut reg);
        assert_eq!(first, second);

        let snapshot = first.clone();
        first.heuristic_normalization(&mut reg);
        assert_eq!(first, snapshot);
    }

    #[test]
    fn substitution_grounds_the_nogood() {
        let mut reg = Registry::new();
        let p = reg.store_constant_term("p");
        let x = reg.store_variable_term("X");
        let a = reg.store_constant_term("a");
        let atom = reg.store_atom(vec![p, x]);
        let mut ng = Nogood::from_literals([Id::literal(atom.address(), true, false)]);
        assert!(!ng.is_ground());

        let subst: FnvHashMap<Id, Id> = [(x, a)].into_iter().collect();
        ng.apply_substitution(&mut reg, &subst);
        assert!(ng.is_ground());
        let expected = reg.store_ground_atom(vec![p, a]);
        assert!(ng.contains(Id::literal(expected.address(), true, true)));
    }

    #[test]
    fn matching_instantiates_the_whole_nogood() {
        let mut reg = Registry::new();
        let p = reg.store_constant_term("p");
        let q = reg.store_constant_term("q");
        let x = reg.store_variable_term("X");
        let a = reg.store_constant_term("a");
        let p_x = reg.store_atom(vec![p, x]);
        let q_x = reg.store_atom(vec![q, x]);
        let ng = Nogood::from_literals([
            Id::literal(p_x.address(), true, false),
            Id::literal(q_x.address(), false, false),
        ]);

        let p_a = reg.store_ground_atom(vec![p, a]);
        let mut instance = Nogood::new();
        assert!(ng.match_against(&mut reg, p_a, &mut instance));
        assert!(instance.is_ground());

        let q_a = reg.store_ground_atom(vec![q, a]);
        assert!(instance.contains(Id::literal(p_a.address(), true, true)));
        assert!(instance.contains(Id::literal(q_a.address(), false, true)));
    }
}
