//! Compact interned references.
//!
//! Every structured value (term, atom, literal, rule) lives in a registry
//! table and is referenced by an [`Id`]: the table address in the low 32
//! bits and the kind in the high bits. Interned values compare by identity,
//! so two ids are equal exactly when they denote the same table entry with
//! the same kind flags.

use std::fmt::Debug;
use std::fmt::Formatter;

/// Address of an entry inside one of the registry tables.
pub type Addr = u32;

const ADDRESS_MASK: u64 = 0xFFFF_FFFF;
// the main kind lives in the top two bits so that it dominates the derived
// ordering; the classification flags sit between it and the address
const MAINKIND_SHIFT: u64 = 62;
const MAINKIND_MASK: u64 = 0b11 << MAINKIND_SHIFT;

const FLAG_NAF: u64 = 1 << 34;
const FLAG_GROUND: u64 = 1 << 35;
const FLAG_ORDINARY: u64 = 1 << 36;
const FLAG_EXTERNAL: u64 = 1 << 37;
const FLAG_BUILTIN: u64 = 1 << 38;
const FLAG_AGGREGATE: u64 = 1 << 39;
const FLAG_AUX: u64 = 1 << 40;
const FLAG_EXTERNAL_AUX: u64 = 1 << 41;
const FLAG_VARIABLE: u64 = 1 << 42;
const FLAG_INTEGER: u64 = 1 << 43;

/// The main type of the table entry an [`Id`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MainKind {
    Term = 0,
    Atom = 1,
    Literal = 2,
    Rule = 3,
}

/// A packed `(kind, address)` reference into the registry.
///
/// The main kind occupies the top two bits, the classification flags sit
/// below it and the address fills the low 32 bits, so the derived ordering
/// is lexicographic by `(kind, address)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

/// Sentinel denoting the absence of an id.
pub const ID_FAIL: Id = Id(u64::MAX);

impl Id {
    fn new(main: MainKind, flags: u64, address: Addr) -> Id {
        Id(((main as u64) << MAINKIND_SHIFT) | flags | u64::from(address))
    }

    pub fn constant_term(address: Addr) -> Id {
        Id::new(MainKind::Term, 0, address)
    }

    pub fn variable_term(address: Addr) -> Id {
        Id::new(MainKind::Term, FLAG_VARIABLE, address)
    }

    pub fn integer_term(address: Addr) -> Id {
        Id::new(MainKind::Term, FLAG_INTEGER, address)
    }

    pub fn builtin_term(address: Addr) -> Id {
        Id::new(MainKind::Term, FLAG_BUILTIN, address)
    }

    pub fn ground_atom(address: Addr) -> Id {
        Id::new(MainKind::Atom, FLAG_ORDINARY | FLAG_GROUND, address)
    }

    pub fn nonground_atom(address: Addr) -> Id {
        Id::new(MainKind::Atom, FLAG_ORDINARY, address)
    }

    pub fn external_atom(address: Addr) -> Id {
        Id::new(MainKind::Atom, FLAG_EXTERNAL, address)
    }

    pub fn builtin_atom(address: Addr) -> Id {
        Id::new(MainKind::Atom, FLAG_BUILTIN, address)
    }

    pub fn aggregate_atom(address: Addr) -> Id {
        Id::new(MainKind::Atom, FLAG_AGGREGATE, address)
    }

    pub fn rule(address: Addr) -> Id {
        Id::new(MainKind::Rule, 0, address)
    }

    /// A normalised solver literal: property bits are cleared, only the
    /// ordinary/ground classification and the sign survive. `positive`
    /// refers to the literal's polarity, a negative literal carries the NAF
    /// bit.
    pub fn literal(address: Addr, positive: bool, ground: bool) -> Id {
        let mut flags = FLAG_ORDINARY;
        if !positive {
            flags |= FLAG_NAF;
        }
        if ground {
            flags |= FLAG_GROUND;
        }
        Id::new(MainKind::Literal, flags, address)
    }

    pub fn address(self) -> Addr {
        (self.0 & ADDRESS_MASK) as Addr
    }

    pub fn main_kind(self) -> MainKind {
        match (self.0 & MAINKIND_MASK) >> MAINKIND_SHIFT {
            0 => MainKind::Term,
            1 => MainKind::Atom,
            2 => MainKind::Literal,
            _ => MainKind::Rule,
        }
    }

    pub fn is_fail(self) -> bool {
        self == ID_FAIL
    }

    pub fn is_term(self) -> bool {
        !self.is_fail() && self.main_kind() == MainKind::Term
    }

    pub fn is_atom_or_literal(self) -> bool {
        !self.is_fail()
            && matches!(self.main_kind(), MainKind::Atom | MainKind::Literal)
    }

    pub fn is_rule(self) -> bool {
        !self.is_fail() && self.main_kind() == MainKind::Rule
    }

    pub fn is_naf(self) -> bool {
        self.0 & FLAG_NAF != 0
    }

    pub fn is_ground(self) -> bool {
        self.0 & FLAG_GROUND != 0
    }

    pub fn is_ordinary_atom(self) -> bool {
        self.is_atom_or_literal() && self.0 & FLAG_ORDINARY != 0
    }

    pub fn is_ordinary_ground_atom(self) -> bool {
        self.is_ordinary_atom() && self.is_ground()
    }

    pub fn is_ordinary_nonground_atom(self) -> bool {
        self.is_ordinary_atom() && !self.is_ground()
    }

    pub fn is_external_atom(self) -> bool {
        self.is_atom_or_literal() && self.0 & FLAG_EXTERNAL != 0
    }

    pub fn is_builtin_atom(self) -> bool {
        self.is_atom_or_literal() && self.0 & FLAG_BUILTIN != 0
    }

    pub fn is_aggregate_atom(self) -> bool {
        self.is_atom_or_literal() && self.0 & FLAG_AGGREGATE != 0
    }

    pub fn is_variable_term(self) -> bool {
        self.is_term() && self.0 & FLAG_VARIABLE != 0
    }

    pub fn is_integer_term(self) -> bool {
        self.is_term() && self.0 & FLAG_INTEGER != 0
    }

    pub fn is_builtin_term(self) -> bool {
        self.is_term() && self.0 & FLAG_BUILTIN != 0
    }

    pub fn is_aux(self) -> bool {
        !self.is_fail() && self.0 & FLAG_AUX != 0
    }

    pub fn is_external_aux(self) -> bool {
        !self.is_fail() && self.0 & FLAG_EXTERNAL_AUX != 0
    }

    pub fn with_aux(self) -> Id {
        Id(self.0 | FLAG_AUX)
    }

    pub fn with_external_aux(self) -> Id {
        Id(self.0 | FLAG_AUX | FLAG_EXTERNAL_AUX)
    }

    /// The same id with the NAF bit cleared.
    pub fn strip_naf(self) -> Id {
        Id(self.0 & !FLAG_NAF)
    }

    /// The same id with the NAF bit toggled.
    pub fn negated(self) -> Id {
        Id(self.0 ^ FLAG_NAF)
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_fail() {
            return write!(f, "ID_FAIL");
        }
        let kind = match self.main_kind() {
            MainKind::Term => "t",
            MainKind::Atom => "a",
            MainKind::Literal => "l",
            MainKind::Rule => "r",
        };
        write!(
            f,
            "{}{}{}{}",
            if self.is_naf() { "-" } else { "" },
            kind,
            if self.is_ground() { "g" } else { "" },
            self.address()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Id;
    use super::MainKind;
    use super::ID_FAIL;

    #[test]
    fn literal_classification() {
        let pos = Id::literal(7, true, true);
        assert!(pos.is_ordinary_ground_atom());
        assert!(!pos.is_naf());
        assert_eq!(pos.address(), 7);
        assert_eq!(pos.main_kind(), MainKind::Literal);

        let neg = pos.negated();
        assert!(neg.is_naf());
        assert_eq!(neg.strip_naf(), pos);
        assert_eq!(neg.negated(), pos);
    }

    #[test]
    fn nonground_literal_is_not_ground() {
        let lit = Id::literal(3, false, false);
        assert!(lit.is_ordinary_nonground_atom());
        assert!(!lit.is_ordinary_ground_atom());
    }

    #[test]
    fn ordering_is_kind_then_address() {
        assert!(Id::constant_term(9) < Id::ground_atom(0));
        assert!(Id::ground_atom(1) < Id::ground_atom(2));
        assert!(Id::ground_atom(500) < Id::rule(0));
        assert!(Id::rule(0) < ID_FAIL);
    }

    #[test]
    fn aux_flags_survive_negation() {
        let aux = Id::ground_atom(4).with_external_aux();
        assert!(aux.is_external_aux());
        assert!(aux.negated().is_external_aux());
    }
}
