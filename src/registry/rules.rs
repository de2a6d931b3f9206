//! Rule representation.

use crate::basic_types::Id;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Regular,
    Constraint,
    /// Recognised so the ground solver can reject it by name.
    WeakConstraint,
    /// Recognised so the ground solver can reject it by name.
    WeightRule,
}

/// A disjunctive rule `h1 v ... v hm :- b1, ..., bn`.
///
/// Head entries are atom ids; body entries are atom ids with an optional
/// NAF bit. An empty head makes the rule a constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub kind: RuleKind,
    pub head: Vec<Id>,
    pub body: Vec<Id>,
    pub weight: Option<u32>,
    pub level: Option<u32>,
}

impl Rule {
    pub fn regular(head: Vec<Id>, body: Vec<Id>) -> Rule {
        let kind = if head.is_empty() {
            RuleKind::Constraint
        } else {
            RuleKind::Regular
        };
        Rule {
            kind,
            head,
            body,
            weight: None,
            level: None,
        }
    }

    pub fn is_disjunctive(&self) -> bool {
        self.head.len() > 1
    }
}
