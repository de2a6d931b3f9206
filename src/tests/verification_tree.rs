#![cfg(test)]

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::engine::ExternalAtomVerificationTree;
use crate::nogoods::Nogood;
use crate::registry::Registry;

struct Fixture {
    reg: Registry,
    p_a: Id,
    p_b: Id,
    aux_pos: Id,
    aux_neg: Id,
}

/// One external source with input atoms `p(a)`, `p(b)` and the positive
/// and negative replacement atoms over the constant `a`.
fn fixture() -> Fixture {
    let mut reg = Registry::new();
    let p = reg.store_constant_term("p");
    let a = reg.store_constant_term("a");
    let b = reg.store_constant_term("b");
    let g = reg.store_constant_term("g");

    let p_a = reg.store_ground_atom(vec![p, a]);
    let p_b = reg.store_ground_atom(vec![p, b]);
    let pos_pred = reg.external_replacement_predicate(g, true);
    let neg_pred = reg.external_replacement_predicate(g, false);
    let aux_pos = reg.store_ground_atom(vec![pos_pred, a]);
    let aux_neg = reg.store_ground_atom(vec![neg_pred, a]);

    Fixture {
        reg,
        p_a,
        p_b,
        aux_pos,
        aux_neg,
    }
}

#[test]
fn matching_paths_verify_their_auxiliaries() {
    let mut fixture = fixture();
    let mut tree = ExternalAtomVerificationTree::new();

    // { p(a), not p(b), not aux } verifies aux once p(a) is true and p(b)
    // is false
    let io_nogood = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.p_b.address(), false, true),
        Id::literal(fixture.aux_pos.address(), false, true),
    ]);
    tree.add_nogood(&io_nogood, &mut fixture.reg, false);

    let partial: Interpretation = [fixture.p_a.address()].into_iter().collect();
    let assigned: Interpretation = [fixture.p_a.address(), fixture.p_b.address()]
        .into_iter()
        .collect();
    let verified = tree.verified_auxiliaries(&partial, &assigned);
    assert!(verified.get_fact(fixture.aux_pos.address()));
    assert!(!verified.get_fact(fixture.aux_neg.address()));
}

#[test]
fn unassigned_path_literals_block_verification() {
    let mut fixture = fixture();
    let mut tree = ExternalAtomVerificationTree::new();
    let io_nogood = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.aux_pos.address(), false, true),
    ]);
    tree.add_nogood(&io_nogood, &mut fixture.reg, false);

    // p(a) is true in the partial assignment but not yet assigned
    let partial: Interpretation = [fixture.p_a.address()].into_iter().collect();
    let assigned = Interpretation::new();
    let verified = tree.verified_auxiliaries(&partial, &assigned);
    assert!(verified.is_empty());
}

#[test]
fn include_negated_also_verifies_the_sibling() {
    let mut fixture = fixture();
    let mut tree = ExternalAtomVerificationTree::new();
    let io_nogood = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.aux_pos.address(), false, true),
    ]);
    tree.add_nogood(&io_nogood, &mut fixture.reg, true);

    let partial: Interpretation = [fixture.p_a.address()].into_iter().collect();
    let assigned = partial.clone();
    let verified = tree.verified_auxiliaries(&partial, &assigned);
    assert!(verified.get_fact(fixture.aux_pos.address()));
    assert!(verified.get_fact(fixture.aux_neg.address()));
}

#[test]
fn nogoods_without_exactly_one_auxiliary_are_ignored() {
    let mut fixture = fixture();
    let mut tree = ExternalAtomVerificationTree::new();

    // no auxiliary at all
    let plain = Nogood::from_literals([Id::literal(fixture.p_a.address(), true, true)]);
    tree.add_nogood(&plain, &mut fixture.reg, false);

    // two auxiliaries
    let double = Nogood::from_literals([
        Id::literal(fixture.aux_pos.address(), true, true),
        Id::literal(fixture.aux_neg.address(), false, true),
    ]);
    tree.add_nogood(&double, &mut fixture.reg, false);

    let partial: Interpretation = [fixture.p_a.address(), fixture.aux_pos.address()]
        .into_iter()
        .collect();
    let verified = tree.verified_auxiliaries(&partial, &partial);
    assert!(verified.is_empty());
}

#[test]
fn shared_prefixes_share_tree_paths() {
    let mut fixture = fixture();
    let mut tree = ExternalAtomVerificationTree::new();

    // both nogoods run through the p(a) edge; their verified sets differ
    let first = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.aux_pos.address(), false, true),
    ]);
    let second = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.p_b.address(), true, true),
        Id::literal(fixture.aux_neg.address(), false, true),
    ]);
    tree.add_nogood(&first, &mut fixture.reg, false);
    tree.add_nogood(&second, &mut fixture.reg, false);

    let partial: Interpretation = [fixture.p_a.address()].into_iter().collect();
    let verified = tree.verified_auxiliaries(&partial, &partial);
    assert!(verified.get_fact(fixture.aux_pos.address()));
    assert!(!verified.get_fact(fixture.aux_neg.address()));

    let both: Interpretation = [fixture.p_a.address(), fixture.p_b.address()]
        .into_iter()
        .collect();
    let verified = tree.verified_auxiliaries(&both, &both);
    assert!(verified.get_fact(fixture.aux_pos.address()));
    assert!(verified.get_fact(fixture.aux_neg.address()));
}
