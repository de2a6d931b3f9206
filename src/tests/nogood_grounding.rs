#![cfg(test)]

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::nogoods::ImmediateNogoodGrounder;
use crate::nogoods::LazyNogoodGrounder;
use crate::nogoods::Nogood;
use crate::nogoods::NogoodGrounder;
use crate::nogoods::SimpleNogoodContainer;
use crate::registry::Registry;

struct Fixture {
    reg: Registry,
    watched: SimpleNogoodContainer,
    destination: SimpleNogoodContainer,
    program_mask: Interpretation,
    p_a: Id,
    p_b: Id,
    q_a: Id,
}

/// Watches the non-ground nogood `{ p(X), not q(X) }` over the program
/// atoms `p(a)`, `p(b)`, `q(a)`.
fn fixture() -> Fixture {
    let mut reg = Registry::new();
    let p = reg.store_constant_term("p");
    let q = reg.store_constant_term("q");
    let a = reg.store_constant_term("a");
    let b = reg.store_constant_term("b");
    let x = reg.store_variable_term("X");

    let p_x = reg.store_atom(vec![p, x]);
    let q_x = reg.store_atom(vec![q, x]);
    let nonground = Nogood::from_literals([
        Id::literal(p_x.address(), true, false),
        Id::literal(q_x.address(), false, false),
    ]);

    let p_a = reg.store_ground_atom(vec![p, a]);
    let p_b = reg.store_ground_atom(vec![p, b]);
    let q_a = reg.store_ground_atom(vec![q, a]);
    let program_mask: Interpretation = [p_a.address(), p_b.address(), q_a.address()]
        .into_iter()
        .collect();

    let watched = SimpleNogoodContainer::new();
    let _ = watched.add_nogood(nonground);

    Fixture {
        reg,
        watched,
        destination: SimpleNogoodContainer::new(),
        program_mask,
        p_a,
        p_b,
        q_a,
    }
}

fn destination_contents(destination: &SimpleNogoodContainer) -> Vec<Nogood> {
    (0..destination.slot_count())
        .filter(|index| destination.is_live(*index))
        .map(|index| destination.nogood(index))
        .collect()
}

#[test]
fn immediate_grounder_instantiates_against_the_program_mask() {
    let mut fixture = fixture();
    let mut grounder = ImmediateNogoodGrounder::new(
        fixture.watched.clone(),
        fixture.destination.clone(),
        fixture.program_mask.clone(),
    );

    let empty = Interpretation::new();
    grounder.update(&mut fixture.reg, &empty, &empty, &empty);

    let instances = destination_contents(&fixture.destination);
    // p(a) yields { p(a), not q(a) }; p(b) yields { p(b) } because q(b) is
    // not derivable, so its negative literal is always satisfied
    let full = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.q_a.address(), false, true),
    ]);
    let simplified = Nogood::from_literals([Id::literal(fixture.p_b.address(), true, true)]);
    assert_eq!(instances.len(), 2);
    assert!(instances.contains(&full));
    assert!(instances.contains(&simplified));
}

#[test]
fn immediate_grounder_keeps_a_high_water_mark() {
    let mut fixture = fixture();
    let mut grounder = ImmediateNogoodGrounder::new(
        fixture.watched.clone(),
        fixture.destination.clone(),
        fixture.program_mask.clone(),
    );

    let empty = Interpretation::new();
    grounder.update(&mut fixture.reg, &empty, &empty, &empty);
    let after_first = fixture.destination.nogood_count();
    grounder.update(&mut fixture.reg, &empty, &empty, &empty);
    assert_eq!(fixture.destination.nogood_count(), after_first);
}

#[test]
fn lazy_grounder_instantiates_on_changed_atoms() {
    let mut fixture = fixture();
    let mut grounder =
        LazyNogoodGrounder::new(fixture.watched.clone(), fixture.destination.clone());

    let empty = Interpretation::new();
    let changed: Interpretation = [fixture.p_a.address()].into_iter().collect();
    grounder.update(&mut fixture.reg, &empty, &empty, &changed);

    let instances = destination_contents(&fixture.destination);
    let expected = Nogood::from_literals([
        Id::literal(fixture.p_a.address(), true, true),
        Id::literal(fixture.q_a.address(), false, true),
    ]);
    assert_eq!(instances, vec![expected]);

    // the same change is never instantiated twice
    grounder.update(&mut fixture.reg, &empty, &empty, &changed);
    assert_eq!(fixture.destination.nogood_count(), 1);
}

#[test]
fn lazy_grounder_ignores_non_unifying_changes() {
    let mut fixture = fixture();
    let mut grounder =
        LazyNogoodGrounder::new(fixture.watched.clone(), fixture.destination.clone());

    let empty = Interpretation::new();
    let changed: Interpretation = [fixture.q_a.address()].into_iter().collect();
    grounder.update(&mut fixture.reg, &empty, &empty, &changed);
    assert_eq!(fixture.destination.nogood_count(), 0);
}
