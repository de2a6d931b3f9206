//! Grounding strategies for non-ground nogoods produced by external
//! propagators.
//!
//! Both strategies share a buffer of watched non-ground nogoods and a
//! destination buffer of ground nogoods consumable by the solver, and both
//! keep a high-water mark over the watched buffer so already-processed
//! nogoods are not revisited.

use fnv::FnvHashSet;
use log::debug;
use log::trace;

use crate::basic_types::Addr;
use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::ID_FAIL;
use crate::nogoods::Nogood;
use crate::nogoods::SimpleNogoodContainer;
use crate::registry::Registry;

/// Lifts non-ground nogoods from the watched container into ground nogoods
/// in the destination container.
pub trait NogoodGrounder {
    /// Called whenever propagation has stabilised; `changed` lists the
    /// atoms whose truth value possibly changed since the last call.
    fn update(
        &mut self,
        reg: &mut Registry,
        partial: &Interpretation,
        assigned: &Interpretation,
        changed: &Interpretation,
    );

    /// Replaces the watched container and restarts the high-water mark.
    fn reset_watched(&mut self, watched: SimpleNogoodContainer);
}

/// Picks the literal of `nogood` that binds the largest number of distinct
/// variables; ground literals cannot bind anything and are skipped.
fn most_binding_literal(reg: &Registry, nogood: &Nogood) -> Id {
    let mut best = ID_FAIL;
    let mut best_bound = 0;
    for literal in nogood.iter() {
        if literal.is_ordinary_ground_atom() {
            continue;
        }
        let atom = reg.ordinary_atom(literal);
        let mut distinct: FnvHashSet<Id> = FnvHashSet::default();
        for term in &atom.tuple {
            if term.is_variable_term() {
                let _ = distinct.insert(*term);
            }
        }
        if distinct.len() > best_bound {
            best_bound = distinct.len();
            best = literal;
        }
    }
    best
}

/// Immediate strategy: each new non-ground nogood is instantiated against
/// every program atom that unifies with its most-binding literal, and the
/// instances are simplified before they are forwarded.
#[derive(Debug)]
pub struct ImmediateNogoodGrounder {
    watched: SimpleNogoodContainer,
    destination: SimpleNogoodContainer,
    program_mask: Interpretation,
    instantiated_index: usize,
}

impl ImmediateNogoodGrounder {
    pub fn new(
        watched: SimpleNogoodContainer,
        destination: SimpleNogoodContainer,
        program_mask: Interpretation,
    ) -> ImmediateNogoodGrounder {
        ImmediateNogoodGrounder {
            watched,
            destination,
            program_mask,
            instantiated_index: 0,
        }
    }

    fn instantiate_against(&self, reg: &mut Registry, nogood: &Nogood, program_atom: Id) {
        let mut instance = Nogood::new();
        if !nogood.match_against(reg, program_atom, &mut instance) {
            return;
        }
        trace!("instantiated {:?} from {:?}", instance, nogood);

        // drop instances with a positive literal over an underivable atom
        // (they can never fire) and remove always-satisfied negative ones
        let mut relevant = true;
        let mut simplified = Nogood::new();
        for literal in instance.iter() {
            let derivable = !literal.is_ordinary_ground_atom()
                || reg.ground_atom_id(literal.address()).is_aux()
                || self.program_mask.get_fact(literal.address());
            if derivable {
                simplified.insert(literal);
            } else if !literal.is_naf() {
                relevant = false;
                break;
            }
        }
        if !relevant {
            return;
        }

        if simplified.is_ground() {
            let _ = self.destination.add_nogood(simplified);
        } else {
            let _ = self.watched.add_nogood(simplified);
        }
    }
}

impl NogoodGrounder for ImmediateNogoodGrounder {
    fn update(
        &mut self,
        reg: &mut Registry,
        _partial: &Interpretation,
        _assigned: &Interpretation,
        _changed: &Interpretation,
    ) {
        let max = self.watched.slot_count();
        if self.instantiated_index >= max {
            self.instantiated_index = 0;
        }
        debug!(
            "immediate nogood grounder considers slots {}..{}",
            self.instantiated_index, max
        );
        for index in self.instantiated_index..max {
            if !self.watched.is_live(index) {
                continue;
            }
            let nogood = self.watched.nogood(index);
            if nogood.is_ground() {
                continue;
            }

            let watched_literal = most_binding_literal(reg, &nogood);
            if watched_literal == ID_FAIL {
                continue;
            }
            let watched_atom = reg.ordinary_atom(watched_literal).clone();

            let candidates: Vec<Addr> = self
                .program_mask
                .iter()
                .filter(|address| {
                    reg.ground_atom_by_address(*address).unifies_with(&watched_atom)
                })
                .collect();
            for address in candidates {
                let program_atom = reg.ground_atom_id(address);
                self.instantiate_against(reg, &nogood, program_atom);
            }
        }
        self.instantiated_index = max;
    }

    fn reset_watched(&mut self, watched: SimpleNogoodContainer) {
        self.watched = watched;
        self.instantiated_index = 0;
    }
}

/// Lazy strategy: every non-ground nogood installs a watch on its
/// most-binding literal; instantiation happens when a changed atom unifies
/// with a watched literal for the first time.
#[derive(Debug)]
pub struct LazyNogoodGrounder {
    watched: SimpleNogoodContainer,
    destination: SimpleNogoodContainer,
    watched_literals: Vec<(Id, usize)>,
    already_compared: FnvHashSet<(Addr, usize)>,
    watched_count: usize,
}

impl LazyNogoodGrounder {
    pub fn new(
        watched: SimpleNogoodContainer,
        destination: SimpleNogoodContainer,
    ) -> LazyNogoodGrounder {
        LazyNogoodGrounder {
            watched,
            destination,
            watched_literals: Vec::new(),
            already_compared: FnvHashSet::default(),
            watched_count: 0,
        }
    }
}

impl NogoodGrounder for LazyNogoodGrounder {
    fn update(
        &mut self,
        reg: &mut Registry,
        _partial: &Interpretation,
        _assigned: &Interpretation,
        changed: &Interpretation,
    ) {
        // install watches for nogoods that arrived since the last call
        let max = self.watched.slot_count();
        if self.watched_count >= max {
            self.watched_count = 0;
        }
        for index in self.watched_count..max {
            if !self.watched.is_live(index) {
                continue;
            }
            let nogood = self.watched.nogood(index);
            if nogood.is_ground() {
                continue;
            }
            let watched_literal = most_binding_literal(reg, &nogood);
            if watched_literal != ID_FAIL {
                debug!("watching literal {:?} of nogood {}", watched_literal, index);
                self.watched_literals.push((watched_literal, index));
            }
        }
        self.watched_count = max;

        // instantiate watches whose literal unifies with a changed atom
        for address in changed.iter() {
            for (literal, index) in self.watched_literals.clone() {
                if !self.already_compared.insert((address, index)) {
                    continue;
                }
                let unifies = {
                    let current = reg.ground_atom_by_address(address);
                    let watched_atom = reg.ordinary_atom(literal);
                    current.unifies_with(watched_atom)
                };
                if !unifies {
                    continue;
                }

                let program_atom = reg.ground_atom_id(address);
                let source = self.watched.nogood(index);
                let mut instance = Nogood::new();
                if source.match_against(reg, program_atom, &mut instance) {
                    if instance.is_ground() {
                        let _ = self.destination.add_nogood(instance);
                    } else {
                        let _ = self.watched.add_nogood(instance);
                    }
                }
            }
        }
    }

    fn reset_watched(&mut self, watched: SimpleNogoodContainer) {
        self.watched = watched;
        self.watched_literals.clear();
        self.already_compared.clear();
        self.watched_count = 0;
    }
}
