//! The shared search state of the conflict-driven nogood-learning solvers:
//! assignment, implication bookkeeping, two-watched-literal index, conflict
//! analysis and the decision heuristic.

use std::collections::BTreeSet;

use fnv::FnvHashMap;
use log::debug;
use log::trace;
use rand::Rng;

use crate::basic_types::Addr;
use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::ID_FAIL;
use crate::hexkin_assert_extreme;
use crate::hexkin_assert_moderate;
use crate::hexkin_assert_simple;
use crate::nogoods::Nogood;
use crate::nogoods::NogoodSet;
use crate::options::SolverOptions;
use crate::statistics::log_statistic;

/// Search statistics, logged through [`crate::statistics`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Counters {
    pub num_assignments: u64,
    pub num_guesses: u64,
    pub num_backtracks: u64,
    pub num_resolution_steps: u64,
    pub num_conflicts: u64,
    pub num_detected_unfounded_sets: u64,
    pub num_models: u64,
}

impl Counters {
    pub fn log_statistics(&self) {
        log_statistic("numberOfAssignments", self.num_assignments);
        log_statistic("numberOfGuesses", self.num_guesses);
        log_statistic("numberOfBacktracks", self.num_backtracks);
        log_statistic("numberOfResolutionSteps", self.num_resolution_steps);
        log_statistic("numberOfConflicts", self.num_conflicts);
        log_statistic("numberOfDetectedUnfoundedSets", self.num_detected_unfounded_sets);
        log_statistic("numberOfModels", self.num_models);
    }
}

/// The CDNL state block shared by the plain SAT solver and the ground ASP
/// solver. The owner drives the main loop; this struct provides the
/// primitive operations and keeps the watch invariant: every live nogood
/// watches exactly two of its literals unless it is inactive (falsified
/// from outside), unit, or contradictory.
pub(crate) struct SearchState {
    pub(crate) nogoods: NogoodSet,
    /// Truth values. A cleared atom keeps its last truth value until it is
    /// overridden, so this is only meaningful together with `assigned`.
    pub(crate) interpretation: Interpretation,
    pub(crate) assigned: Interpretation,
    pub(crate) changed: Interpretation,
    decision_level: FnvHashMap<Addr, u32>,
    cause: FnvHashMap<Addr, usize>,
    order_index: FnvHashMap<Addr, u64>,
    next_order: u64,
    facts_on_level: Vec<Vec<Addr>>,
    pub(crate) decision_literal_of_level: FnvHashMap<u32, Id>,
    watched_of_nogood: Vec<Vec<Id>>,
    watching_pos: FnvHashMap<Addr, BTreeSet<usize>>,
    watching_neg: FnvHashMap<Addr, BTreeSet<usize>>,
    occurs_pos: FnvHashMap<Addr, BTreeSet<usize>>,
    occurs_neg: FnvHashMap<Addr, BTreeSet<usize>>,
    unit_nogoods: BTreeSet<usize>,
    contradictory_nogoods: BTreeSet<usize>,
    var_counter_pos: FnvHashMap<Addr, u32>,
    var_counter_neg: FnvHashMap<Addr, u32>,
    pub(crate) recent_conflicts: Vec<usize>,
    conflicts_since_decay: u32,
    pub(crate) all_atoms: BTreeSet<Addr>,
    assigned_in_universe: usize,
    pub(crate) current_dl: u32,
    pub(crate) exhausted_dl: u32,
    pub(crate) counters: Counters,
    options: SolverOptions,
}

impl SearchState {
    pub(crate) fn new(nogoods: NogoodSet, options: SolverOptions) -> SearchState {
        SearchState {
            nogoods,
            interpretation: Interpretation::new(),
            assigned: Interpretation::new(),
            changed: Interpretation::new(),
            decision_level: FnvHashMap::default(),
            cause: FnvHashMap::default(),
            order_index: FnvHashMap::default(),
            next_order: 0,
            facts_on_level: Vec::new(),
            decision_literal_of_level: FnvHashMap::default(),
            watched_of_nogood: Vec::new(),
            watching_pos: FnvHashMap::default(),
            watching_neg: FnvHashMap::default(),
            occurs_pos: FnvHashMap::default(),
            occurs_neg: FnvHashMap::default(),
            unit_nogoods: BTreeSet::new(),
            contradictory_nogoods: BTreeSet::new(),
            var_counter_pos: FnvHashMap::default(),
            var_counter_neg: FnvHashMap::default(),
            recent_conflicts: Vec::new(),
            conflicts_since_decay: 0,
            all_atoms: BTreeSet::new(),
            assigned_in_universe: 0,
            current_dl: 0,
            exhausted_dl: 0,
            counters: Counters::default(),
            options,
        }
    }

    // ---- universe ----

    pub(crate) fn add_universe_atom(&mut self, address: Addr) {
        let _ = self.all_atoms.insert(address);
    }

    pub(crate) fn collect_universe_from_nogoods(&mut self) {
        let mut atoms = Vec::new();
        for index in self.nogoods.live_indices() {
            atoms.extend(self.nogoods.nogood(index).iter().map(Id::address));
        }
        self.all_atoms.extend(atoms);
    }

    pub(crate) fn in_universe(&self, address: Addr) -> bool {
        self.all_atoms.contains(&address)
    }

    // ---- assignment queries ----

    pub(crate) fn is_assigned(&self, address: Addr) -> bool {
        self.assigned.get_fact(address)
    }

    pub(crate) fn satisfied(&self, literal: Id) -> bool {
        self.is_assigned(literal.address())
            && self.interpretation.get_fact(literal.address()) != literal.is_naf()
    }

    pub(crate) fn falsified(&self, literal: Id) -> bool {
        self.is_assigned(literal.address())
            && self.interpretation.get_fact(literal.address()) == literal.is_naf()
    }

    pub(crate) fn complete(&self) -> bool {
        self.assigned_in_universe == self.all_atoms.len()
    }

    pub(crate) fn decision_level_of(&self, address: Addr) -> u32 {
        self.decision_level.get(&address).copied().unwrap_or(0)
    }

    pub(crate) fn cause_of(&self, address: Addr) -> Option<usize> {
        self.cause.get(&address).copied()
    }

    /// Facts and guessed literals alike: anything assigned without a cause
    /// nogood.
    pub(crate) fn is_decision_literal(&self, address: Addr) -> bool {
        !self.cause.contains_key(&address)
    }

    pub(crate) fn assignment_order_index(&self, address: Addr) -> i64 {
        self.order_index
            .get(&address)
            .map(|order| *order as i64)
            .unwrap_or(-1)
    }

    // ---- assignment updates ----

    pub(crate) fn set_fact(&mut self, fact: Id, dl: u32, cause: Option<usize>) {
        let address = fact.address();
        hexkin_assert_moderate!(
            !self.is_assigned(address),
            "atom is already assigned"
        );
        trace!("assigning {:?}@{} (cause {:?})", fact, dl, cause);

        self.assigned.set_fact(address);
        if self.all_atoms.contains(&address) {
            self.assigned_in_universe += 1;
        }
        self.changed.set_fact(address);
        let _ = self.decision_level.insert(address, dl);
        match cause {
            Some(index) => {
                let _ = self.cause.insert(address, index);
            }
            None => {
                let _ = self.cause.remove(&address);
            }
        }
        if fact.is_naf() {
            self.interpretation.clear_fact(address);
        } else {
            self.interpretation.set_fact(address);
        }
        let _ = self.order_index.insert(address, self.next_order);
        self.next_order += 1;
        while self.facts_on_level.len() <= dl as usize {
            self.facts_on_level.push(Vec::new());
        }
        self.facts_on_level[dl as usize].push(address);

        self.update_watching_after_set_fact(fact);
        self.counters.num_assignments += 1;
    }

    pub(crate) fn clear_fact(&mut self, address: Addr) {
        hexkin_assert_moderate!(self.is_assigned(address));
        trace!("unassigning {}@{}", address, self.decision_level_of(address));

        self.assigned.clear_fact(address);
        if self.all_atoms.contains(&address) {
            self.assigned_in_universe -= 1;
        }
        self.changed.set_fact(address);
        let _ = self.cause.remove(&address);
        let _ = self.order_index.remove(&address);

        // the truth value remains visible until overridden; reconstruct the
        // literal that was satisfied so far
        let literal = Id::literal(address, self.interpretation.get_fact(address), true);
        self.update_watching_after_clear_fact(literal);
    }

    /// Drains and returns the atoms assigned above `dl`, deepest last.
    pub(crate) fn atoms_above_level(&mut self, dl: u32) -> Vec<Addr> {
        let mut atoms = Vec::new();
        for level in (dl as usize + 1)..self.facts_on_level.len() {
            atoms.append(&mut self.facts_on_level[level]);
        }
        atoms
    }

    pub(crate) fn assigned_atoms(&self) -> Vec<Addr> {
        self.assigned.iter().collect()
    }

    pub(crate) fn reset_levels(&mut self) {
        self.current_dl = 0;
        self.exhausted_dl = 0;
        self.facts_on_level.clear();
        self.decision_literal_of_level.clear();
    }

    // ---- watch structures ----

    fn watching_set(&mut self, literal: Id) -> &mut BTreeSet<usize> {
        if literal.is_naf() {
            self.watching_neg.entry(literal.address()).or_default()
        } else {
            self.watching_pos.entry(literal.address()).or_default()
        }
    }

    fn start_watching(&mut self, index: usize, literal: Id) {
        trace!("nogood {} starts watching {:?}", index, literal);
        if !self.watched_of_nogood[index].contains(&literal) {
            self.watched_of_nogood[index].push(literal);
        }
        let _ = self.watching_set(literal).insert(index);
    }

    fn stop_watching(&mut self, index: usize, literal: Id) {
        trace!("nogood {} stops watching {:?}", index, literal);
        self.watched_of_nogood[index].retain(|lit| *lit != literal);
        let _ = self.watching_set(literal).remove(&index);
    }

    fn inactivate_nogood(&mut self, index: usize) {
        trace!("nogood {} becomes inactive", index);
        for literal in std::mem::take(&mut self.watched_of_nogood[index]) {
            let _ = self.watching_set(literal).remove(&index);
        }
        let _ = self.unit_nogoods.remove(&index);
        let _ = self.contradictory_nogoods.remove(&index);
    }

    pub(crate) fn init_watching_structures(&mut self) {
        self.watched_of_nogood = vec![Vec::new(); self.nogoods.slot_count()];
        self.watching_pos.clear();
        self.watching_neg.clear();
        self.occurs_pos.clear();
        self.occurs_neg.clear();
        self.unit_nogoods.clear();
        self.contradictory_nogoods.clear();

        let indices: Vec<usize> = self.nogoods.live_indices().collect();
        for index in indices {
            self.update_watching_after_add(index);
        }
    }

    fn update_watching_after_add(&mut self, index: usize) {
        let literals: Vec<Id> = self.nogoods.nogood(index).iter().collect();

        for literal in &literals {
            let set = if literal.is_naf() {
                self.occurs_neg.entry(literal.address()).or_default()
            } else {
                self.occurs_pos.entry(literal.address()).or_default()
            };
            let _ = set.insert(index);
        }

        // duplicate adds re-run the scan; detach first so the invariant of
        // at most two watches holds
        self.inactivate_nogood(index);

        let mut inactive = false;
        let mut watched: Vec<Id> = Vec::new();
        for literal in &literals {
            if !self.is_assigned(literal.address()) && watched.len() < 2 {
                watched.push(*literal);
            } else if self.falsified(*literal) {
                inactive = true;
            }
        }

        if inactive {
            trace!("nogood {} is inactive", index);
            return;
        }
        for literal in &watched {
            self.start_watching(index, *literal);
        }
        if watched.len() == 1 {
            trace!("nogood {} is unit", index);
            let _ = self.unit_nogoods.insert(index);
        } else if watched.is_empty() {
            trace!("nogood {} is contradictory", index);
            let _ = self.contradictory_nogoods.insert(index);
        }
    }

    fn update_watching_after_set_fact(&mut self, fact: Id) {
        let address = fact.address();

        // nogoods watching the now-falsified literal become inactive
        loop {
            let watcher = {
                let set = if fact.is_naf() {
                    self.watching_pos.get(&address)
                } else {
                    self.watching_neg.get(&address)
                };
                match set.and_then(|indices| indices.iter().next().copied()) {
                    Some(index) => index,
                    None => break,
                }
            };
            self.inactivate_nogood(watcher);
        }

        // nogoods watching the now-satisfied literal need a replacement
        let literal_in_nogood = Id::literal(address, !fact.is_naf(), true);
        loop {
            let watcher = {
                let set = if fact.is_naf() {
                    self.watching_neg.get(&address)
                } else {
                    self.watching_pos.get(&address)
                };
                match set.and_then(|indices| indices.iter().next().copied()) {
                    Some(index) => index,
                    None => break,
                }
            };

            self.stop_watching(watcher, literal_in_nogood);

            // search a replacement literal that is unassigned and not
            // already watched
            let literals: Vec<Id> = self.nogoods.nogood(watcher).iter().collect();
            let mut inactive = false;
            for candidate in literals {
                if self.watched_of_nogood[watcher].len() < 2
                    && !self.is_assigned(candidate.address())
                    && !self.watched_of_nogood[watcher].contains(&candidate)
                {
                    self.start_watching(watcher, candidate);
                } else if self.falsified(candidate) {
                    self.inactivate_nogood(watcher);
                    inactive = true;
                    break;
                }
            }
            if !inactive {
                match self.watched_of_nogood[watcher].len() {
                    1 => {
                        trace!("nogood {} is now unit", watcher);
                        let _ = self.unit_nogoods.insert(watcher);
                    }
                    0 => {
                        trace!("nogood {} is now contradictory", watcher);
                        let _ = self.contradictory_nogoods.insert(watcher);
                        let _ = self.unit_nogoods.remove(&watcher);
                    }
                    _ => {}
                }
            }
        }
    }

    fn update_watching_after_clear_fact(&mut self, literal: Id) {
        let address = literal.address();

        for positive in [true, false] {
            let indices: Vec<usize> = {
                let occurs = if positive {
                    self.occurs_pos.get(&address)
                } else {
                    self.occurs_neg.get(&address)
                };
                occurs.map(|set| set.iter().copied().collect()).unwrap_or_default()
            };

            for index in indices {
                if !self.nogoods.is_live(index) {
                    continue;
                }
                match self.watched_of_nogood[index].len() {
                    0 => {
                        // was inactive or contradictory; it cannot be
                        // contradictory anymore since one literal is free
                        let literals: Vec<Id> = self.nogoods.nogood(index).iter().collect();
                        let mut still_inactive = false;
                        let mut watched: Vec<Id> = Vec::new();
                        for candidate in literals {
                            if self.falsified(candidate) {
                                still_inactive = true;
                                break;
                            }
                            if !self.is_assigned(candidate.address()) && watched.len() < 2 {
                                watched.push(candidate);
                            }
                        }
                        if !still_inactive {
                            trace!("nogood {} is reactivated", index);
                            for candidate in watched.clone() {
                                self.start_watching(index, candidate);
                            }
                            if watched.len() == 1 {
                                let _ = self.unit_nogoods.insert(index);
                            }
                            let _ = self.contradictory_nogoods.remove(&index);
                        }
                    }
                    1 => {
                        // was unit; the cleared literal was satisfied before,
                        // so the matching polarity re-enters the watch set
                        self.start_watching(index, Id::literal(address, positive, true));
                        let _ = self.unit_nogoods.remove(&index);
                    }
                    _ => {}
                }
            }
        }
    }

    // ---- nogood insertion ----

    /// Adds a ground nogood and splices it into the watch index. Nogoods
    /// whose literals leave the atom universe are silently dropped, which
    /// lets propagators over-approximate.
    pub(crate) fn add_nogood_and_watch(&mut self, nogood: Nogood) -> Option<usize> {
        hexkin_assert_simple!(nogood.is_ground(), "solver nogoods must be ground");
        if nogood.iter().any(|lit| !self.in_universe(lit.address())) {
            debug!("dropping nogood {:?}: literal outside the atom universe", nogood);
            return None;
        }

        let index = self.nogoods.add_nogood(nogood);
        while self.watched_of_nogood.len() <= index {
            self.watched_of_nogood.push(Vec::new());
        }
        self.update_watching_after_add(index);
        Some(index)
    }

    // ---- propagation ----

    /// Pops one unit nogood and returns the propagated literal, its
    /// propagation decision level (the maximum level among the assigned
    /// literals of the nogood) and the causing nogood index.
    pub(crate) fn next_unit_propagation(&mut self) -> Option<(Id, u32, usize)> {
        let index = self.unit_nogoods.pop_first()?;
        hexkin_assert_moderate!(self.watched_of_nogood[index].len() == 1);

        let mut dl = 0;
        for literal in self.nogoods.nogood(index).iter() {
            let address = literal.address();
            if self.is_assigned(address) && self.decision_level_of(address) > dl {
                dl = self.decision_level_of(address);
            }
        }
        let watched = self.watched_of_nogood[index][0];
        Some((watched.negated(), dl, index))
    }

    pub(crate) fn has_contradiction(&self) -> bool {
        !self.contradictory_nogoods.is_empty()
    }

    pub(crate) fn violated_nogood(&self) -> Option<Nogood> {
        self.contradictory_nogoods
            .iter()
            .next()
            .map(|index| self.nogoods.nogood(*index).clone())
    }

    pub(crate) fn contradictory_nogoods(&self) -> Vec<Nogood> {
        self.contradictory_nogoods
            .iter()
            .map(|index| self.nogoods.nogood(*index).clone())
            .collect()
    }

    // ---- conflict analysis ----

    fn touch_vars_in_nogood(&mut self, nogood: &Nogood) {
        for literal in nogood.iter() {
            let counter = if literal.is_naf() {
                self.var_counter_neg.entry(literal.address()).or_insert(0)
            } else {
                self.var_counter_pos.entry(literal.address()).or_insert(0)
            };
            *counter += 1;
        }
    }

    fn activity(&self, address: Addr) -> u64 {
        u64::from(self.var_counter_pos.get(&address).copied().unwrap_or(0))
            + u64::from(self.var_counter_neg.get(&address).copied().unwrap_or(0))
    }

    /// First-UIP conflict analysis: resolves the violated nogood with the
    /// causes of implied literals until a single literal of the current
    /// decision level remains. Returns the learned nogood and the
    /// second-highest decision level among its literals.
    pub(crate) fn analysis(&mut self, violated: &Nogood) -> (Nogood, u32) {
        debug!("conflict detected, violated nogood: {:?}", violated);
        self.counters.num_conflicts += 1;
        self.touch_vars_in_nogood(violated);

        let mut learned = violated.clone();
        let mut backtrack_dl = 0;
        let mut resolution_steps = 0;
        loop {
            // the literal assigned last determines the conflict level
            let mut latest = ID_FAIL;
            let mut latest_order = -1;
            for literal in learned.iter() {
                let order = self.assignment_order_index(literal.address());
                if order > latest_order {
                    latest_order = order;
                    latest = literal;
                }
            }
            let latest_dl = self.decision_level_of(latest.address());

            let mut count = 0;
            let mut implied = None;
            for literal in learned.iter() {
                let dl = self.decision_level_of(literal.address());
                if dl == latest_dl {
                    count += 1;
                    if !self.is_decision_literal(literal.address()) {
                        implied = Some(literal.address());
                    }
                }
                if dl > backtrack_dl && literal.address() != latest.address() && dl < latest_dl {
                    backtrack_dl = dl;
                }
            }

            if count <= 1 {
                break;
            }
            match implied {
                None => {
                    // multiple causeless literals only happen at level 0,
                    // where they are facts rather than real decisions
                    hexkin_assert_simple!(latest_dl == 0);
                    break;
                }
                Some(address) => {
                    let cause_index = self
                        .cause_of(address)
                        .expect("implied literal must have a cause");
                    let cause_nogood = self.nogoods.nogood(cause_index).clone();
                    self.touch_vars_in_nogood(&cause_nogood);
                    learned = learned.resolve(&cause_nogood, address);
                    self.counters.num_resolution_steps += 1;
                    resolution_steps += 1;
                }
            }
        }

        if resolution_steps > 0 {
            self.touch_vars_in_nogood(&learned);
        }
        debug!(
            "learned conflict nogood {:?} after {} resolution steps, backtrack level {}",
            learned, resolution_steps, backtrack_dl
        );

        self.conflicts_since_decay += 1;
        if self.conflicts_since_decay >= 255 {
            debug!("halving all activity counters");
            for counter in self.var_counter_pos.values_mut() {
                *counter /= 2;
            }
            for counter in self.var_counter_neg.values_mut() {
                *counter /= 2;
            }
            self.conflicts_since_decay = 0;
        }

        (learned, backtrack_dl)
    }

    // ---- decision heuristic ----

    fn polarity_choice(&mut self, address: Addr) -> Id {
        let pos = self.var_counter_pos.get(&address).copied().unwrap_or(0);
        let neg = self.var_counter_neg.get(&address).copied().unwrap_or(0);
        if pos > neg {
            Id::literal(address, false, true)
        } else if neg > pos {
            Id::literal(address, true, true)
        } else if self.options.random_generator.gen_bool(0.5) {
            Id::literal(address, false, true)
        } else {
            Id::literal(address, true, true)
        }
    }

    /// Picks the next decision literal: the most active unassigned atom of
    /// the most recent non-dormant conflict nogood, or the globally most
    /// active unassigned atom.
    pub(crate) fn guess(&mut self) -> Id {
        self.counters.num_guesses += 1;

        for conflict_index in self.recent_conflicts.clone().into_iter().rev() {
            // satisfied and contradictory nogoods watch nothing
            if self.watched_of_nogood[conflict_index].is_empty() {
                continue;
            }

            let mut most_active = None;
            let mut best = 0;
            for literal in self.nogoods.nogood(conflict_index).iter().collect::<Vec<_>>() {
                if self.is_assigned(literal.address()) {
                    continue;
                }
                let score = self.activity(literal.address());
                if most_active.is_none() || score > best {
                    best = score;
                    most_active = Some(literal.address());
                }
            }

            // if the nogood has no unassigned atom it is satisfied or
            // contradictory and was skipped above
            let address = most_active.expect("recent conflict with watches has an unassigned atom");
            let guess = self.polarity_choice(address);
            debug!("guessing {:?} from a recent conflict", guess);
            return guess;
        }

        let mut most_active = None;
        let mut best = 0;
        for address in self.all_atoms.clone() {
            if self.is_assigned(address) {
                continue;
            }
            let score = self.activity(address);
            if most_active.is_none() || score > best {
                best = score;
                most_active = Some(address);
            }
        }
        let address = most_active.expect("guess is only requested on incomplete assignments");
        let guess = self.polarity_choice(address);
        debug!("guessing globally most active {:?}", guess);
        guess
    }

    // ---- inconsistency explanation ----

    /// Resolves a level-0 contradiction back to the given explanation
    /// atoms: implied literals are replaced by their causes, facts outside
    /// the explanation set are dropped.
    pub(crate) fn inconsistency_explanation(&self, explanation_atoms: &Interpretation) -> Nogood {
        let start = self
            .contradictory_nogoods
            .iter()
            .min_by_key(|index| self.nogoods.nogood(**index).len());
        let mut violated = match start {
            Some(index) => self.nogoods.nogood(*index).clone(),
            None => return Nogood::new(),
        };

        loop {
            let mut to_remove: Vec<Id> = Vec::new();
            let mut resolve_with: Option<(usize, Addr)> = None;
            for literal in violated.iter() {
                hexkin_assert_extreme!(
                    self.decision_level_of(literal.address()) == 0,
                    "inconsistency explanations require a level-0 conflict"
                );
                if explanation_atoms.get_fact(literal.address()) {
                    continue;
                }
                match self.cause_of(literal.address()) {
                    Some(cause_index) => {
                        if resolve_with.is_none() {
                            resolve_with = Some((cause_index, literal.address()));
                        }
                    }
                    None => to_remove.push(literal),
                }
            }

            if to_remove.is_empty() && resolve_with.is_none() {
                break;
            }

            let mut reduced = Nogood::new();
            for literal in violated.iter() {
                if !to_remove.contains(&literal) {
                    reduced.insert(literal);
                }
            }
            violated = match resolve_with {
                Some((cause_index, address)) => {
                    reduced.resolve(self.nogoods.nogood(cause_index), address)
                }
                None => reduced,
            };
        }
        violated
    }
}
