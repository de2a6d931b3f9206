//! The ground ASP solver: the CDNL core extended with Clark completion,
//! singular-loop nogoods for shifted disjunctive heads, source-pointer
//! maintenance and unfounded-set detection over the strongly connected
//! components of the positive dependency graph.

use std::collections::BTreeSet;

use fnv::FnvHashMap;
use log::debug;
use log::warn;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;

use crate::basic_types::Addr;
use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::SolverError;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::PropagatorId;
use crate::engine::propagation::QueueSink;
use crate::engine::search_state::Counters;
use crate::engine::search_state::SearchState;
use crate::engine::termination::TerminationCondition;
use crate::engine::SatSolver;
use crate::nogoods::Nogood;
use crate::nogoods::NogoodSet;
use crate::options::SolverOptions;
use crate::program::AnnotatedGroundProgram;
use crate::registry::Registry;
use crate::registry::RuleKind;

/// A rule of the ground program with its completion body atom, cached so
/// the search never has to consult the registry.
#[derive(Debug)]
struct GroundRule {
    /// Head atoms (positive, ground).
    head: Vec<Id>,
    /// Body literals (ground atoms with an optional NAF bit).
    body: Vec<Id>,
    /// Address of the auxiliary atom standing for the rule body.
    body_atom: Addr,
}

/// One entry of the shifted program: either an original rule with a
/// singular head, or one shift `h <- B, not h1, ..., not hm` of a
/// disjunctive rule.
struct ShiftedEntry {
    head: Option<Addr>,
    body_atom: Addr,
}

/// Answer-set enumeration for an annotated ground program.
pub struct InternalGroundAspSolver {
    state: SearchState,
    program: AnnotatedGroundProgram,
    rules: Vec<GroundRule>,
    rules_with_pos_head: FnvHashMap<Addr, BTreeSet<usize>>,
    rules_with_pos_body: FnvHashMap<Addr, BTreeSet<usize>>,
    /// All non-auxiliary atoms of the program.
    ordinary_atoms: BTreeSet<Addr>,
    ordinary_atoms_int: Interpretation,
    /// `None` marks a fact founded by itself; a missing key means the atom
    /// currently has no source.
    source_rule: FnvHashMap<Addr, Option<usize>>,
    founded_atoms_of_body_atom: FnvHashMap<Addr, BTreeSet<Addr>>,
    dep_scc: Vec<BTreeSet<Addr>>,
    component_of_atom: FnvHashMap<Addr, usize>,
    non_singular_atoms: BTreeSet<Addr>,
    unfounded_atoms: BTreeSet<Addr>,
    propagators: Vec<Option<Box<dyn Propagator>>>,
    nogoods_to_add: Vec<Nogood>,
    termination: Option<Box<dyn TerminationCondition>>,
    first_model: bool,
    model_count: u64,
}

fn body_literal(body_entry: Id) -> Id {
    Id::literal(body_entry.address(), !body_entry.is_naf(), true)
}

impl InternalGroundAspSolver {
    /// Builds the solver for a ground program: completion and singular-loop
    /// nogoods, watch structures, dependency SCCs, source pointers and the
    /// EDB assignment. Weight rules, weak constraints and aggregate bodies
    /// are rejected here, before any search state exists.
    pub fn new(
        reg: &mut Registry,
        program: AnnotatedGroundProgram,
        options: SolverOptions,
    ) -> Result<InternalGroundAspSolver, SolverError> {
        let mut rules = Vec::new();
        let mut ordinary_atoms: BTreeSet<Addr> = BTreeSet::new();
        let mut rules_with_pos_head: FnvHashMap<Addr, BTreeSet<usize>> = FnvHashMap::default();
        let mut rules_with_pos_body: FnvHashMap<Addr, BTreeSet<usize>> = FnvHashMap::default();

        for rule_id in program.ground_program().idb.clone() {
            let rule = reg.rule(rule_id).clone();
            match rule.kind {
                RuleKind::WeightRule => {
                    return Err(SolverError::UnsupportedConstruct("weight rules"))
                }
                RuleKind::WeakConstraint => {
                    return Err(SolverError::UnsupportedConstruct("weak constraints"))
                }
                RuleKind::Regular | RuleKind::Constraint => {}
            }

            let index = rules.len();
            for literal in &rule.head {
                if !literal.is_ordinary_ground_atom() {
                    return Err(SolverError::ContractViolation(
                        "ground solver requires a ground program",
                    ));
                }
                let _ = rules_with_pos_head
                    .entry(literal.address())
                    .or_default()
                    .insert(index);
                let _ = ordinary_atoms.insert(literal.address());
            }
            for literal in &rule.body {
                if literal.is_aggregate_atom() {
                    return Err(SolverError::UnsupportedConstruct("aggregate atoms"));
                }
                if !literal.is_ordinary_ground_atom() {
                    return Err(SolverError::ContractViolation(
                        "ground solver requires a ground program",
                    ));
                }
                if !literal.is_naf() {
                    let _ = rules_with_pos_body
                        .entry(literal.address())
                        .or_default()
                        .insert(index);
                }
                let _ = ordinary_atoms.insert(literal.address());
            }

            // the body atom of the Clark completion
            let body_atom = Self::create_body_atom(reg);
            rules.push(GroundRule {
                head: rule.head.clone(),
                body: rule.body.clone(),
                body_atom,
            });
        }
        for address in program.ground_program().edb.iter() {
            let _ = ordinary_atoms.insert(address);
        }

        let mut state = SearchState::new(NogoodSet::new(), options);
        for address in &ordinary_atoms {
            state.add_universe_atom(*address);
        }
        for rule in &rules {
            state.add_universe_atom(rule.body_atom);
        }

        // Clark completion: the body atom is equivalent to its body, and a
        // true body forbids an all-false head
        for rule in &rules {
            Self::create_body_nogoods(&mut state.nogoods, rule.body_atom, &rule.body);
            let mut body_implies_head = Nogood::new();
            body_implies_head.insert(Id::literal(rule.body_atom, true, true));
            for head in &rule.head {
                body_implies_head.insert(Id::literal(head.address(), false, true));
            }
            let _ = state.nogoods.add_nogood(body_implies_head);
        }

        // singular-loop nogoods from the shifted program
        let shifted = Self::create_shifted_program(reg, &rules, &mut state);
        for address in &ordinary_atoms {
            if program.ground_program().edb.get_fact(*address) {
                continue;
            }
            // an atom must not be true if all of its supporting shifted
            // rule bodies are false
            let mut support = Nogood::new();
            support.insert(Id::literal(*address, true, true));
            for entry in &shifted {
                if entry.head == Some(*address) {
                    support.insert(Id::literal(entry.body_atom, false, true));
                }
            }
            let _ = state.nogoods.add_nogood(support);
        }

        state.init_watching_structures();

        // positive dependency graph over the program atoms
        let mut dep_graph: DiGraph<Addr, ()> = DiGraph::new();
        let mut node_of: FnvHashMap<Addr, NodeIndex> = FnvHashMap::default();
        for address in &ordinary_atoms {
            let _ = node_of.insert(*address, dep_graph.add_node(*address));
        }
        for rule in &rules {
            for head in &rule.head {
                for body in &rule.body {
                    if !body.is_naf() {
                        let _ = dep_graph
                            .add_edge(node_of[&head.address()], node_of[&body.address()], ());
                    }
                }
            }
        }
        let components = tarjan_scc(&dep_graph);
        let mut dep_scc: Vec<BTreeSet<Addr>> = Vec::with_capacity(components.len());
        let mut component_of_atom: FnvHashMap<Addr, usize> = FnvHashMap::default();
        let mut non_singular_atoms: BTreeSet<Addr> = BTreeSet::new();
        for component in components {
            let index = dep_scc.len();
            let atoms: BTreeSet<Addr> =
                component.iter().map(|node| dep_graph[*node]).collect();
            for address in &atoms {
                let _ = component_of_atom.insert(*address, index);
            }
            if atoms.len() > 1 {
                non_singular_atoms.extend(atoms.iter().copied());
            }
            dep_scc.push(atoms);
        }
        debug!(
            "dependency graph has {} components, {} atoms in non-singular ones",
            dep_scc.len(),
            non_singular_atoms.len()
        );

        // initially, every non-fact atom of a non-singular component lacks
        // a source; facts are founded by themselves
        let mut source_rule: FnvHashMap<Addr, Option<usize>> = FnvHashMap::default();
        let mut unfounded_atoms: BTreeSet<Addr> = BTreeSet::new();
        for address in &ordinary_atoms {
            if program.ground_program().edb.get_fact(*address) {
                let _ = source_rule.insert(*address, None);
            } else if non_singular_atoms.contains(address) {
                let _ = unfounded_atoms.insert(*address);
            }
        }

        let ordinary_atoms_int: Interpretation = ordinary_atoms.iter().copied().collect();
        let mut solver = InternalGroundAspSolver {
            state,
            program,
            rules,
            rules_with_pos_head,
            rules_with_pos_body,
            ordinary_atoms,
            ordinary_atoms_int,
            source_rule,
            founded_atoms_of_body_atom: FnvHashMap::default(),
            dep_scc,
            component_of_atom,
            non_singular_atoms,
            unfounded_atoms,
            propagators: Vec::new(),
            nogoods_to_add: Vec::new(),
            termination: None,
            first_model: true,
            model_count: 0,
        };
        solver.set_edb();
        Ok(solver)
    }

    fn create_body_atom(reg: &mut Registry) -> Addr {
        let predicate = reg.fresh_aux_predicate("body");
        reg.store_ground_atom(vec![predicate]).address()
    }

    // 1. the body atom must not be false if all body literals are true
    // 2. the body atom must not be true if some body literal is false
    fn create_body_nogoods(nogoods: &mut NogoodSet, body_atom: Addr, body: &[Id]) {
        let mut body_sat = Nogood::new();
        for entry in body {
            body_sat.insert(body_literal(*entry));
        }
        body_sat.insert(Id::literal(body_atom, false, true));
        let _ = nogoods.add_nogood(body_sat);

        for entry in body {
            let mut body_false = Nogood::new();
            body_false.insert(Id::literal(body_atom, true, true));
            body_false.insert(body_literal(*entry).negated());
            let _ = nogoods.add_nogood(body_false);
        }
    }

    /// Shifts each disjunctive rule `a1 v ... v am <- B` into the rules
    /// `ai <- B, not a1, ..., not ai-1, not ai+1, ..., not am` and creates
    /// the body nogoods of the fresh shifted bodies. Singular rules join
    /// the shifted program unchanged.
    fn create_shifted_program(
        reg: &mut Registry,
        rules: &[GroundRule],
        state: &mut SearchState,
    ) -> Vec<ShiftedEntry> {
        debug!("creating shifted program");
        let mut shifted = Vec::new();
        for rule in rules {
            if rule.head.len() > 1 {
                for head in &rule.head {
                    let mut body = rule.body.clone();
                    for other in &rule.head {
                        if other != head {
                            body.push(Id::literal(other.address(), false, true));
                        }
                    }
                    let body_atom = Self::create_body_atom(reg);
                    state.add_universe_atom(body_atom);
                    Self::create_body_nogoods(&mut state.nogoods, body_atom, &body);
                    shifted.push(ShiftedEntry {
                        head: Some(head.address()),
                        body_atom,
                    });
                }
            } else {
                shifted.push(ShiftedEntry {
                    head: rule.head.first().map(|head| head.address()),
                    body_atom: rule.body_atom,
                });
            }
        }
        shifted
    }

    /// Asserts the EDB at decision level 0 without a cause.
    fn set_edb(&mut self) {
        debug!("setting EDB");
        let facts: Vec<Addr> = self
            .program
            .ground_program()
            .edb
            .iter()
            .filter(|address| self.ordinary_atoms.contains(address))
            .collect();
        for address in facts {
            if !self.state.is_assigned(address) {
                self.set_fact(Id::literal(address, true, true), 0, None);
            }
        }
    }

    pub fn set_termination(&mut self, termination: Box<dyn TerminationCondition>) {
        self.termination = Some(termination);
    }

    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    pub fn log_statistics(&self) {
        self.state.counters.log_statistics();
    }

    pub fn model_count(&self) -> u64 {
        self.model_count
    }

    fn should_stop(&mut self) -> bool {
        self.termination
            .as_mut()
            .is_some_and(|condition| condition.should_stop())
    }

    // ---- assignment wrappers keeping the unfounded-set structures in sync ----

    fn set_fact(&mut self, fact: Id, dl: u32, cause: Option<usize>) {
        self.state.set_fact(fact, dl, cause);
        self.update_unfounded_after_set_fact(fact);
    }

    fn clear_fact(&mut self, address: Addr) {
        self.state.clear_fact(address);
        // an atom of a non-singular component becomes unfounded again when
        // it loses its assignment while lacking a source
        if self.non_singular_atoms.contains(&address)
            && !self.source_rule.contains_key(&address)
        {
            let _ = self.unfounded_atoms.insert(address);
        }
    }

    fn backtrack(&mut self, dl: u32) {
        for address in self.state.atoms_above_level(dl) {
            self.clear_fact(address);
        }
        self.state.counters.num_backtracks += 1;
    }

    fn flip_decision_literal(&mut self) {
        let literal = self.state.decision_literal_of_level[&self.state.current_dl];
        self.state.current_dl -= 1;
        self.state.exhausted_dl = self.state.current_dl;
        let dl = self.state.current_dl;
        debug!("flipping decision literal {:?} onto level {}", literal, dl);
        self.backtrack(dl);
        self.set_fact(literal.negated(), dl, None);
    }

    fn unit_propagation(&mut self) -> Option<Nogood> {
        while let Some((literal, dl, cause)) = self.state.next_unit_propagation() {
            self.set_fact(literal, dl, Some(cause));
        }
        self.state.violated_nogood()
    }

    fn call_propagators(&mut self) -> Result<(), SolverError> {
        let mut sink = QueueSink {
            queue: &mut self.nogoods_to_add,
        };
        for propagator in self.propagators.iter_mut().flatten() {
            propagator.propagate(
                &self.state.interpretation,
                &self.state.assigned,
                &self.state.changed,
                &mut sink,
            )?;
        }
        Ok(())
    }

    fn load_added_nogoods(&mut self) {
        for nogood in std::mem::take(&mut self.nogoods_to_add) {
            let _ = self.state.add_nogood_and_watch(nogood);
        }
    }

    fn handle_conflict(&mut self, violated: &Nogood) {
        if self.state.current_dl > self.state.exhausted_dl {
            let (learned, backjump_dl) = self.state.analysis(violated);
            if let Some(index) = self.state.add_nogood_and_watch(learned) {
                self.state.recent_conflicts.push(index);
            }
            self.state.current_dl = backjump_dl.max(self.state.exhausted_dl);
            let dl = self.state.current_dl;
            self.backtrack(dl);
        } else {
            self.flip_decision_literal();
        }
    }

    // ---- source pointers ----

    fn remove_source_from_atom(&mut self, address: Addr) {
        if let Some(Some(rule_index)) = self.source_rule.get(&address).copied() {
            let body_atom = self.rules[rule_index].body_atom;
            if let Some(founded) = self.founded_atoms_of_body_atom.get_mut(&body_atom) {
                let _ = founded.remove(&address);
            }
        }
        let _ = self.source_rule.remove(&address);
    }

    fn add_source_to_atom(&mut self, address: Addr, rule_index: usize) {
        debug!("atom {} sets a source pointer to rule {}", address, rule_index);
        let _ = self.source_rule.insert(address, Some(rule_index));
        let _ = self
            .founded_atoms_of_body_atom
            .entry(self.rules[rule_index].body_atom)
            .or_default()
            .insert(address);
    }

    /// Atoms that currently use a rule with positive body literal
    /// `address` as their source.
    fn depending_atoms(&self, address: Addr) -> BTreeSet<Addr> {
        let mut depending = BTreeSet::new();
        if let Some(rule_indices) = self.rules_with_pos_body.get(&address) {
            for rule_index in rule_indices {
                let body_atom = self.rules[*rule_index].body_atom;
                if let Some(founded) = self.founded_atoms_of_body_atom.get(&body_atom) {
                    depending.extend(founded.iter().copied());
                }
            }
        }
        depending
    }

    fn initial_newly_unfounded_after_set_fact(&self, fact: Id) -> BTreeSet<Addr> {
        let mut newly = BTreeSet::new();
        if fact.is_naf() {
            // a falsified body atom unfounds everything sourced through it
            if let Some(founded) = self.founded_atoms_of_body_atom.get(&fact.address()) {
                newly.extend(founded.iter().copied());
            }
        } else {
            // a satisfied head literal steals the source from head literals
            // that were set later or live in a different component
            if let Some(rule_indices) = self.rules_with_pos_head.get(&fact.address()) {
                for rule_index in rule_indices {
                    for other in &self.rules[*rule_index].head {
                        let other_address = other.address();
                        if other_address == fact.address() {
                            continue;
                        }
                        if self.source_rule.get(&other_address).copied()
                            != Some(Some(*rule_index))
                        {
                            continue;
                        }
                        let set_later = self.state.satisfied(Id::literal(other_address, true, true))
                            && self.state.assignment_order_index(other_address)
                                > self.state.assignment_order_index(fact.address());
                        let different_component =
                            self.component_of_atom.get(&other_address)
                                != self.component_of_atom.get(&fact.address());
                        if set_later || different_component {
                            let _ = newly.insert(other_address);
                        }
                    }
                }
            }
        }
        newly
    }

    fn update_unfounded_after_set_fact(&mut self, fact: Id) {
        if fact.is_naf() {
            // false atoms need no source
            self.remove_source_from_atom(fact.address());
            let _ = self.unfounded_atoms.remove(&fact.address());
        }

        // transitively propagate the loss of sources
        let mut newly = self.initial_newly_unfounded_after_set_fact(fact);
        while !newly.is_empty() {
            let mut next = BTreeSet::new();
            for address in &newly {
                // singular atoms are handled by the static loop nogoods
                if !self.non_singular_atoms.contains(address) {
                    continue;
                }
                if self.state.falsified(Id::literal(*address, true, true))
                    || self.unfounded_atoms.contains(address)
                {
                    continue;
                }
                let component = &self.dep_scc[self.component_of_atom[address]];
                let depends_on_unfounded = component
                    .iter()
                    .any(|atom| self.unfounded_atoms.contains(atom) || newly.contains(atom));
                if depends_on_unfounded {
                    self.remove_source_from_atom(*address);
                    let _ = self.unfounded_atoms.insert(*address);
                    next.extend(self.depending_atoms(*address));
                }
            }
            newly = next;
        }
    }

    // ---- unfounded-set search ----

    fn rule_externally_supports(&self, rule_index: usize, address: Addr, set: &BTreeSet<Addr>) -> bool {
        let rule = &self.rules[rule_index];
        if !rule.head.iter().any(|head| head.address() == address) {
            return false;
        }
        // support is external iff no positive body literal lies in the set
        !rule
            .body
            .iter()
            .any(|literal| !literal.is_naf() && set.contains(&literal.address()))
    }

    fn external_support(&self, set: &BTreeSet<Addr>) -> BTreeSet<usize> {
        let mut support = BTreeSet::new();
        for address in set {
            if let Some(rule_indices) = self.rules_with_pos_head.get(address) {
                for rule_index in rule_indices {
                    if self.rule_externally_supports(*rule_index, *address, set) {
                        let _ = support.insert(*rule_index);
                    }
                }
            }
        }
        support
    }

    /// The literals that satisfy the rule independently of `set`: a false
    /// rule body, or a true head literal outside `set`.
    fn satisfies_independently(&self, rule_index: usize, set: &BTreeSet<Addr>) -> Vec<Id> {
        let rule = &self.rules[rule_index];
        let mut satisfiers = vec![Id::literal(rule.body_atom, false, true)];
        for head in &rule.head {
            if !set.contains(&head.address()) {
                satisfiers.push(Id::literal(head.address(), true, true));
            }
        }
        satisfiers
    }

    fn possible_source_rule(&self, set: &BTreeSet<Addr>) -> Option<usize> {
        for rule_index in self.external_support(set) {
            let independently_satisfied = self
                .satisfies_independently(rule_index, set)
                .into_iter()
                .any(|literal| self.state.satisfied(literal));
            if !independently_satisfied {
                return Some(rule_index);
            }
        }
        None
    }

    /// A head atom takes the rule as its new source only if it is
    /// currently unfounded and no other head literal of the rule was set
    /// to true strictly earlier.
    fn use_as_new_source_for_head_atom(&self, head_address: Addr, rule_index: usize) -> bool {
        if !self.unfounded_atoms.contains(&head_address) {
            return false;
        }
        let head_assigned = self.state.is_assigned(head_address);
        for other in &self.rules[rule_index].head {
            let other_address = other.address();
            if other_address == head_address {
                continue;
            }
            if !self.state.satisfied(Id::literal(other_address, true, true)) {
                continue;
            }
            if !head_assigned {
                return false;
            }
            if self.state.assignment_order_index(other_address)
                < self.state.assignment_order_index(head_address)
            {
                return false;
            }
        }
        true
    }

    /// Grows an unfounded-set candidate from some currently sourceless
    /// atom. Returns a confirmed unfounded set, or empty if every atom
    /// found a new source.
    fn get_unfounded_set(&mut self) -> BTreeSet<Addr> {
        debug!("currently unfounded atoms: {:?}", self.unfounded_atoms);

        while let Some(atom) = self.unfounded_atoms.iter().next().copied() {
            let mut candidate: BTreeSet<Addr> = BTreeSet::new();
            let _ = candidate.insert(atom);
            loop {
                let rule_index = match self.possible_source_rule(&candidate) {
                    // no rule survives: the candidate is unfounded
                    None => return candidate,
                    Some(rule_index) => rule_index,
                };

                // a surviving rule depending on unfounded atoms of the same
                // component pulls those atoms into the candidate
                let component = &self.dep_scc[self.component_of_atom[&atom]];
                let mut depends_on_unfounded = false;
                for literal in &self.rules[rule_index].body {
                    if !literal.is_naf()
                        && self.unfounded_atoms.contains(&literal.address())
                        && component.contains(&literal.address())
                    {
                        let _ = candidate.insert(literal.address());
                        depends_on_unfounded = true;
                    }
                }

                if !depends_on_unfounded {
                    // the rule founds its head atoms
                    let heads: Vec<Addr> = self.rules[rule_index]
                        .head
                        .iter()
                        .map(|head| head.address())
                        .collect();
                    for head_address in heads {
                        if self.use_as_new_source_for_head_atom(head_address, rule_index) {
                            debug!(
                                "using rule {} as new source for {}",
                                rule_index, head_address
                            );
                            self.add_source_to_atom(head_address, rule_index);
                            let _ = self.unfounded_atoms.remove(&head_address);
                            let _ = candidate.remove(&head_address);
                        }
                    }
                }
                if candidate.is_empty() {
                    break;
                }
            }
        }
        BTreeSet::new()
    }

    /// One of the exponentially many loop nogoods for the unfounded set:
    /// one true atom of the set plus, per externally supporting rule, one
    /// currently satisfied literal of its independent-satisfier set.
    fn get_loop_nogood(&self, unfounded_set: &BTreeSet<Addr>) -> Nogood {
        let mut nogood = Nogood::new();
        let first = unfounded_set
            .iter()
            .next()
            .expect("loop nogoods require a non-empty unfounded set");
        nogood.insert(Id::literal(*first, true, true));

        for rule_index in self.external_support(unfounded_set) {
            for literal in self.satisfies_independently(rule_index, unfounded_set) {
                if self.state.satisfied(literal) {
                    nogood.insert(literal);
                    break;
                }
            }
        }
        debug!("loop nogood for {:?} is {:?}", unfounded_set, nogood);
        nogood
    }

    fn guess_next_literal(&mut self) {
        self.state.current_dl += 1;
        let guess = self.state.guess();
        let dl = self.state.current_dl;
        let _ = self.state.decision_literal_of_level.insert(dl, guess);
        self.set_fact(guess, dl, None);
    }

    /// Restricts a total assignment to the non-auxiliary atoms and hides
    /// the program mask.
    fn output_projection(&self) -> Interpretation {
        let mut projection = self.state.interpretation.clone();
        projection.intersect_with(&self.ordinary_atoms_int);
        projection.subtract(&self.program.ground_program().mask);
        projection
    }
}

impl SatSolver for InternalGroundAspSolver {
    fn add_nogood(&mut self, nogood: Nogood) {
        self.nogoods_to_add.push(nogood);
    }

    fn restart_with_assumptions(&mut self, assumptions: &[Id]) {
        debug!("resetting solver with {} assumptions", assumptions.len());
        for address in self.state.assigned_atoms() {
            self.clear_fact(address);
        }
        self.state.reset_levels();
        for assumption in assumptions {
            if self.state.in_universe(assumption.address()) {
                self.set_fact(
                    Id::literal(assumption.address(), !assumption.is_naf(), true),
                    0,
                    None,
                );
            }
        }
        self.set_edb();
    }

    fn get_next_model(&mut self) -> Result<Option<Interpretation>, SolverError> {
        // nogoods queued since the last call must take effect before the
        // previous model is handled
        self.load_added_nogoods();

        if !self.first_model && self.state.complete() {
            if self.state.current_dl == 0 {
                debug!("no more models");
                return Ok(None);
            }
            self.flip_decision_literal();
        }
        self.first_model = false;

        // runs again even on a complete assignment while loop nogoods or
        // external nogoods keep arriving, so they can veto a would-be model
        let mut another_iteration = false;
        while !self.state.complete() || another_iteration || self.state.has_contradiction() {
            if self.should_stop() {
                debug!("search cancelled cooperatively");
                return Ok(None);
            }
            another_iteration = false;

            if let Some(violated) = self.unit_propagation() {
                if self.state.current_dl == 0 {
                    return Ok(None);
                }
                self.handle_conflict(&violated);
                continue;
            }

            let unfounded_set = self.get_unfounded_set();
            if !unfounded_set.is_empty() {
                debug!("found unfounded set {:?}", unfounded_set);
                self.state.counters.num_detected_unfounded_sets += 1;
                let loop_nogood = self.get_loop_nogood(&unfounded_set);
                let _ = self.state.add_nogood_and_watch(loop_nogood);
                another_iteration = true;
                continue;
            }

            let count_before = self.state.nogoods.count();
            self.call_propagators()?;
            self.load_added_nogoods();
            if self.state.nogoods.count() != count_before {
                another_iteration = true;
            }
            self.state.changed.clear();

            if self.state.nogoods.count() == count_before && !self.state.complete() {
                self.guess_next_literal();
            }
        }

        debug!("got model");
        self.model_count += 1;
        self.state.counters.num_models += 1;
        Ok(Some(self.output_projection()))
    }

    fn add_propagator(&mut self, propagator: Box<dyn Propagator>) -> PropagatorId {
        self.propagators.push(Some(propagator));
        PropagatorId(self.propagators.len() - 1)
    }

    fn remove_propagator(&mut self, id: PropagatorId) {
        self.propagators[id.0] = None;
    }

    fn set_optimum(&mut self, _optimum: &[i32]) {
        warn!("set_optimum is not supported by the internal solver, ignoring");
    }

    /// Only legal while the instance has never produced a model; the
    /// returned nogood over the explanation atoms explains the
    /// inconsistency.
    fn get_inconsistency_cause(
        &mut self,
        explanation_atoms: &Interpretation,
    ) -> Result<Nogood, SolverError> {
        self.load_added_nogoods();
        let model = self.get_next_model()?;
        if model.is_none() && (self.model_count == 0 || self.state.has_contradiction()) {
            Ok(self.state.inconsistency_explanation(explanation_atoms))
        } else {
            Err(SolverError::ContractViolation(
                "inconsistency causes can only be computed for instances without any model",
            ))
        }
    }
}
