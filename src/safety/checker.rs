//! The liberal domain-expansion safety checker.
//!
//! Builds the attribute dependency graph of a non-ground program and runs
//! an iterative fixpoint in which pluggable safety providers mark
//! attributes as domain-expansion safe and variables as bounded; both sets
//! only ever grow. The verdict decides whether the program can be soundly
//! grounded, and records which external-atom occurrences must survive any
//! downstream optimisation.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use fnv::FnvHashMap;
use fnv::FnvHashSet;
use log::debug;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::Bfs;

use crate::basic_types::Id;
use crate::basic_types::SafetyError;
use crate::registry::variables_in_tuple;
use crate::registry::BuiltinOp;
use crate::registry::ExternalAtom;
use crate::registry::InputType;
use crate::registry::Registry;
use crate::registry::Rule;
use crate::registry::Term;
use crate::safety::providers::default_providers;
use crate::safety::Attribute;
use crate::safety::AtomLocation;
use crate::safety::VariableLocation;

/// The outcome of the safety analysis.
#[derive(Clone, Debug)]
pub struct SafetyVerdict {
    pub is_safe: bool,
    /// External-atom occurrences that were used to bound a variable; a
    /// grounder reduct must not optimise these away.
    pub necessary_external_occurrences: BTreeSet<Id>,
    /// Populated only on failure: per rule, the variables that could not
    /// be bounded.
    pub unsafe_rules: Vec<(Id, Vec<Id>)>,
}

impl SafetyVerdict {
    /// Renders the failure as an error naming the unsafe variables of the
    /// most informative (most violating) rule; `None` for safe programs.
    pub fn into_error(self, reg: &Registry) -> Option<SafetyError> {
        if self.is_safe {
            return None;
        }
        let mut most_informative: Option<&(Id, Vec<Id>)> = None;
        for entry in &self.unsafe_rules {
            if most_informative.map_or(true, |best| entry.1.len() > best.1.len()) {
                most_informative = Some(entry);
            }
        }
        let (rule, variables) = most_informative
            .cloned()
            .unwrap_or((crate::basic_types::ID_FAIL, Vec::new()));
        let names = variables
            .iter()
            .map(|variable| reg.term_text(*variable))
            .collect::<Vec<_>>()
            .join(", ");
        Some(SafetyError {
            rule,
            variables,
            detail: format!(
                "program is not liberally domain-expansion safe: rule {} has unsafe variables {{{}}}",
                rule.address(),
                names
            ),
        })
    }
}

/// A safety rule run inside the fixpoint until its conditions hold. The
/// four shipped providers cover finiteness annotations, finite fibers,
/// aggregate/builtin assignments and benign cycles; the trait is open for
/// further providers.
pub trait SafetyProvider {
    fn run(&mut self, checker: &mut LiberalSafetyChecker<'_>);
}

pub struct LiberalSafetyChecker<'reg> {
    reg: &'reg Registry,
    idb: Vec<Id>,
    graph: DiGraph<Attribute, ()>,
    node_of: FnvHashMap<Attribute, NodeIndex>,
    attributes_of_predicate: FnvHashMap<Id, Vec<Attribute>>,
    predicate_arity: FnvHashMap<Id, usize>,
    dep_scc: Vec<Vec<Attribute>>,
    bounded_variables: FnvHashSet<VariableLocation>,
    safe_attributes: FnvHashSet<Attribute>,
    attributes_safe_by_variable: FnvHashMap<VariableLocation, BTreeSet<Attribute>>,
    attributes_safe_by_attribute: FnvHashMap<Attribute, BTreeSet<Attribute>>,
    safety_preconditions:
        FnvHashMap<Attribute, (FnvHashSet<VariableLocation>, FnvHashSet<Attribute>)>,
    variable_occurs_in: FnvHashMap<VariableLocation, BTreeSet<AtomLocation>>,
    attribute_occurs_in: FnvHashMap<Attribute, BTreeSet<AtomLocation>>,
    /// Variables an external atom could bound; exploited only when nothing
    /// else bounds them, which is what makes the atom necessary.
    bounded_by_externals: VecDeque<(Id, VariableLocation)>,
    necessary_external_atoms: BTreeSet<Id>,
    cyclic_attribute_nodes: FnvHashSet<NodeIndex>,
}

impl<'reg> LiberalSafetyChecker<'reg> {
    pub fn new(reg: &'reg Registry, idb: Vec<Id>) -> LiberalSafetyChecker<'reg> {
        LiberalSafetyChecker::with_providers(reg, idb, Vec::new())
    }

    /// Runs the analysis with the four default providers plus any custom
    /// ones.
    pub fn with_providers(
        reg: &'reg Registry,
        idb: Vec<Id>,
        custom: Vec<Box<dyn SafetyProvider>>,
    ) -> LiberalSafetyChecker<'reg> {
        let mut checker = LiberalSafetyChecker {
            reg,
            idb,
            graph: DiGraph::new(),
            node_of: FnvHashMap::default(),
            attributes_of_predicate: FnvHashMap::default(),
            predicate_arity: FnvHashMap::default(),
            dep_scc: Vec::new(),
            bounded_variables: FnvHashSet::default(),
            safe_attributes: FnvHashSet::default(),
            attributes_safe_by_variable: FnvHashMap::default(),
            attributes_safe_by_attribute: FnvHashMap::default(),
            safety_preconditions: FnvHashMap::default(),
            variable_occurs_in: FnvHashMap::default(),
            attribute_occurs_in: FnvHashMap::default(),
            bounded_by_externals: VecDeque::new(),
            necessary_external_atoms: BTreeSet::new(),
            cyclic_attribute_nodes: FnvHashSet::default(),
        };
        checker.create_dependency_graph();
        checker.create_preconditions_and_location_indices();

        let mut providers = default_providers();
        providers.extend(custom);
        checker.compute_domain_expansion_safety(providers);
        checker
    }

    // ---- read access (also used by the providers) ----

    pub fn registry(&self) -> &'reg Registry {
        self.reg
    }

    pub fn idb(&self) -> &[Id] {
        &self.idb
    }

    pub fn dep_scc(&self) -> &[Vec<Attribute>] {
        &self.dep_scc
    }

    pub fn is_bounded(&self, location: &VariableLocation) -> bool {
        self.bounded_variables.contains(location)
    }

    pub fn is_safe_attribute(&self, attribute: &Attribute) -> bool {
        self.safe_attributes.contains(attribute)
    }

    pub fn predicate_arity(&self, predicate: Id) -> usize {
        self.predicate_arity.get(&predicate).copied().unwrap_or(0)
    }

    pub fn is_domain_expansion_safe(&self) -> bool {
        self.safe_attributes.len() == self.graph.node_count()
    }

    pub fn verdict(&self) -> SafetyVerdict {
        let is_safe = self.is_domain_expansion_safe();
        let mut unsafe_rules = Vec::new();
        if !is_safe {
            for rule_id in &self.idb {
                let rule = self.reg.rule(*rule_id);
                let unbound: Vec<Id> = self
                    .rule_variables(rule)
                    .into_iter()
                    .filter(|variable| !self.is_bounded(&(*rule_id, *variable)))
                    .collect();
                if !unbound.is_empty() {
                    unsafe_rules.push((*rule_id, unbound));
                }
            }
        }
        SafetyVerdict {
            is_safe,
            necessary_external_occurrences: self.necessary_external_atoms.clone(),
            unsafe_rules,
        }
    }

    fn rule_variables(&self, rule: &Rule) -> BTreeSet<Id> {
        let mut variables = BTreeSet::new();
        for literal in &rule.head {
            variables.extend(variables_in_tuple(&self.reg.ordinary_atom(*literal).tuple));
        }
        for literal in &rule.body {
            if literal.is_ordinary_atom() {
                variables.extend(variables_in_tuple(&self.reg.ordinary_atom(*literal).tuple));
            } else if literal.is_external_atom() {
                let eatom = self.reg.external_atom(*literal);
                variables.extend(variables_in_tuple(&eatom.inputs));
                variables.extend(variables_in_tuple(&eatom.outputs));
            } else if literal.is_builtin_atom() {
                variables.extend(variables_in_tuple(&self.reg.builtin_atom(*literal).tuple));
            } else if literal.is_aggregate_atom() {
                variables.extend(variables_in_tuple(&self.reg.aggregate_atom(*literal).tuple));
            }
        }
        variables
    }

    // ---- attribute and node creation ----

    fn ordinary_attribute(&mut self, predicate: Id, arg_index: usize) -> Attribute {
        let arity = self.predicate_arity.entry(predicate).or_insert(0);
        if arg_index > *arity {
            *arity = arg_index;
        }
        Attribute::Ordinary {
            predicate,
            arg_index,
        }
    }

    fn external_attribute(
        &self,
        rule: Id,
        eatom_id: Id,
        eatom: &ExternalAtom,
        is_input: bool,
        arg_index: usize,
    ) -> Attribute {
        Attribute::External {
            rule,
            eatom: eatom_id,
            predicate: eatom.predicate,
            inputs: eatom.inputs.clone(),
            is_input,
            arg_index,
        }
    }

    fn node_for(&mut self, attribute: Attribute) -> NodeIndex {
        if let Some(node) = self.node_of.get(&attribute) {
            return *node;
        }
        let node = self.graph.add_node(attribute.clone());
        if let Attribute::Ordinary { predicate, .. } = &attribute {
            self.attributes_of_predicate
                .entry(*predicate)
                .or_default()
                .push(attribute.clone());
        }
        let _ = self.node_of.insert(attribute, node);
        node
    }

    // ---- graph construction ----

    fn builtin_information_flow(&self, rule: &Rule) -> FnvHashMap<Id, FnvHashSet<Id>> {
        let mut flow: FnvHashMap<Id, FnvHashSet<Id>> = FnvHashMap::default();
        for literal in &rule.body {
            if literal.is_naf() || !literal.is_builtin_atom() {
                continue;
            }
            let batom = self.reg.builtin_atom(*literal);
            let op = match self.reg.term(batom.tuple[0]) {
                Term::Builtin(op) => *op,
                _ => continue,
            };
            match op {
                BuiltinOp::Add
                | BuiltinOp::Sub
                | BuiltinOp::Mul
                | BuiltinOp::Div
                | BuiltinOp::Mod
                    if batom.tuple.len() == 4 =>
                {
                    // information flows from the operands to the result
                    for operand in [batom.tuple[1], batom.tuple[2]] {
                        if operand.is_variable_term() {
                            let _ = flow.entry(operand).or_default().insert(batom.tuple[3]);
                        }
                    }
                }
                BuiltinOp::Eq | BuiltinOp::Succ if batom.tuple.len() == 3 => {
                    // both directions
                    if batom.tuple[1].is_variable_term() && batom.tuple[2].is_variable_term() {
                        let _ = flow
                            .entry(batom.tuple[1])
                            .or_default()
                            .insert(batom.tuple[2]);
                        let _ = flow
                            .entry(batom.tuple[2])
                            .or_default()
                            .insert(batom.tuple[1]);
                    }
                }
                _ => {}
            }
        }
        flow
    }

    fn has_information_flow(
        flow: &FnvHashMap<Id, FnvHashSet<Id>>,
        from: Id,
        to: Id,
    ) -> bool {
        from == to || flow.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    fn create_dependency_graph(&mut self) {
        debug!("creating attribute dependency graph");
        let mut predicate_inputs: Vec<(Attribute, Id)> = Vec::new();

        for rule_id in self.idb.clone() {
            let rule = self.reg.rule(rule_id).clone();
            let flow = self.builtin_information_flow(&rule);

            // head-body dependencies
            for head in &rule.head {
                let head_atom = self.reg.ordinary_atom(*head).clone();
                for (head_arg, head_term) in head_atom.tuple.iter().enumerate().skip(1) {
                    if !head_term.is_variable_term() {
                        continue;
                    }
                    let head_attribute = self.ordinary_attribute(head_atom.tuple[0], head_arg);
                    let head_node = self.node_for(head_attribute);

                    for body in &rule.body {
                        if body.is_naf() {
                            continue;
                        }
                        if body.is_ordinary_atom() {
                            let body_atom = self.reg.ordinary_atom(*body).clone();
                            for (body_arg, body_term) in
                                body_atom.tuple.iter().enumerate().skip(1)
                            {
                                if !body_term.is_variable_term() {
                                    continue;
                                }
                                let attribute =
                                    self.ordinary_attribute(body_atom.tuple[0], body_arg);
                                let body_node = self.node_for(attribute);
                                if Self::has_information_flow(&flow, *body_term, *head_term) {
                                    let _ = self.graph.add_edge(body_node, head_node, ());
                                }
                            }
                        } else if body.is_external_atom() {
                            let eatom = self.reg.external_atom(*body).clone();
                            for (output, output_term) in eatom.outputs.iter().enumerate() {
                                if !output_term.is_variable_term() {
                                    continue;
                                }
                                let attribute = self.external_attribute(
                                    rule_id, *body, &eatom, false, output + 1,
                                );
                                let body_node = self.node_for(attribute);
                                if Self::has_information_flow(&flow, *output_term, *head_term) {
                                    let _ = self.graph.add_edge(body_node, head_node, ());
                                }
                            }
                        }
                    }
                }
            }

            // body-body dependencies into external inputs
            for first in &rule.body {
                if first.is_naf() {
                    continue;
                }
                if first.is_ordinary_atom() {
                    let first_atom = self.reg.ordinary_atom(*first).clone();
                    for (first_arg, first_term) in first_atom.tuple.iter().enumerate().skip(1) {
                        if !first_term.is_variable_term() {
                            continue;
                        }
                        let attribute = self.ordinary_attribute(first_atom.tuple[0], first_arg);
                        let first_node = self.node_for(attribute);
                        self.connect_to_external_inputs(
                            rule_id, &rule, &flow, *first_term, first_node,
                        );
                    }
                } else if first.is_external_atom() {
                    let first_eatom = self.reg.external_atom(*first).clone();
                    for (output, output_term) in first_eatom.outputs.iter().enumerate() {
                        if !output_term.is_variable_term() {
                            continue;
                        }
                        let attribute = self.external_attribute(
                            rule_id,
                            *first,
                            &first_eatom,
                            false,
                            output + 1,
                        );
                        let first_node = self.node_for(attribute);
                        self.connect_to_external_inputs(
                            rule_id, &rule, &flow, *output_term, first_node,
                        );
                    }
                }
            }

            // external input-output dependencies
            for body in &rule.body {
                if body.is_naf() || !body.is_external_atom() {
                    continue;
                }
                let eatom = self.reg.external_atom(*body).clone();
                for input in 0..eatom.inputs.len() {
                    let input_attribute =
                        self.external_attribute(rule_id, *body, &eatom, true, input + 1);
                    let input_node = self.node_for(input_attribute.clone());
                    for output in 0..eatom.outputs.len() {
                        let output_attribute =
                            self.external_attribute(rule_id, *body, &eatom, false, output + 1);
                        let output_node = self.node_for(output_attribute);
                        let _ = self.graph.add_edge(input_node, output_node, ());
                    }
                    if eatom.input_types[input] == InputType::Predicate {
                        predicate_inputs.push((input_attribute, eatom.inputs[input]));
                    }
                }
            }
        }

        // every attribute of a predicate feeds the predicate-typed inputs
        // it is supplied to
        for (input_attribute, predicate) in predicate_inputs {
            let input_node = self.node_for(input_attribute);
            for attribute in self
                .attributes_of_predicate
                .get(&predicate)
                .cloned()
                .unwrap_or_default()
            {
                let from = self.node_for(attribute);
                let _ = self.graph.add_edge(from, input_node, ());
            }
        }

        debug!("computing attribute dependency SCCs");
        let components = petgraph::algo::tarjan_scc(&self.graph);
        self.dep_scc = components
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect()
            })
            .collect();
    }

    fn connect_to_external_inputs(
        &mut self,
        rule_id: Id,
        rule: &Rule,
        flow: &FnvHashMap<Id, FnvHashSet<Id>>,
        from_term: Id,
        from_node: NodeIndex,
    ) {
        for body in rule.body.clone() {
            if body.is_naf() || !body.is_external_atom() {
                continue;
            }
            let eatom = self.reg.external_atom(body).clone();
            for (input, input_term) in eatom.inputs.iter().enumerate() {
                if !input_term.is_variable_term() {
                    continue;
                }
                if Self::has_information_flow(flow, from_term, *input_term) {
                    let attribute =
                        self.external_attribute(rule_id, body, &eatom, true, input + 1);
                    let input_node = self.node_for(attribute);
                    let _ = self.graph.add_edge(from_node, input_node, ());
                }
            }
        }
    }

    fn create_preconditions_and_location_indices(&mut self) {
        for rule_id in self.idb.clone() {
            let rule = self.reg.rule(rule_id).clone();

            // head attributes become safe once their variables are bounded
            for head in &rule.head {
                let head_atom = self.reg.ordinary_atom(*head).clone();
                for (arg, term) in head_atom.tuple.iter().enumerate().skip(1) {
                    if !term.is_variable_term() {
                        continue;
                    }
                    let attribute = self.ordinary_attribute(head_atom.tuple[0], arg);
                    let location = (rule_id, *term);
                    let _ = self
                        .safety_preconditions
                        .entry(attribute.clone())
                        .or_default()
                        .0
                        .insert(location);
                    let _ = self
                        .attributes_safe_by_variable
                        .entry(location)
                        .or_default()
                        .insert(attribute);
                }
            }

            for body in &rule.body {
                if body.is_naf() {
                    continue;
                }
                if body.is_ordinary_atom() {
                    let atom = self.reg.ordinary_atom(*body).clone();
                    for (arg, term) in atom.tuple.iter().enumerate().skip(1) {
                        let attribute = self.ordinary_attribute(atom.tuple[0], arg);
                        let _ = self
                            .attribute_occurs_in
                            .entry(attribute)
                            .or_default()
                            .insert((rule_id, *body));
                        if term.is_variable_term() {
                            let _ = self
                                .variable_occurs_in
                                .entry((rule_id, *term))
                                .or_default()
                                .insert((rule_id, *body));
                        }
                    }
                } else if body.is_external_atom() {
                    let eatom = self.reg.external_atom(*body).clone();
                    for (input, input_term) in eatom.inputs.iter().enumerate() {
                        let input_attribute =
                            self.external_attribute(rule_id, *body, &eatom, true, input + 1);

                        if eatom.input_types[input] == InputType::Predicate {
                            // predicate inputs wait for every attribute of
                            // the supplied predicate to become safe
                            let arity = self.predicate_arity(eatom.inputs[input]);
                            for arg in 1..=arity {
                                let predicate_attribute =
                                    self.ordinary_attribute(eatom.inputs[input], arg);
                                let _ = self
                                    .attribute_occurs_in
                                    .entry(predicate_attribute.clone())
                                    .or_default()
                                    .insert((rule_id, *body));
                                let _ = self
                                    .safety_preconditions
                                    .entry(input_attribute.clone())
                                    .or_default()
                                    .1
                                    .insert(predicate_attribute.clone());
                                let _ = self
                                    .attributes_safe_by_attribute
                                    .entry(predicate_attribute)
                                    .or_default()
                                    .insert(input_attribute.clone());
                            }
                        } else if input_term.is_variable_term() {
                            // constant-typed inputs wait for the variable
                            let location = (rule_id, *input_term);
                            let _ = self
                                .safety_preconditions
                                .entry(input_attribute.clone())
                                .or_default()
                                .0
                                .insert(location);
                            let _ = self
                                .attributes_safe_by_variable
                                .entry(location)
                                .or_default()
                                .insert(input_attribute.clone());
                            let _ = self
                                .variable_occurs_in
                                .entry(location)
                                .or_default()
                                .insert((rule_id, *body));
                        }

                        // outputs wait for every input attribute
                        for output in 0..eatom.outputs.len() {
                            let output_attribute =
                                self.external_attribute(rule_id, *body, &eatom, false, output + 1);
                            let _ = self
                                .attribute_occurs_in
                                .entry(output_attribute.clone())
                                .or_default()
                                .insert((rule_id, *body));
                            let _ = self
                                .safety_preconditions
                                .entry(output_attribute.clone())
                                .or_default()
                                .1
                                .insert(input_attribute.clone());
                            let _ = self
                                .attributes_safe_by_attribute
                                .entry(input_attribute.clone())
                                .or_default()
                                .insert(output_attribute);
                        }
                    }
                    for output_term in &eatom.outputs {
                        if output_term.is_variable_term() {
                            let _ = self
                                .variable_occurs_in
                                .entry((rule_id, *output_term))
                                .or_default()
                                .insert((rule_id, *body));
                        }
                    }
                } else if body.is_builtin_atom() {
                    let batom = self.reg.builtin_atom(*body).clone();
                    for term in variables_in_tuple(&batom.tuple) {
                        let _ = self
                            .variable_occurs_in
                            .entry((rule_id, term))
                            .or_default()
                            .insert((rule_id, *body));
                    }
                }
            }
        }
    }

    // ---- fixpoint mutators ----

    fn is_newly_safe(&self, attribute: &Attribute) -> bool {
        self.safety_preconditions
            .get(attribute)
            .map_or(true, |(variables, attributes)| {
                variables.is_empty() && attributes.is_empty()
            })
    }

    /// Records that an external atom could bound the variable; the binding
    /// is exploited only if nothing else bounds it first.
    pub fn add_externally_bounded_variable(&mut self, eatom: Id, location: VariableLocation) {
        self.bounded_by_externals.push_back((eatom, location));
    }

    pub fn add_bounded_variable(&mut self, location: VariableLocation) {
        if !self.bounded_variables.insert(location) {
            return;
        }
        debug!(
            "variable r{}/{} is bounded",
            location.0.address(),
            self.reg.term_text(location.1)
        );

        // wake the attributes waiting for this variable
        loop {
            let attribute = match self
                .attributes_safe_by_variable
                .get_mut(&location)
                .and_then(BTreeSet::pop_first)
            {
                Some(attribute) => attribute,
                None => break,
            };
            if let Some(preconditions) = self.safety_preconditions.get_mut(&attribute) {
                let _ = preconditions.0.remove(&location);
            }
            if self.is_newly_safe(&attribute) {
                self.add_domain_expansion_safe_attribute(attribute);
            }
        }

        // a bounded variable may complete the output of a finite-fiber
        // external atom, or propagate through equivalence builtins
        for (rule_id, atom_id) in self
            .variable_occurs_in
            .get(&location)
            .cloned()
            .unwrap_or_default()
        {
            if atom_id.is_external_atom() {
                let eatom = self.reg.external_atom(atom_id).clone();
                for (output, term) in eatom.outputs.iter().enumerate() {
                    if *term == location.1 {
                        let attribute =
                            self.external_attribute(rule_id, atom_id, &eatom, false, output + 1);
                        if !self.safe_attributes.contains(&attribute) {
                            self.add_domain_expansion_safe_attribute(attribute);
                        }
                    }
                }
                if eatom.properties.has_finite_fiber() {
                    let output_bounded = variables_in_tuple(&eatom.outputs)
                        .into_iter()
                        .all(|variable| self.bounded_variables.contains(&(rule_id, variable)));
                    if output_bounded {
                        for variable in variables_in_tuple(&eatom.inputs) {
                            self.add_externally_bounded_variable(atom_id, (rule_id, variable));
                        }
                    }
                }
            } else if atom_id.is_builtin_atom() {
                let batom = self.reg.builtin_atom(atom_id).clone();
                if batom.tuple.len() == 4 {
                    // ternary: a bounded right-hand side bounds the result
                    let operands_bounded = [batom.tuple[1], batom.tuple[2]]
                        .into_iter()
                        .filter(|term| term.is_variable_term())
                        .all(|term| self.bounded_variables.contains(&(rule_id, term)));
                    if operands_bounded && batom.tuple[3].is_variable_term() {
                        self.add_bounded_variable((rule_id, batom.tuple[3]));
                    }
                } else if batom.tuple.len() == 3
                    && matches!(self.reg.term(batom.tuple[0]), Term::Builtin(BuiltinOp::Eq))
                {
                    // binary equality: one bounded side bounds the other
                    for (known, other) in [
                        (batom.tuple[1], batom.tuple[2]),
                        (batom.tuple[2], batom.tuple[1]),
                    ] {
                        if known.is_variable_term()
                            && self.bounded_variables.contains(&(rule_id, known))
                            && other.is_variable_term()
                        {
                            self.add_bounded_variable((rule_id, other));
                        }
                    }
                }
            }
        }
    }

    pub fn add_domain_expansion_safe_attribute(&mut self, attribute: Attribute) {
        if !self.safe_attributes.insert(attribute.clone()) {
            return;
        }
        debug!(
            "attribute {} is domain-expansion safe",
            attribute.display(self.reg)
        );

        // wake the attributes waiting for this attribute
        loop {
            let waiter = match self
                .attributes_safe_by_attribute
                .get_mut(&attribute)
                .and_then(BTreeSet::pop_first)
            {
                Some(waiter) => waiter,
                None => break,
            };
            if let Some(preconditions) = self.safety_preconditions.get_mut(&waiter) {
                let _ = preconditions.1.remove(&attribute);
            }
            if self.is_newly_safe(&waiter) {
                self.add_domain_expansion_safe_attribute(waiter);
            }
        }

        // safe attributes bound the variables at their argument position;
        // ordinary occurrences bind directly, external ones only through
        // the necessity queue so the atom can still be optimised away
        for (rule_id, atom_id) in self
            .attribute_occurs_in
            .get(&attribute)
            .cloned()
            .unwrap_or_default()
        {
            if atom_id.is_ordinary_atom() {
                if let Attribute::Ordinary { arg_index, .. } = &attribute {
                    let atom = self.reg.ordinary_atom(atom_id).clone();
                    let term = atom.tuple[*arg_index];
                    if term.is_variable_term() {
                        self.add_bounded_variable((rule_id, term));
                    }
                }
            } else if atom_id.is_external_atom() {
                let eatom = self.reg.external_atom(atom_id).clone();
                for (output, term) in eatom.outputs.iter().enumerate() {
                    let candidate =
                        self.external_attribute(rule_id, atom_id, &eatom, false, output + 1);
                    if candidate == attribute && term.is_variable_term() {
                        self.add_externally_bounded_variable(atom_id, (rule_id, *term));
                    }
                }
            }
        }
    }

    // ---- benign cycles ----

    /// Marks the output variables of external atoms in SCCs whose
    /// input-output pairs are all covered by a declared well-ordering.
    pub(crate) fn identify_benign_cycles(&mut self) {
        for component in self.dep_scc.clone() {
            if component.len() <= 1 {
                continue;
            }

            let mut pairs: Vec<(Id, (usize, usize))> = Vec::new();
            for out_attribute in &component {
                let (out_eatom, out_rule, out_arg) = match out_attribute {
                    Attribute::External {
                        eatom,
                        rule,
                        is_input: false,
                        arg_index,
                        ..
                    } if !self.safe_attributes.contains(out_attribute) => {
                        (*eatom, *rule, *arg_index)
                    }
                    _ => continue,
                };
                for in_attribute in &component {
                    if let Attribute::External {
                        eatom,
                        rule,
                        is_input: true,
                        arg_index,
                        ..
                    } = in_attribute
                    {
                        if *eatom == out_eatom
                            && *rule == out_rule
                            && !self.safe_attributes.contains(in_attribute)
                        {
                            pairs.push((out_eatom, (*arg_index - 1, out_arg - 1)));
                        }
                    }
                }
            }

            let mut strlen = true;
            let mut natural = true;
            for (eatom, (input, output)) in &pairs {
                let properties = &self.reg.external_atom(*eatom).properties;
                strlen &= properties.has_wellordering_strlen(*input, *output);
                natural &= properties.has_wellordering_natural(*input, *output);
            }
            if !strlen && !natural {
                continue;
            }
            debug!("cycle is benign");

            for attribute in component {
                if let Attribute::External {
                    eatom,
                    rule,
                    is_input: false,
                    arg_index,
                    ..
                } = attribute
                {
                    let term = self.reg.external_atom(eatom).outputs[arg_index - 1];
                    if term.is_variable_term() && !self.is_bounded(&(rule, term)) {
                        self.add_externally_bounded_variable(eatom, (rule, term));
                    }
                }
            }
        }
    }

    /// Recomputes the attributes that (transitively) depend on an unsafe
    /// cyclic external attribute.
    pub(crate) fn compute_cyclic_attributes(&mut self) {
        let mut cyclic_external: Vec<Attribute> = Vec::new();
        for component in &self.dep_scc {
            if component.len() <= 1 {
                continue;
            }
            let has_unsafe_output = component.iter().any(|attribute| {
                matches!(attribute, Attribute::External { is_input: false, .. })
                    && !self.safe_attributes.contains(attribute)
            });
            if has_unsafe_output {
                cyclic_external.extend(
                    component
                        .iter()
                        .filter(|attribute| attribute.is_external())
                        .cloned(),
                );
            }
        }

        self.cyclic_attribute_nodes.clear();
        for attribute in cyclic_external {
            let start = self.node_of[&attribute];
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                let _ = self.cyclic_attribute_nodes.insert(node);
            }
        }
        debug!(
            "{} attributes depend cyclically on external attributes",
            self.cyclic_attribute_nodes.len()
        );
    }

    /// Everything not reachable from a malign cycle is domain-expansion
    /// safe.
    pub(crate) fn mark_externally_acyclic_attributes_safe(&mut self) {
        for node in self.graph.node_indices().collect::<Vec<_>>() {
            if !self.cyclic_attribute_nodes.contains(&node) {
                let attribute = self.graph[node].clone();
                if !self.safe_attributes.contains(&attribute) {
                    self.add_domain_expansion_safe_attribute(attribute);
                }
            }
        }
    }

    // ---- the fixpoint ----

    fn compute_domain_expansion_safety(&mut self, mut providers: Vec<Box<dyn SafetyProvider>>) {
        loop {
            if self.is_domain_expansion_safe() {
                break;
            }
            let bounded_before = self.bounded_variables.len();
            let safe_before = self.safe_attributes.len();

            for provider in providers.iter_mut() {
                provider.run(self);
            }

            let mut changed = self.bounded_variables.len() != bounded_before
                || self.safe_attributes.len() != safe_before;

            // exploit one external binding; the used atom becomes necessary
            while let Some((eatom, location)) = self.bounded_by_externals.pop_front() {
                if !self.bounded_variables.contains(&location) {
                    debug!("exploiting external atom {:?}", eatom);
                    let _ = self.necessary_external_atoms.insert(eatom);
                    self.add_bounded_variable(location);
                    changed = true;
                    break;
                }
            }

            if !changed {
                break;
            }
        }

        self.ensure_ordinary_safety();
        debug!(
            "domain-expansion safety: {} ({} of {} attributes safe)",
            self.is_domain_expansion_safe(),
            self.safe_attributes.len(),
            self.graph.node_count()
        );
    }

    /// Dropping non-necessary external atoms must not break classical
    /// safety: as long as removing them leaves some variable unbound by
    /// positive ordinary atoms and necessary external outputs, promote one
    /// more external atom binding such a variable.
    fn ensure_ordinary_safety(&mut self) {
        let reg = self.reg;
        for rule_id in self.idb.clone() {
            let rule = reg.rule(rule_id).clone();
            loop {
                let mut bound: FnvHashSet<Id> = FnvHashSet::default();
                for body in &rule.body {
                    if !body.is_naf() && body.is_ordinary_atom() {
                        bound.extend(variables_in_tuple(&reg.ordinary_atom(*body).tuple));
                    }
                }
                loop {
                    let mut grown = false;
                    for body in &rule.body {
                        if body.is_naf()
                            || !body.is_external_atom()
                            || !self.necessary_external_atoms.contains(body)
                        {
                            continue;
                        }
                        let eatom = reg.external_atom(*body);
                        let inputs_bound = variables_in_tuple(&eatom.inputs)
                            .into_iter()
                            .all(|variable| bound.contains(&variable));
                        if inputs_bound {
                            for variable in variables_in_tuple(&eatom.outputs) {
                                grown |= bound.insert(variable);
                            }
                        }
                    }
                    if !grown {
                        break;
                    }
                }

                let unsafe_variables: Vec<Id> = self
                    .rule_variables(&rule)
                    .into_iter()
                    .filter(|variable| !bound.contains(variable))
                    .collect();
                if unsafe_variables.is_empty() {
                    break;
                }

                let mut promoted = false;
                for body in &rule.body {
                    if body.is_naf()
                        || !body.is_external_atom()
                        || self.necessary_external_atoms.contains(body)
                    {
                        continue;
                    }
                    let eatom = reg.external_atom(*body);
                    if variables_in_tuple(&eatom.outputs)
                        .iter()
                        .any(|variable| unsafe_variables.contains(variable))
                    {
                        debug!("promoting external atom {:?} for ordinary safety", body);
                        let _ = self.necessary_external_atoms.insert(*body);
                        promoted = true;
                        break;
                    }
                }
                if !promoted {
                    break;
                }
            }
        }
    }
}
