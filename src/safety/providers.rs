//! The four shipped safety providers. Each one runs inside the checker's
//! fixpoint until its conditions hold, then idles until something changes.

use log::debug;

use crate::registry::BuiltinOp;
use crate::registry::InputType;
use crate::registry::Term;
use crate::safety::Attribute;
use crate::safety::LiberalSafetyChecker;
use crate::safety::SafetyProvider;

pub(crate) fn default_providers() -> Vec<Box<dyn SafetyProvider>> {
    vec![
        Box::new(FinitenessProvider::default()),
        Box::new(FiniteFiberProvider::default()),
        Box::new(AggregateBuiltinProvider::default()),
        Box::new(BenignCycleProvider),
    ]
}

/// Exploits the finite-domain and relative-finite-domain annotations:
/// output positions with a finite domain bound their variables.
#[derive(Debug)]
pub struct FinitenessProvider {
    rerun: bool,
}

impl Default for FinitenessProvider {
    fn default() -> FinitenessProvider {
        FinitenessProvider { rerun: true }
    }
}

impl SafetyProvider for FinitenessProvider {
    fn run(&mut self, checker: &mut LiberalSafetyChecker<'_>) {
        if !self.rerun {
            return;
        }
        self.rerun = false;

        for rule_id in checker.idb().to_vec() {
            let rule = checker.registry().rule(rule_id).clone();
            for body in &rule.body {
                if body.is_naf() || !body.is_external_atom() {
                    continue;
                }
                let eatom = checker.registry().external_atom(*body).clone();

                for (output, term) in eatom.outputs.iter().enumerate() {
                    if eatom.properties.has_finite_domain(output) && term.is_variable_term() {
                        let location = (rule_id, *term);
                        if !checker.is_bounded(&location) {
                            debug!(
                                "output {} of {:?} has a finite domain, bounding {:?}",
                                output, body, term
                            );
                            checker.add_externally_bounded_variable(*body, location);
                        }
                    }
                }

                // relative finite domains depend on previously established
                // safety, so keep rerunning while they are present
                for (output, input) in eatom.properties.relative_finite_domain.clone() {
                    self.rerun = true;
                    let applies = match eatom.input_types[input] {
                        InputType::Predicate => (1..=checker
                            .predicate_arity(eatom.inputs[input]))
                            .all(|arg| {
                                checker.is_safe_attribute(&Attribute::Ordinary {
                                    predicate: eatom.inputs[input],
                                    arg_index: arg,
                                })
                            }),
                        _ => {
                            !eatom.inputs[input].is_variable_term()
                                || checker.is_bounded(&(rule_id, eatom.inputs[input]))
                        }
                    };
                    if applies && eatom.outputs[output].is_variable_term() {
                        let location = (rule_id, eatom.outputs[output]);
                        if !checker.is_bounded(&location) {
                            checker.add_externally_bounded_variable(*body, location);
                        }
                    }
                }
            }
        }
    }
}

/// Exploits the finite-fiber annotation: once every output variable of the
/// external atom is bounded, its input variables are bounded as well.
#[derive(Debug)]
pub struct FiniteFiberProvider {
    first_run: bool,
}

impl Default for FiniteFiberProvider {
    fn default() -> FiniteFiberProvider {
        FiniteFiberProvider { first_run: true }
    }
}

impl SafetyProvider for FiniteFiberProvider {
    fn run(&mut self, checker: &mut LiberalSafetyChecker<'_>) {
        if !self.first_run {
            return;
        }
        self.first_run = false;

        for rule_id in checker.idb().to_vec() {
            let rule = checker.registry().rule(rule_id).clone();
            for body in &rule.body {
                if body.is_naf() || !body.is_external_atom() {
                    continue;
                }
                let eatom = checker.registry().external_atom(*body).clone();
                if !eatom.properties.has_finite_fiber() {
                    continue;
                }

                let output_bounded = crate::registry::variables_in_tuple(&eatom.outputs)
                    .into_iter()
                    .all(|variable| checker.is_bounded(&(rule_id, variable)));
                if output_bounded {
                    for variable in crate::registry::variables_in_tuple(&eatom.inputs) {
                        let location = (rule_id, variable);
                        if !checker.is_bounded(&location) {
                            debug!("{:?} has a finite fiber, bounding {:?}", body, variable);
                            checker.add_externally_bounded_variable(*body, location);
                        }
                    }
                }
            }
        }
    }
}

/// Variables assigned by an `=` aggregate or constrained by `#int(X)` are
/// bounded because `#maxint` keeps their range finite.
#[derive(Debug)]
pub struct AggregateBuiltinProvider {
    first_run: bool,
}

impl Default for AggregateBuiltinProvider {
    fn default() -> AggregateBuiltinProvider {
        AggregateBuiltinProvider { first_run: true }
    }
}

impl SafetyProvider for AggregateBuiltinProvider {
    fn run(&mut self, checker: &mut LiberalSafetyChecker<'_>) {
        if !self.first_run {
            return;
        }
        self.first_run = false;

        for rule_id in checker.idb().to_vec() {
            let rule = checker.registry().rule(rule_id).clone();
            for body in &rule.body {
                if body.is_naf() {
                    continue;
                }
                if body.is_aggregate_atom() {
                    let tuple = checker.registry().aggregate_atom(*body).tuple.clone();
                    let lhs_assigns =
                        matches!(checker.registry().term(tuple[1]), Term::Builtin(BuiltinOp::Eq));
                    let rhs_assigns =
                        matches!(checker.registry().term(tuple[3]), Term::Builtin(BuiltinOp::Eq));
                    if lhs_assigns && tuple[0].is_variable_term() {
                        checker.add_bounded_variable((rule_id, tuple[0]));
                    }
                    if rhs_assigns && tuple[4].is_variable_term() {
                        checker.add_bounded_variable((rule_id, tuple[4]));
                    }
                } else if body.is_builtin_atom() {
                    let tuple = checker.registry().builtin_atom(*body).tuple.clone();
                    if matches!(checker.registry().term(tuple[0]), Term::Builtin(BuiltinOp::Int))
                        && tuple.len() > 1
                        && tuple[1].is_variable_term()
                    {
                        checker.add_bounded_variable((rule_id, tuple[1]));
                    }
                }
            }
        }
    }
}

/// Declares every attribute safe that does not depend on a malign cycle,
/// and bounds the outputs of external atoms in cycles fully covered by a
/// declared well-ordering.
#[derive(Debug)]
pub struct BenignCycleProvider;

impl SafetyProvider for BenignCycleProvider {
    fn run(&mut self, checker: &mut LiberalSafetyChecker<'_>) {
        checker.identify_benign_cycles();
        checker.compute_cyclic_attributes();
        checker.mark_externally_acyclic_attributes_safe();
    }
}
