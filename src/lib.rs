//! hexkin is a solver runtime for disjunctive logic programs extended with
//! external atoms. The crate houses the ground-solver subsystem and the
//! attribute-safety analyzer that gates it:
//!
//! - a conflict-driven nogood-learning search engine
//!   ([`engine::CdnlSolver`]) with unit propagation, first-UIP conflict
//!   analysis, two-watched-literal indexing and decision-literal flipping
//!   for enumeration;
//! - an ASP extension ([`engine::InternalGroundAspSolver`]) adding Clark
//!   completion, singular-loop nogoods for shifted disjunctive heads,
//!   source pointers and unfounded-set detection;
//! - generic nogood containers with lazy and immediate instantiation of
//!   non-ground nogoods ([`nogoods`]);
//! - the liberal domain-expansion safety checker over the attribute
//!   dependency graph ([`safety`]), which decides whether a non-ground
//!   program can be soundly grounded;
//! - a model-generator façade ([`model_generation`]) driving a grounder
//!   oracle and yielding one answer set per call.
//!
//! External-atom semantics enter the solver exclusively through the
//! [`engine::propagation::Propagator`] interface: propagators observe the
//! partial assignment and veto it with ground nogoods.

pub mod asserts;
pub mod basic_types;
pub mod engine;
pub mod model_generation;
pub mod nogoods;
pub mod options;
pub mod program;
pub mod registry;
pub mod safety;
pub mod statistics;

pub use engine::termination;

#[cfg(test)]
mod tests;
