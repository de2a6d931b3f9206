#![cfg(test)]

mod cdnl;
mod ground_asp;
mod model_generation;
mod nogood_grounding;
mod safety;
mod verification_tree;

pub(crate) mod helpers;
