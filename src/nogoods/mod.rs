//! Nogood data structures: the nogood itself, the add-remove container with
//! duplicate suppression, a shared container handle, and the two grounding
//! strategies for non-ground nogoods.

mod container;
mod grounder;
mod nogood;
mod nogood_set;

pub use container::SimpleNogoodContainer;
pub use grounder::ImmediateNogoodGrounder;
pub use grounder::LazyNogoodGrounder;
pub use grounder::NogoodGrounder;
pub use nogood::normalized_literal;
pub use nogood::Nogood;
pub use nogood_set::NogoodSet;
