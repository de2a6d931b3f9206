//! Small shared value types: interned ids, bitset interpretations and the
//! error taxonomy.

mod error;
mod id;
mod interpretation;

pub use error::PropagatorError;
pub use error::SafetyError;
pub use error::SolverError;
pub use id::Addr;
pub use id::Id;
pub use id::MainKind;
pub use id::ID_FAIL;
pub use interpretation::Interpretation;
