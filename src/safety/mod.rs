//! The attribute-safety analyzer that gates the ground solver: decides
//! whether a non-ground program with external atoms can be soundly
//! grounded.

mod attribute;
mod checker;
mod providers;

pub use attribute::AtomLocation;
pub use attribute::Attribute;
pub use attribute::VariableLocation;
pub use checker::LiberalSafetyChecker;
pub use checker::SafetyProvider;
pub use checker::SafetyVerdict;
pub use providers::AggregateBuiltinProvider;
pub use providers::BenignCycleProvider;
pub use providers::FiniteFiberProvider;
pub use providers::FinitenessProvider;
