//! Assignment scopes and the legacy scope evaluator

pub mod evaluator;
pub mod types;

pub use evaluator::ScopeEvaluator;
pub use types::RoleScope;
