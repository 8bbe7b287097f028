pub mod heuristic;
pub mod keywords;
pub mod sanitize;
pub mod validate;

pub use heuristic::HeuristicSqlGenerator;
pub use sanitize::sanitize;
pub use validate::{Allowlist, Rejection, SqlValidator, ValidationOutcome};
