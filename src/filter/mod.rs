// Filtering decision engine
//
// `rules` compiles the rule file; `policy` evaluates it per entry.

pub mod policy;
pub mod rules;

pub use policy::FilterPolicy;
pub use rules::{RuleError, RuleSet};
