//! Rule specification types.
//!
//! - `RuleSpecDocument`: the JSON wire shape, tolerant of absent/null fields
//! - `RuleSpec`: the validated, immutable rule definition
//! - `Expression` / `RuleKind`: the classified rule expression

mod document;
mod expression;
mod kind;
mod spec;

pub use document::*;
pub use expression::*;
pub use kind::*;
pub use spec::*;

#[cfg(test)]
mod tests;
