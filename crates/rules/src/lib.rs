//! Home rule evaluation and escalation engine.
//!
//! This crate provides:
//! - JSON rule documents with serde deserialization and validation
//! - Filesystem loader with hot-reload via `notify` watcher
//! - A five-kind expression classifier and per-sensor evaluator
//! - An explicit capability registry for `Sensor`/`Predicate` rules
//! - Precondition graph evaluation with memoization and cycle breaking
//! - Violation tracking, duration-based escalation and a bounded history
//! - Priority-ordered snapshots and per-sensor annotations

pub mod capabilities;
pub mod engine;
pub mod evaluator;
pub mod graph;
pub mod loader;
pub mod projection;
pub mod schema;
pub mod tracker;

pub use capabilities::{Arity, CapabilityContext, CapabilityError, CapabilityRegistry};
pub use engine::{PassReport, RuleEngine, SnapshotHandle};
pub use evaluator::RuleState;
pub use graph::{Rule, RuleGraph};
pub use loader::{load_str, LoadOutcome, RuleError, RuleLoader};
pub use projection::RuleSnapshot;
pub use schema::{Expression, RuleKind, RuleSpec};
pub use tracker::{History, PassOutcome, RuleEvent, ViolationRecord, ViolationTracker};
