//! Violation tracking across evaluation passes.
//!
//! One [`ViolationRecord`] per visible rule that is currently violated,
//! stamped with the time it went from ok to violated. The stamp survives
//! as long as the rule stays violated; when it clears, a [`RuleEvent`] goes
//! into the bounded [`History`].

mod escalation;
mod history;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use hauswatch_core::EscalationBoundary;
use serde::Serialize;
use tracing::{debug, info};

use crate::evaluator::RuleState;
use crate::graph::RuleGraph;
use crate::schema::RuleSpec;

pub use escalation::{select, Escalation};
pub use history::{History, RuleEvent, DEFAULT_HISTORY_CAPACITY};

/// A rule that is violated right now, and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub rule_name: String,
    pub since: DateTime<Utc>,
    /// Violated sensors as of the latest pass.
    pub violated_sensors: BTreeSet<String>,
}

impl ViolationRecord {
    /// Whole seconds since the violation started, never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.since).num_seconds().max(0) as u64
    }
}

/// Rule names that changed state in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Went from ok (or unseen) to violated.
    pub opened: Vec<String>,
    /// Went from violated to ok.
    pub cleared: Vec<String>,
    /// Records whose rule is gone from the rule set or no longer visible.
    pub dropped: Vec<String>,
}

/// Owns the persistent violation map and the event history.
#[derive(Debug, Clone)]
pub struct ViolationTracker {
    records: BTreeMap<String, ViolationRecord>,
    history: History,
    boundary: EscalationBoundary,
}

impl ViolationTracker {
    pub fn new(history_capacity: usize, boundary: EscalationBoundary) -> Self {
        Self {
            records: BTreeMap::new(),
            history: History::with_capacity(history_capacity),
            boundary,
        }
    }

    /// Apply one pass worth of rule states.
    ///
    /// Only visible rules are tracked. Records for rules that no longer
    /// appear in the graph are dropped without an event.
    pub fn update_at(
        &mut self,
        graph: &RuleGraph,
        states: &BTreeMap<String, Rc<RuleState>>,
        now: DateTime<Utc>,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for rule in graph.rules().iter().filter(|r| r.is_visible()) {
            let Some(state) = states.get(rule.name()) else {
                continue;
            };
            seen.insert(rule.name());

            if !state.ok {
                match self.records.get_mut(rule.name()) {
                    Some(record) => record.violated_sensors = state.violated_sensors.clone(),
                    None => {
                        info!(rule = %rule.name(), sensors = ?state.violated_sensors, "violation opened");
                        self.records.insert(
                            rule.name().to_string(),
                            ViolationRecord {
                                rule_name: rule.name().to_string(),
                                since: now,
                                violated_sensors: state.violated_sensors.clone(),
                            },
                        );
                        outcome.opened.push(rule.name().to_string());
                    }
                }
            } else if let Some(record) = self.records.remove(rule.name()) {
                let escalation = self.escalation(&rule.spec, record.since, now);
                let event = RuleEvent {
                    rule_name: record.rule_name,
                    message: escalation.message_for(rule.name()),
                    start: record.since,
                    end: now,
                    sensors: record.violated_sensors,
                };
                info!(rule = %rule.name(), duration_secs = event.duration_secs(), "violation cleared");
                self.history.push(event);
                outcome.cleared.push(rule.name().to_string());
            }
        }

        let stale: Vec<String> = self
            .records
            .keys()
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();
        for name in stale {
            debug!(rule = %name, "dropping violation of rule no longer tracked");
            self.records.remove(&name);
            outcome.dropped.push(name);
        }

        outcome
    }

    /// Escalation for a violation of `spec` that started at `since`.
    pub fn escalation(&self, spec: &RuleSpec, since: DateTime<Utc>, now: DateTime<Utc>) -> Escalation {
        let elapsed = (now - since).num_seconds().max(0) as u64;
        Escalation::resolve(&spec.thresholds, elapsed, self.boundary)
    }

    pub fn records(&self) -> &BTreeMap<String, ViolationRecord> {
        &self.records
    }

    pub fn record(&self, rule_name: &str) -> Option<&ViolationRecord> {
        self.records.get(rule_name)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn boundary(&self) -> EscalationBoundary {
        self.boundary
    }

    /// Forget all records and history.
    pub fn clear(&mut self) {
        self.records.clear();
        self.history.clear();
    }
}

impl Default for ViolationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, EscalationBoundary::default())
    }
}
