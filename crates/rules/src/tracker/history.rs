//! Bounded in-memory history of cleared violations.
//!
//! Holds the most recent [`RuleEvent`]s across all rules, capped at a
//! configurable maximum (default 30) with FIFO eviction.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// One violation, from the pass that opened it to the pass that cleared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvent {
    pub rule_name: String,
    /// Escalation message in effect when the violation cleared.
    pub message: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Sensors still violated on the last violated pass.
    pub sensors: BTreeSet<String>,
}

impl RuleEvent {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// FIFO-evicting event log.
#[derive(Debug, Clone)]
pub struct History {
    events: VecDeque<RuleEvent>,
    capacity: usize,
}

impl History {
    /// History with the default capacity of 30 events.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// History with a custom capacity (at least one event is kept).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: RuleEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RuleEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    /// Every retained event of one rule, newest first.
    pub fn for_rule(&self, rule_name: &str) -> Vec<RuleEvent> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.rule_name == rule_name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
