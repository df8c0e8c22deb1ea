//! Typed, immutable rule parameters.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use super::RuleSpecDocument;

/// What to say, and whom to tell, once a violation has lasted a given time.
///
/// The two halves come from separate maps on the wire (`ErrorMessages` and
/// `Escalation`), so either may be absent for a given threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EscalationLevel {
    pub message: Option<String>,
    pub notify_groups: Option<BTreeSet<String>>,
}

/// A validated rule definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSpec {
    pub name: String,
    pub expression: String,
    pub sensor_names: BTreeSet<String>,
    pub view_permissions: BTreeSet<String>,
    /// Rules that must all be ok before this rule's expression is evaluated.
    pub required_true: BTreeSet<String>,
    /// Rules of which at least one must be ok (ignored when empty).
    pub or_rules: BTreeSet<String>,
    pub ok_message: String,
    /// Elapsed seconds since the violation started → escalation level.
    pub thresholds: BTreeMap<u64, EscalationLevel>,
    pub invisible: bool,
    pub priority: i64,
    pub related_logs: BTreeSet<String>,
}

impl RuleSpec {
    /// Build a spec from its wire form.
    ///
    /// Fails on a blank name or a threshold key that is not a number of
    /// seconds. References to the rule itself are dropped with a warning.
    pub fn from_document(doc: RuleSpecDocument) -> Result<Self, String> {
        let name = doc.name.trim().to_string();
        if name.is_empty() {
            return Err("rule Name must not be empty".to_string());
        }

        let mut thresholds: BTreeMap<u64, EscalationLevel> = BTreeMap::new();
        for (key, message) in doc.error_messages {
            let secs = parse_threshold(&name, "ErrorMessages", &key)?;
            thresholds.entry(secs).or_default().message = Some(message);
        }
        for (key, groups) in doc.escalation {
            let secs = parse_threshold(&name, "Escalation", &key)?;
            thresholds.entry(secs).or_default().notify_groups = Some(groups.into_iter().collect());
        }

        let required_true = without_self(&name, "RequiredTrueRules", doc.required_true_rules);
        let or_rules = without_self(&name, "RequiredFalseRules", doc.required_false_rules);

        Ok(Self {
            expression: doc.expression.trim().to_string(),
            sensor_names: doc.sensor_names.into_iter().collect(),
            view_permissions: doc.view_permissions.into_iter().collect(),
            required_true,
            or_rules,
            ok_message: doc.ok_message,
            thresholds,
            invisible: doc.invisible,
            priority: doc.priority,
            related_logs: doc.related_file_logs.into_iter().collect(),
            name,
        })
    }

    /// Convert back to the wire form.
    pub fn to_document(&self) -> RuleSpecDocument {
        let mut error_messages = BTreeMap::new();
        let mut escalation = BTreeMap::new();
        for (secs, level) in &self.thresholds {
            if let Some(message) = &level.message {
                error_messages.insert(secs.to_string(), message.clone());
            }
            if let Some(groups) = &level.notify_groups {
                escalation.insert(secs.to_string(), groups.iter().cloned().collect());
            }
        }

        RuleSpecDocument {
            name: self.name.clone(),
            expression: self.expression.clone(),
            sensor_names: self.sensor_names.iter().cloned().collect(),
            view_permissions: self.view_permissions.iter().cloned().collect(),
            required_true_rules: self.required_true.iter().cloned().collect(),
            required_false_rules: self.or_rules.iter().cloned().collect(),
            ok_message: self.ok_message.clone(),
            error_messages,
            escalation,
            invisible: self.invisible,
            related_file_logs: self.related_logs.iter().cloned().collect(),
            priority: self.priority,
        }
    }
}

fn parse_threshold(rule: &str, map: &str, key: &str) -> Result<u64, String> {
    key.trim().parse().map_err(|_| {
        format!(
            "rule '{}': {} key '{}' is not a number of seconds",
            rule, map, key
        )
    })
}

fn without_self(rule: &str, field: &str, names: Vec<String>) -> BTreeSet<String> {
    names
        .into_iter()
        .filter(|n| {
            if n == rule {
                warn!(rule = %rule, field, "rule lists itself as a precondition, dropping reference");
                false
            } else {
                true
            }
        })
        .collect()
}
