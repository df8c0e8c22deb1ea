//! Derived views of a pass: the priority-ordered snapshot list and the
//! per-sensor rule annotations.
//!
//! Nothing here keeps state between passes.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use hauswatch_core::{Model, RuleAnnotation};
use serde::Serialize;
use tracing::debug;

use crate::evaluator::RuleState;
use crate::graph::RuleGraph;
use crate::tracker::ViolationTracker;

/// One currently violated rule, ready to push to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSnapshot {
    pub rule_name: String,
    pub priority: i64,
    pub since: DateTime<Utc>,
    pub duration_secs: u64,
    pub message: String,
    pub notify_groups: BTreeSet<String>,
    pub violated_sensors: BTreeSet<String>,
    pub view_permissions: BTreeSet<String>,
    pub related_logs: BTreeSet<String>,
}

/// Snapshots for every tracked violation, ascending by priority then name.
pub fn project_snapshots(graph: &RuleGraph, tracker: &ViolationTracker, now: DateTime<Utc>) -> Vec<RuleSnapshot> {
    let mut snapshots: Vec<RuleSnapshot> = tracker
        .records()
        .values()
        .filter_map(|record| {
            let rule = graph.rule(&record.rule_name)?;
            let escalation = tracker.escalation(&rule.spec, record.since, now);
            Some(RuleSnapshot {
                rule_name: record.rule_name.clone(),
                priority: rule.spec.priority,
                since: record.since,
                duration_secs: record.elapsed_secs(now),
                message: escalation.message_for(rule.name()),
                notify_groups: escalation.notify_groups,
                violated_sensors: record.violated_sensors.clone(),
                view_permissions: rule.spec.view_permissions.clone(),
                related_logs: rule.spec.related_logs.clone(),
            })
        })
        .collect();

    snapshots.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.rule_name.cmp(&b.rule_name))
    });
    snapshots
}

/// Write each visible rule's outcome onto the sensors it names.
///
/// Returns the number of annotations written. Sensors missing from the
/// model are skipped.
pub fn annotate_sensors(
    model: &mut dyn Model,
    graph: &RuleGraph,
    states: &BTreeMap<String, Rc<RuleState>>,
    tracker: &ViolationTracker,
    now: DateTime<Utc>,
) -> usize {
    let mut written = 0;

    for rule in graph.rules().iter().filter(|r| r.is_visible()) {
        let Some(state) = states.get(rule.name()) else {
            continue;
        };
        let since = tracker.record(rule.name()).map_or(now, |r| r.since);
        let escalation = tracker.escalation(&rule.spec, since, now);

        for sensor in &rule.spec.sensor_names {
            let ok = !state.violated_sensors.contains(sensor)
                && (state.ok || state.ok_sensors.contains(sensor));
            let annotation = RuleAnnotation {
                rule_name: rule.name().to_string(),
                ok,
                message: if ok {
                    rule.spec.ok_message.clone()
                } else {
                    escalation.message_for(rule.name())
                },
                notify_groups: if ok {
                    BTreeSet::new()
                } else {
                    escalation.notify_groups.clone()
                },
                view_permissions: rule.spec.view_permissions.clone(),
            };
            match model.annotate(sensor, annotation) {
                Ok(()) => written += 1,
                Err(e) => debug!(rule = %rule.name(), sensor = %sensor, error = %e, "annotation skipped"),
            }
        }
    }

    written
}
