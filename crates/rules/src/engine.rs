//! The evaluation pass: graph → states → tracker → projections.
//!
//! [`RuleEngine`] owns everything that lives across passes. Passes run one
//! at a time through `&mut self`; readers on other threads go through a
//! [`SnapshotHandle`], which only ever sees the result of a completed pass.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use hauswatch_core::config::EngineConfig;
use hauswatch_core::{Model, WorkingHours};
use tracing::{debug, info};

use crate::capabilities::{CapabilityContext, CapabilityRegistry};
use crate::graph::RuleGraph;
use crate::loader::{load_str, Result};
use crate::projection::{annotate_sensors, project_snapshots, RuleSnapshot};
use crate::schema::RuleSpec;
use crate::tracker::{History, PassOutcome, RuleEvent, ViolationRecord, ViolationTracker};

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub at: DateTime<Utc>,
    pub rules: usize,
    /// Visible rules violated after the pass.
    pub violated: usize,
    pub annotations: usize,
    pub outcome: PassOutcome,
}

/// What readers see: the last completed pass.
#[derive(Debug, Clone, Default)]
struct Published {
    snapshots: Arc<Vec<RuleSnapshot>>,
    events: Arc<Vec<RuleEvent>>,
}

/// Cloneable, thread-safe read access to the published snapshot list.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    published: Arc<RwLock<Published>>,
}

impl SnapshotHandle {
    /// Active violations of the last completed pass, by priority.
    pub fn snapshots(&self) -> Arc<Vec<RuleSnapshot>> {
        Arc::clone(&self.published.read().expect("snapshot lock poisoned").snapshots)
    }

    /// Up to `limit` cleared violations, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<RuleEvent> {
        let guard = self.published.read().expect("snapshot lock poisoned");
        guard.events.iter().take(limit).cloned().collect()
    }
}

pub struct RuleEngine {
    registry: CapabilityRegistry,
    tracker: ViolationTracker,
    working_hours: WorkingHours,
    /// Fixed wall-clock offset for time-of-day capabilities. `None` follows
    /// the host's local zone, resolved at each pass time.
    utc_offset: Option<FixedOffset>,
    published: Arc<RwLock<Published>>,
}

impl RuleEngine {
    /// Engine with the built-in capabilities, following the host's local zone.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            registry: CapabilityRegistry::with_builtins(),
            tracker: ViolationTracker::new(config.history_capacity, config.escalation_boundary),
            working_hours: config.working_hours,
            utc_offset: None,
            published: Arc::new(RwLock::new(Published::default())),
        }
    }

    pub fn with_registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Pin time-of-day capabilities to `offset` instead of the local zone.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    /// Wall-clock offset in effect at `now`.
    ///
    /// Unpinned engines re-resolve it every pass so a long-running worker
    /// follows daylight-saving changes.
    pub fn utc_offset_at(&self, now: DateTime<Utc>) -> FixedOffset {
        self.utc_offset
            .unwrap_or_else(|| now.with_timezone(&Local).offset().fix())
    }

    /// Register extra capabilities on the live registry.
    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.registry
    }

    pub fn run_pass(&mut self, specs: &[RuleSpec], model: &mut dyn Model) -> PassReport {
        self.run_pass_at(specs, model, Utc::now())
    }

    /// Evaluate `specs` against `model` as of `now`.
    ///
    /// Rebuilds the rule graph, evaluates every rule, updates the tracker,
    /// annotates sensors and publishes the new snapshot list.
    pub fn run_pass_at(&mut self, specs: &[RuleSpec], model: &mut dyn Model, now: DateTime<Utc>) -> PassReport {
        let ctx = CapabilityContext::at(now)
            .with_offset(self.utc_offset_at(now))
            .with_working_hours(self.working_hours);

        let mut graph = RuleGraph::build(specs);
        let states = graph.evaluate_all(&*model, &self.registry, &ctx);
        let outcome = self.tracker.update_at(&graph, &states, now);
        let annotations = annotate_sensors(model, &graph, &states, &self.tracker, now);
        let snapshots = project_snapshots(&graph, &self.tracker, now);

        let report = PassReport {
            at: now,
            rules: graph.len(),
            violated: self.tracker.records().len(),
            annotations,
            outcome,
        };

        let events = self.tracker.history().recent(self.tracker.history().capacity());
        *self.published.write().expect("snapshot lock poisoned") = Published {
            snapshots: Arc::new(snapshots),
            events: Arc::new(events),
        };

        if report.outcome.opened.is_empty() && report.outcome.cleared.is_empty() {
            debug!(rules = report.rules, violated = report.violated, "pass complete");
        } else {
            info!(
                rules = report.rules,
                violated = report.violated,
                opened = report.outcome.opened.len(),
                cleared = report.outcome.cleared.len(),
                "pass complete"
            );
        }
        report
    }

    /// Load a rule document and run a pass over it.
    ///
    /// A malformed document fails before anything is evaluated; tracked
    /// state and published snapshots stay as they were.
    pub fn run_pass_from_source(
        &mut self,
        json: &str,
        model: &mut dyn Model,
        now: DateTime<Utc>,
    ) -> Result<PassReport> {
        let outcome = load_str(json)?;
        Ok(self.run_pass_at(&outcome.specs, model, now))
    }

    /// Snapshot list of the last completed pass.
    pub fn snapshots(&self) -> Arc<Vec<RuleSnapshot>> {
        self.snapshot_handle().snapshots()
    }

    /// A handle readers can keep across passes.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            published: Arc::clone(&self.published),
        }
    }

    /// The `n` most urgent active violations (lowest priority value first).
    pub fn top_issues(&self, n: usize) -> Vec<RuleSnapshot> {
        self.snapshots().iter().take(n).cloned().collect()
    }

    pub fn history(&self) -> &History {
        self.tracker.history()
    }

    pub fn records(&self) -> &BTreeMap<String, ViolationRecord> {
        self.tracker.records()
    }

    /// Drop all tracked violations, history and published snapshots.
    pub fn clear(&mut self) {
        self.tracker.clear();
        *self.published.write().expect("snapshot lock poisoned") = Published::default();
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use hauswatch_core::{HomeModel, HomeSensor, Sensor};

    use super::*;

    const RULES: &str = r#"[
      { "Name": "battery", "Expression": "battery < 25", "SensorNames": ["S1"],
        "OkMessage": "ok", "ErrorMessages": { "60": "low", "600": "high" }, "Priority": 2 },
      { "Name": "window", "Expression": "STATE contains open", "SensorNames": ["W1"], "Priority": 1 }
    ]"#;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap()
    }

    fn engine() -> RuleEngine {
        RuleEngine::default().with_utc_offset(Utc.fix())
    }

    fn model(battery: &str, state: &str) -> HomeModel {
        HomeModel::new()
            .with_sensor(HomeSensor::new("S1").with_field("battery", battery))
            .with_sensor(HomeSensor::new("W1").with_field("STATE", state))
    }

    #[test]
    fn pass_publishes_sorted_snapshots_and_annotations() {
        let mut engine = engine();
        let mut m = model("10", "open");
        let report = engine.run_pass_from_source(RULES, &mut m, t0()).unwrap();

        assert_eq!(report.rules, 2);
        assert_eq!(report.violated, 2);
        assert_eq!(report.annotations, 2);

        let names: Vec<String> = engine.snapshots().iter().map(|s| s.rule_name.clone()).collect();
        assert_eq!(names, vec!["window", "battery"]);
        assert_eq!(engine.top_issues(1)[0].rule_name, "window");
        assert!(!m.home_sensor("S1").unwrap().annotations()["battery"].ok);
    }

    #[test]
    fn handle_sees_only_completed_passes() {
        let mut engine = engine();
        let handle = engine.snapshot_handle();
        assert!(handle.snapshots().is_empty());

        engine.run_pass_from_source(RULES, &mut model("10", "closed"), t0()).unwrap();
        assert_eq!(handle.snapshots().len(), 1);

        engine
            .run_pass_from_source(RULES, &mut model("80", "closed"), t0() + Duration::seconds(5))
            .unwrap();
        assert!(handle.snapshots().is_empty());
        let events = handle.recent_events(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule_name, "battery");
    }

    #[test]
    fn malformed_source_leaves_state_untouched() {
        let mut engine = engine();
        engine.run_pass_from_source(RULES, &mut model("10", "open"), t0()).unwrap();
        let before = engine.snapshots();

        let err = engine.run_pass_from_source("{ not json", &mut model("80", "closed"), t0());
        assert!(err.is_err());
        assert!(Arc::ptr_eq(&before, &engine.snapshots()));
        assert_eq!(engine.records().len(), 2);
    }

    #[test]
    fn clear_resets_state() {
        let mut engine = engine();
        engine.run_pass_from_source(RULES, &mut model("10", "open"), t0()).unwrap();
        engine.clear();
        assert!(engine.records().is_empty());
        assert!(engine.snapshots().is_empty());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn offset_is_resolved_at_pass_time() {
        let winter = Utc.with_ymd_and_hms(2026, 12, 2, 16, 30, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2026, 7, 1, 16, 30, 0).unwrap();

        let local = RuleEngine::default();
        assert_eq!(local.utc_offset_at(winter), winter.with_timezone(&Local).offset().fix());
        assert_eq!(local.utc_offset_at(summer), summer.with_timezone(&Local).offset().fix());

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let pinned = RuleEngine::default().with_utc_offset(plus_two);
        assert_eq!(pinned.utc_offset_at(winter), plus_two);
        assert_eq!(pinned.utc_offset_at(summer), plus_two);
    }

    #[test]
    fn working_hours_follow_the_local_zone_of_each_pass() {
        let specs = load_str(
            r#"[
              { "Name": "hours", "Expression": "Predicate isWorkingHours" },
              { "Name": "office", "Expression": "", "SensorNames": ["S1"], "RequiredTrueRules": ["hours"] }
            ]"#,
        )
        .unwrap()
        .specs;
        let mut engine = RuleEngine::default();

        // 14:00 on a winter Wednesday in the host's zone, whatever offset
        // was in effect when the engine was built.
        let local_day = chrono::NaiveDate::from_ymd_opt(2026, 12, 2).unwrap();
        let at = local_day
            .and_hms_opt(14, 0, 0)
            .unwrap()
            .and_local_timezone(Local)
            .single()
            .unwrap()
            .with_timezone(&Utc);

        engine.run_pass_at(&specs, &mut model("80", "closed"), at);
        assert!(engine.records().is_empty(), "office violated at 14:00 local");
    }

    #[test]
    fn custom_capabilities_can_be_registered() {
        let mut engine = engine();
        engine
            .registry_mut()
            .register_sensor("isOpen", crate::capabilities::Arity::exactly(0), |_, sensor, _| {
                Ok(sensor.field("STATE") == Some("open"))
            });
        let specs = load_str(r#"[{ "Name": "open", "Expression": "Sensor isOpen", "SensorNames": ["W1"] }]"#)
            .unwrap()
            .specs;

        let report = engine.run_pass_at(&specs, &mut model("80", "open"), t0());
        assert_eq!(report.outcome.opened, vec!["open".to_string()]);
    }
}
