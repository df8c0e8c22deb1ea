//! Integration tests that run the shipped rule document in `data/rules/`
//! against the shipped model snapshot in `data/model/`.

use std::path::PathBuf;

use chrono::{DateTime, Offset, TimeZone, Utc};
use hauswatch_core::{HomeModel, Sensor};
use hauswatch_rules::loader::LoadStatus;
use hauswatch_rules::{RuleEngine, RuleKind, RuleLoader, RuleSpec};

/// Integration tests run from the crate directory, so we go up two levels.
fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

fn load_rules() -> Vec<RuleSpec> {
    let outcome = RuleLoader::load_file(&data_dir().join("rules/home.json")).unwrap();
    assert!(
        outcome.results.iter().all(|r| r.status == LoadStatus::Loaded),
        "every shipped rule should load: {:?}",
        outcome.results
    );
    outcome.specs
}

fn load_model() -> HomeModel {
    HomeModel::from_file(&data_dir().join("model/snapshot.json")).unwrap()
}

/// Wednesday morning, a few minutes after the snapshot was taken.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap()
}

#[test]
fn shipped_rules_classify() {
    let specs = load_rules();
    assert_eq!(specs.len(), 7);

    let kind = |name: &str| {
        let spec = specs.iter().find(|s| s.name == name).unwrap();
        hauswatch_rules::Expression::parse(&spec.expression).unwrap().kind()
    };
    assert_eq!(kind("sensors-reachable"), RuleKind::SensorPredicate);
    assert_eq!(kind("smoke-battery-voltage"), RuleKind::Numeric);
    assert_eq!(kind("window-open"), RuleKind::Regexp);
    assert_eq!(kind("house-ok"), RuleKind::Meta);
}

#[test]
fn shipped_model_loads_with_rooms() {
    let model = load_model();
    assert_eq!(model.len(), 4);
    assert_eq!(model.rooms().len(), 4);
    assert_eq!(model.home_sensor("Window Bedroom").unwrap().room(), Some("Bedroom"));
}

#[test]
fn shipped_rules_against_shipped_model() {
    let specs = load_rules();
    let mut model = load_model();
    let mut engine = RuleEngine::default().with_utc_offset(Utc.fix());

    let report = engine.run_pass_at(&specs, &mut model, now());
    assert_eq!(report.rules, 7);

    let snapshots = engine.snapshots();
    let order: Vec<&str> = snapshots.iter().map(|s| s.rule_name.as_str()).collect();
    assert_eq!(order, vec!["window-open", "battery-low", "sensors-updated", "house-ok"]);

    let silent = &snapshots[2];
    assert_eq!(silent.violated_sensors.iter().collect::<Vec<_>>(), vec!["Smoke Hallway"]);

    let bedroom = model.home_sensor("Window Bedroom").unwrap().annotations();
    assert!(!bedroom["window-open"].ok);
    assert!(!bedroom["battery-low"].ok);
    assert!(bedroom["sensors-reachable"].ok);
    assert_eq!(bedroom["sensors-reachable"].message, "All sensors reachable");

    let kitchen = model.home_sensor("Window Kitchen").unwrap().annotations();
    assert!(kitchen["window-open"].ok);
    assert_eq!(kitchen["window-open"].message, "Windows closed");
}
