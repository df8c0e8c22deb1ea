//! Tests for schema types.

use std::collections::BTreeSet;

use super::*;

const BATTERY_RULE_JSON: &str = r#"
{
  "Name": "battery-low",
  "Expression": "battery < 25",
  "SensorNames": ["S1", "S2"],
  "ViewPermissions": ["admin"],
  "RequiredTrueRules": ["house-armed", "battery-low"],
  "OrRules": ["weekday", "working-hours"],
  "OkMessage": "Batteries fine",
  "ErrorMessages": { "60": "low", "600": "high" },
  "Escalation": { "600": ["family", "admin"], "3600": ["admin"] },
  "Invisible": false,
  "RelatedFileLogs": ["battery.log"],
  "Priority": 3
}
"#;

fn doc(json: &str) -> RuleSpecDocument {
    serde_json::from_str(json).unwrap()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Document / spec conversion ──────────────────────────────────

#[test]
fn parse_full_document() {
    let spec = RuleSpec::from_document(doc(BATTERY_RULE_JSON)).unwrap();

    assert_eq!(spec.name, "battery-low");
    assert_eq!(spec.sensor_names, set(&["S1", "S2"]));
    assert_eq!(spec.or_rules, set(&["weekday", "working-hours"]));
    assert_eq!(spec.priority, 3);
    assert_eq!(spec.related_logs, set(&["battery.log"]));

    let keys: Vec<u64> = spec.thresholds.keys().copied().collect();
    assert_eq!(keys, vec![60, 600, 3600]);
    assert_eq!(spec.thresholds[&60].message.as_deref(), Some("low"));
    assert_eq!(spec.thresholds[&60].notify_groups, None);
    assert_eq!(spec.thresholds[&600].notify_groups, Some(set(&["admin", "family"])));
    assert_eq!(spec.thresholds[&3600].message, None);
}

#[test]
fn self_reference_is_dropped() {
    let spec = RuleSpec::from_document(doc(BATTERY_RULE_JSON)).unwrap();
    assert_eq!(spec.required_true, set(&["house-armed"]));
}

#[test]
fn required_false_rules_is_alias_of_or_rules() {
    let spec = RuleSpec::from_document(doc(
        r#"{ "Name": "r", "RequiredFalseRules": ["a", "b"] }"#,
    ))
    .unwrap();
    assert_eq!(spec.or_rules, set(&["a", "b"]));
}

#[test]
fn absent_and_null_fields_default() {
    let spec = RuleSpec::from_document(doc(
        r#"{ "Name": "meta", "Expression": null, "SensorNames": null, "Priority": null }"#,
    ))
    .unwrap();
    assert_eq!(spec.expression, "");
    assert!(spec.sensor_names.is_empty());
    assert!(spec.thresholds.is_empty());
    assert!(!spec.invisible);
    assert_eq!(spec.priority, 0);
}

#[test]
fn blank_name_is_rejected() {
    let err = RuleSpec::from_document(doc(r#"{ "Name": "   " }"#)).unwrap_err();
    assert!(err.contains("Name"));
}

#[test]
fn non_numeric_threshold_is_rejected() {
    let err = RuleSpec::from_document(doc(
        r#"{ "Name": "r", "ErrorMessages": { "soon": "x" } }"#,
    ))
    .unwrap_err();
    assert!(err.contains("soon"));
}

#[test]
fn document_round_trip_keeps_names_and_thresholds() {
    let spec = RuleSpec::from_document(doc(BATTERY_RULE_JSON)).unwrap();
    let json = serde_json::to_string(&spec.to_document()).unwrap();
    let reparsed = RuleSpec::from_document(doc(&json)).unwrap();

    assert_eq!(reparsed, spec);
    let original = doc(BATTERY_RULE_JSON);
    let written = spec.to_document();
    assert_eq!(written.error_messages, original.error_messages);
    assert_eq!(written.escalation.keys().collect::<Vec<_>>(), original.escalation.keys().collect::<Vec<_>>());
}

// ── Expression classification ───────────────────────────────────

#[test]
fn blank_expression_is_meta() {
    assert_eq!(Expression::parse("").unwrap().kind(), RuleKind::Meta);
    assert_eq!(Expression::parse("   ").unwrap().kind(), RuleKind::Meta);
}

#[test]
fn numeric_expression() {
    match Expression::parse("battery < 25").unwrap() {
        Expression::Numeric {
            field,
            op,
            negated,
            literal,
        } => {
            assert_eq!(field, "battery");
            assert_eq!(op, NumericOp::Lt);
            assert!(!negated);
            assert_eq!(literal, 25.0);
        }
        other => panic!("expected numeric, got {:?}", other),
    }
}

#[test]
fn numeric_operator_with_not_prefix() {
    for text in ["TEMP not>= 21.5", "TEMP not >= 21.5"] {
        match Expression::parse(text).unwrap() {
            Expression::Numeric { op, negated, literal, .. } => {
                assert_eq!(op, NumericOp::Ge);
                assert!(negated);
                assert_eq!(literal, 21.5);
            }
            other => panic!("expected numeric for {text}, got {:?}", other),
        }
    }
}

#[test]
fn numeric_literal_must_hold_a_number() {
    let err = Expression::parse("battery < low").unwrap_err();
    assert!(matches!(err, ExpressionError::InvalidNumber { .. }));
}

#[test]
fn regexp_operators() {
    for (text, expected) in [
        ("STATE contains open", "contains"),
        ("STATE equals closed", "equals"),
        ("STATE startsWith op", "startsWith"),
        ("STATE endswith en", "endsWith"),
        ("STATE matches o.*n", "matches"),
    ] {
        match Expression::parse(text).unwrap() {
            Expression::Regexp { field, op, negated, .. } => {
                assert_eq!(field, "STATE");
                assert_eq!(op.to_string(), expected);
                assert!(!negated);
            }
            other => panic!("expected regexp for {text}, got {:?}", other),
        }
    }
}

#[test]
fn regexp_fused_and_separate_not() {
    for text in ["STATE notcontains open", "STATE not contains open", "STATE notContains open"] {
        match Expression::parse(text).unwrap() {
            Expression::Regexp { op, negated, .. } => {
                assert!(matches!(op, TextOp::Contains));
                assert!(negated, "{text} should be negated");
            }
            other => panic!("expected regexp for {text}, got {:?}", other),
        }
    }
}

#[test]
fn invalid_pattern_is_rejected() {
    let err = Expression::parse("STATE matches (open").unwrap_err();
    assert!(matches!(err, ExpressionError::InvalidPattern { .. }));
}

#[test]
fn sensor_predicate_with_args() {
    match Expression::parse("Sensor isUpdatedWithin 600").unwrap() {
        Expression::SensorPredicate { capability, negated, args } => {
            assert_eq!(capability, "isUpdatedWithin");
            assert!(!negated);
            assert_eq!(args, vec!["600".to_string()]);
        }
        other => panic!("expected sensor predicate, got {:?}", other),
    }
}

#[test]
fn predicate_negation_forms() {
    for text in ["Predicate not isWorkingHours", "Predicate notIsWorkingHours"] {
        match Expression::parse(text).unwrap() {
            Expression::GeneralPredicate { capability, negated, args } => {
                assert_eq!(capability, "isWorkingHours");
                assert!(negated);
                assert!(args.is_empty());
            }
            other => panic!("expected general predicate for {text}, got {:?}", other),
        }
    }
}

#[test]
fn capability_starting_with_not_lowercase_is_not_negated() {
    match Expression::parse("Sensor notified").unwrap() {
        Expression::SensorPredicate { capability, negated, .. } => {
            assert_eq!(capability, "notified");
            assert!(!negated);
        }
        other => panic!("expected sensor predicate, got {:?}", other),
    }
}

#[test]
fn numeric_classification_wins_over_predicate_prefix() {
    assert_eq!(Expression::parse("Sensor < 3").unwrap().kind(), RuleKind::Numeric);
}

#[test]
fn unknown_expressions() {
    for text in ["battery is low", "Sensor", "Predicate", "battery <", "a b c d e"] {
        assert!(
            matches!(Expression::parse(text), Err(ExpressionError::Unknown(_))),
            "{text} should be unknown"
        );
    }
}

#[test]
fn first_number_extraction() {
    assert_eq!(first_number("2.9V"), Some(2.9));
    assert_eq!(first_number("level=-4 dB"), Some(-4.0));
    assert_eq!(first_number("30"), Some(30.0));
    assert_eq!(first_number("n/a"), None);
}

#[test]
fn kind_display_round_trip() {
    for kind in [
        RuleKind::Regexp,
        RuleKind::Numeric,
        RuleKind::GeneralPredicate,
        RuleKind::SensorPredicate,
        RuleKind::Meta,
    ] {
        assert_eq!(kind.to_string().parse::<RuleKind>().unwrap(), kind);
    }
}

#[test]
fn sensor_scoped_kinds() {
    assert!(RuleKind::Numeric.is_sensor_scoped());
    assert!(RuleKind::Regexp.is_sensor_scoped());
    assert!(RuleKind::SensorPredicate.is_sensor_scoped());
    assert!(!RuleKind::GeneralPredicate.is_sensor_scoped());
    assert!(!RuleKind::Meta.is_sensor_scoped());
}
