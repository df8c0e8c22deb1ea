//! Expression evaluation against a model snapshot.
//!
//! Sensor-scoped kinds (numeric, regexp, sensor predicate) describe the
//! fault condition: a sensor for which the condition holds is violated.
//! A general predicate is the other way round, its capability result is the
//! rule's overall outcome. Failures never escape: a missing sensor, missing
//! field or failed capability degrades to a violation and is logged.
//!
//! - **Comparison mode** ([`comparison`]): numeric and text operators on a
//!   sensor field.
//! - **Predicate mode** ([`predicate`]): named capabilities from the
//!   [`CapabilityRegistry`].

mod comparison;
mod predicate;

use std::collections::BTreeSet;

use hauswatch_core::{Model, Sensor};
use serde::Serialize;
use tracing::debug;

use crate::capabilities::{CapabilityContext, CapabilityRegistry};
use crate::schema::{Expression, RuleKind};

use comparison::{evaluate_numeric, evaluate_text};
use predicate::{evaluate_general, evaluate_sensor_capability};

// ── Rule state ──────────────────────────────────────────────────────

/// Outcome of evaluating one rule once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleState {
    pub ok: bool,
    /// Sensors for which the rule held.
    pub ok_sensors: BTreeSet<String>,
    /// Sensors that violated the rule.
    pub violated_sensors: BTreeSet<String>,
}

impl RuleState {
    /// An ok state touching no sensors (Meta rules, passing global predicates).
    pub fn passed() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    /// A violated state blaming the given sensors.
    pub fn violated(sensors: BTreeSet<String>) -> Self {
        Self {
            ok: false,
            ok_sensors: BTreeSet::new(),
            violated_sensors: sensors,
        }
    }

    /// Combine per-sensor results of a sensor-scoped rule.
    ///
    /// A rule that touched no sensor at all is not ok: there is nothing it
    /// could have confirmed.
    pub fn from_sensors(ok_sensors: BTreeSet<String>, violated_sensors: BTreeSet<String>) -> Self {
        Self {
            ok: violated_sensors.is_empty() && !ok_sensors.is_empty(),
            ok_sensors,
            violated_sensors,
        }
    }
}

// ── Expression evaluation ───────────────────────────────────────────

/// Evaluate a classified expression for one rule.
///
/// `sensor_names` is the rule's sensor set; general predicates ignore it.
pub fn evaluate_expression(
    rule: &str,
    expression: &Expression,
    sensor_names: &BTreeSet<String>,
    model: &dyn Model,
    registry: &CapabilityRegistry,
    ctx: &CapabilityContext,
) -> RuleState {
    // Nothing to confirm: a sensor-scoped rule without sensors is not ok.
    if expression.kind().is_sensor_scoped() && sensor_names.is_empty() {
        debug!(rule, kind = %expression.kind(), "sensor-scoped rule names no sensors");
        return RuleState::violated(BTreeSet::new());
    }

    match expression {
        Expression::Meta => RuleState::passed(),
        Expression::Numeric {
            field,
            op,
            negated,
            literal,
        } => per_sensor(rule, sensor_names, model, |sensor| {
            evaluate_numeric(sensor, field, *op, *negated, *literal)
        }),
        Expression::Regexp {
            field,
            op,
            negated,
            literal,
        } => per_sensor(rule, sensor_names, model, |sensor| {
            evaluate_text(sensor, field, op, *negated, literal)
        }),
        Expression::SensorPredicate {
            capability,
            negated,
            args,
        } => per_sensor(rule, sensor_names, model, |sensor| {
            evaluate_sensor_capability(registry, ctx, sensor, capability, *negated, args)
        }),
        Expression::GeneralPredicate {
            capability,
            negated,
            args,
        } => evaluate_general(rule, sensor_names, registry, ctx, capability, *negated, args),
    }
}

/// Run `violates` for every named sensor and sort them into ok/violated.
///
/// `violates` returns `Ok(true)` when the fault condition holds for the
/// sensor, `Err` with a reason when it could not be decided. Undecidable
/// sensors count as violated.
fn per_sensor<F>(rule: &str, sensor_names: &BTreeSet<String>, model: &dyn Model, violates: F) -> RuleState
where
    F: Fn(&dyn Sensor) -> Result<bool, String>,
{
    let mut ok_sensors = BTreeSet::new();
    let mut violated_sensors = BTreeSet::new();

    for name in sensor_names {
        let verdict = match model.sensor(name) {
            Some(sensor) => violates(sensor),
            None => Err("sensor not in model".to_string()),
        };
        match verdict {
            Ok(false) => {
                ok_sensors.insert(name.clone());
            }
            Ok(true) => {
                violated_sensors.insert(name.clone());
            }
            Err(reason) => {
                debug!(rule, sensor = %name, %reason, "sensor counted as violated");
                violated_sensors.insert(name.clone());
            }
        }
    }

    RuleState::from_sensors(ok_sensors, violated_sensors)
}

/// Whether a rule's outcome is tracked, snapshotted and annotated.
///
/// Invisible rules and general predicates only gate other rules.
pub fn is_externally_visible(kind: RuleKind, invisible: bool) -> bool {
    !invisible && kind != RuleKind::GeneralPredicate
}
