//! Capability-backed predicates.

use std::collections::BTreeSet;

use hauswatch_core::Sensor;
use tracing::warn;

use crate::capabilities::{CapabilityContext, CapabilityRegistry};

use super::RuleState;

/// `Sensor [not]capability args..` for one sensor.
pub(super) fn evaluate_sensor_capability(
    registry: &CapabilityRegistry,
    ctx: &CapabilityContext,
    sensor: &dyn Sensor,
    capability: &str,
    negated: bool,
    args: &[String],
) -> Result<bool, String> {
    match registry.invoke_sensor(capability, ctx, sensor, args) {
        Ok(result) => Ok(result != negated),
        Err(e) => {
            warn!(sensor = %sensor.name(), capability, error = %e, "sensor capability dispatch failed");
            Err(e.to_string())
        }
    }
}

/// `Predicate [not]capability args..`, evaluated once for the whole rule.
pub(super) fn evaluate_general(
    rule: &str,
    sensor_names: &BTreeSet<String>,
    registry: &CapabilityRegistry,
    ctx: &CapabilityContext,
    capability: &str,
    negated: bool,
    args: &[String],
) -> RuleState {
    if !sensor_names.is_empty() {
        warn!(rule, sensors = sensor_names.len(), "general predicate ignores its sensor names");
    }

    match registry.invoke_global(capability, ctx, args) {
        Ok(result) if result != negated => RuleState::passed(),
        Ok(_) => RuleState::violated(BTreeSet::new()),
        Err(e) => {
            warn!(rule, capability, error = %e, "global capability dispatch failed");
            RuleState::violated(BTreeSet::new())
        }
    }
}
