//! The model collaborator the rule engine evaluates against.
//!
//! A [`Model`] is one snapshot of the house: a set of named sensors, each
//! exposing string-valued fields. The engine only reads fields and, after a
//! pass, writes [`RuleAnnotation`]s back onto the sensors it touched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outcome of one rule as shown on an affected sensor.
///
/// Sensors key annotations by `rule_name`, so annotating again for the same
/// rule replaces the previous entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAnnotation {
    pub rule_name: String,
    pub ok: bool,
    pub message: String,
    #[serde(default)]
    pub notify_groups: BTreeSet<String>,
    /// Permissions a caller needs to see this annotation.
    #[serde(default)]
    pub view_permissions: BTreeSet<String>,
}

/// Read access to a single sensor of the snapshot.
pub trait Sensor {
    fn name(&self) -> &str;

    /// Current string value of a named field, `None` when the sensor does
    /// not report it.
    fn field(&self, name: &str) -> Option<&str>;

    fn room(&self) -> Option<&str> {
        None
    }

    /// When the sensor last reported, if known.
    fn last_updated(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn annotations(&self) -> &BTreeMap<String, RuleAnnotation>;
}

/// The house snapshot as seen by the rule engine.
pub trait Model {
    fn sensor(&self, name: &str) -> Option<&dyn Sensor>;

    /// All sensors, in a stable order.
    fn sensors(&self) -> Vec<&dyn Sensor>;

    /// Sensors for the given names; unknown names are skipped.
    fn sensors_by_names(&self, names: &BTreeSet<String>) -> Vec<&dyn Sensor> {
        names.iter().filter_map(|n| self.sensor(n)).collect()
    }

    /// Attach (or replace) a rule annotation on a sensor.
    fn annotate(&mut self, sensor: &str, annotation: RuleAnnotation) -> Result<()>;
}
