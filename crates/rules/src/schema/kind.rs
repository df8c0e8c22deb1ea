//! Rule kind enum derived from a rule's expression.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five shapes a rule expression can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// `<field> [not]<contains|equals|matches|startsWith|endsWith> <literal>`
    Regexp,
    /// `<field> [not]<op> <number>` with op in `< <= == >= > !=`
    Numeric,
    /// `Predicate <capability> [args...]`, evaluated once without sensors.
    GeneralPredicate,
    /// `Sensor <capability> [args...]`, evaluated per named sensor.
    SensorPredicate,
    /// Empty expression; only aggregates preconditions.
    Meta,
}

impl RuleKind {
    /// Whether the kind evaluates against the rule's named sensors.
    pub fn is_sensor_scoped(&self) -> bool {
        matches!(
            self,
            RuleKind::Regexp | RuleKind::Numeric | RuleKind::SensorPredicate
        )
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Regexp => write!(f, "Regexp"),
            RuleKind::Numeric => write!(f, "Numeric"),
            RuleKind::GeneralPredicate => write!(f, "GeneralPredicate"),
            RuleKind::SensorPredicate => write!(f, "SensorPredicate"),
            RuleKind::Meta => write!(f, "Meta"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Regexp" => Ok(RuleKind::Regexp),
            "Numeric" => Ok(RuleKind::Numeric),
            "GeneralPredicate" => Ok(RuleKind::GeneralPredicate),
            "SensorPredicate" => Ok(RuleKind::SensorPredicate),
            "Meta" => Ok(RuleKind::Meta),
            other => Err(format!("unknown rule kind: '{}'", other)),
        }
    }
}
