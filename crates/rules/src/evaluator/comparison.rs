//! Numeric and text comparisons on a single sensor field.

use hauswatch_core::Sensor;

use crate::schema::{first_number, NumericOp, TextOp};

/// `field op literal` on the first number found in the field value.
pub(super) fn evaluate_numeric(
    sensor: &dyn Sensor,
    field: &str,
    op: NumericOp,
    negated: bool,
    literal: f64,
) -> Result<bool, String> {
    let raw = field_value(sensor, field)?;
    let value = first_number(raw).ok_or_else(|| format!("field '{}' value '{}' holds no number", field, raw))?;
    Ok(op.apply(value, literal) != negated)
}

/// `field op literal` on the raw field string.
pub(super) fn evaluate_text(
    sensor: &dyn Sensor,
    field: &str,
    op: &TextOp,
    negated: bool,
    literal: &str,
) -> Result<bool, String> {
    let raw = field_value(sensor, field)?;
    Ok(op.apply(raw, literal) != negated)
}

fn field_value<'a>(sensor: &'a dyn Sensor, field: &str) -> Result<&'a str, String> {
    sensor
        .field(field)
        .ok_or_else(|| format!("field '{}' missing", field))
}
