//! Built-in sensor and global capabilities.

use chrono::{Datelike, NaiveTime, Timelike, Weekday};
use hauswatch_core::Sensor;

use super::{Arity, CapabilityContext, CapabilityError, CapabilityRegistry};

/// Field a sensor reports as `true` while the radio link is down.
const UNREACHABLE_FIELD: &str = "UNREACH";
/// Field a sensor reports as `true` while its battery is low.
const LOW_BATTERY_FIELD: &str = "LOWBAT";

pub(super) fn register(registry: &mut CapabilityRegistry) {
    registry.register_sensor("hasField", Arity::exactly(1), |_, sensor, args| {
        Ok(sensor.field(&args[0]).is_some())
    });
    registry.register_sensor("isReachable", Arity::exactly(0), |_, sensor, _| {
        Ok(!flag_set(sensor, UNREACHABLE_FIELD))
    });
    registry.register_sensor("isLowBattery", Arity::exactly(0), |_, sensor, _| {
        Ok(flag_set(sensor, LOW_BATTERY_FIELD))
    });
    registry.register_sensor("isUpdatedWithin", Arity::exactly(1), is_updated_within);
    registry.register_sensor("fieldIn", Arity::at_least(2), |_, sensor, args| {
        Ok(sensor
            .field(&args[0])
            .is_some_and(|value| args[1..].iter().any(|candidate| candidate == value)))
    });

    registry.register_global("isWorkingHours", Arity::between(0, 2), is_working_hours);
    registry.register_global("isWeekend", Arity::exactly(0), |ctx, _| {
        Ok(is_weekend(ctx.local_now().weekday()))
    });
    registry.register_global("isBetween", Arity::exactly(2), is_between);
}

fn flag_set(sensor: &dyn Sensor, field: &str) -> bool {
    sensor
        .field(field)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// `isUpdatedWithin <seconds>`: the sensor reported no longer ago than that.
fn is_updated_within(
    ctx: &CapabilityContext,
    sensor: &dyn Sensor,
    args: &[String],
) -> Result<bool, CapabilityError> {
    let secs: i64 = args[0]
        .parse()
        .map_err(|_| CapabilityError::failed("isUpdatedWithin", format!("'{}' is not a number of seconds", args[0])))?;
    let last = sensor
        .last_updated()
        .ok_or_else(|| CapabilityError::failed("isUpdatedWithin", format!("sensor '{}' has no update time", sensor.name())))?;
    Ok((ctx.now - last).num_seconds() <= secs)
}

/// `isWorkingHours [start_hour end_hour]`: a weekday within the working window.
fn is_working_hours(ctx: &CapabilityContext, args: &[String]) -> Result<bool, CapabilityError> {
    let (start, end) = match args {
        [] => (ctx.working_hours.start_hour, ctx.working_hours.end_hour),
        [start, end] => (parse_hour(start)?, parse_hour(end)?),
        _ => {
            return Err(CapabilityError::failed(
                "isWorkingHours",
                "expects no arguments or a start and end hour",
            ))
        }
    };
    let local = ctx.local_now();
    Ok(!is_weekend(local.weekday()) && local.hour() >= start && local.hour() < end)
}

fn parse_hour(raw: &str) -> Result<u32, CapabilityError> {
    match raw.parse::<u32>() {
        Ok(h) if h <= 24 => Ok(h),
        _ => Err(CapabilityError::failed("isWorkingHours", format!("'{}' is not an hour", raw))),
    }
}

/// `isBetween HH:MM HH:MM`: wall-clock time in `[from, to)`, wrapping past midnight.
fn is_between(ctx: &CapabilityContext, args: &[String]) -> Result<bool, CapabilityError> {
    let from = parse_time(&args[0])?;
    let to = parse_time(&args[1])?;
    let now = ctx.local_now().time();
    if from <= to {
        Ok(now >= from && now < to)
    } else {
        Ok(now >= from || now < to)
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, CapabilityError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|e| CapabilityError::failed("isBetween", format!("'{}': {}", raw, e)))
}
