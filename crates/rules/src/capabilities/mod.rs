//! Named boolean capabilities invoked by predicate rules.
//!
//! `Sensor <name> args..` rules call a sensor capability once per named
//! sensor; `Predicate <name> args..` rules call a global capability once.
//! Both kinds live in an explicit [`CapabilityRegistry`]: an unknown name is
//! a map miss, a wrong argument count is caught before the call.

mod builtins;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use hauswatch_core::{Sensor, WorkingHours};

/// Errors raised while dispatching a capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("unknown capability '{name}'")]
    Unknown { name: String },

    #[error("capability '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: Arity,
        got: usize,
    },

    #[error("capability '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

impl CapabilityError {
    pub fn failed(name: &str, reason: impl Into<String>) -> Self {
        CapabilityError::Failed {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Accepted argument count of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}

/// Evaluation-time inputs shared by every capability call in a pass.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityContext {
    pub now: DateTime<Utc>,
    /// Offset used for wall-clock capabilities (working hours, weekends).
    pub offset: FixedOffset,
    pub working_hours: WorkingHours,
}

impl CapabilityContext {
    /// Context at `now`, wall clock in UTC, default working hours.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            offset: Utc.fix(),
            working_hours: WorkingHours::default(),
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = hours;
        self
    }

    /// `now` on the configured wall clock.
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.now.with_timezone(&self.offset)
    }
}

pub type SensorCapabilityFn =
    Box<dyn Fn(&CapabilityContext, &dyn Sensor, &[String]) -> Result<bool, CapabilityError> + Send + Sync>;

pub type GlobalCapabilityFn =
    Box<dyn Fn(&CapabilityContext, &[String]) -> Result<bool, CapabilityError> + Send + Sync>;

struct Entry<F> {
    arity: Arity,
    func: F,
}

/// Registry of sensor and global capabilities, keyed by name.
pub struct CapabilityRegistry {
    sensor: HashMap<String, Entry<SensorCapabilityFn>>,
    global: HashMap<String, Entry<GlobalCapabilityFn>>,
}

impl CapabilityRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            sensor: HashMap::new(),
            global: HashMap::new(),
        }
    }

    /// A registry with the built-in capabilities registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        builtins::register(&mut registry);
        registry
    }

    /// Register (or replace) a per-sensor capability.
    pub fn register_sensor<F>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&CapabilityContext, &dyn Sensor, &[String]) -> Result<bool, CapabilityError>
            + Send
            + Sync
            + 'static,
    {
        self.sensor.insert(
            name.to_string(),
            Entry {
                arity,
                func: Box::new(func),
            },
        );
    }

    /// Register (or replace) a global capability.
    pub fn register_global<F>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&CapabilityContext, &[String]) -> Result<bool, CapabilityError> + Send + Sync + 'static,
    {
        self.global.insert(
            name.to_string(),
            Entry {
                arity,
                func: Box::new(func),
            },
        );
    }

    pub fn invoke_sensor(
        &self,
        name: &str,
        ctx: &CapabilityContext,
        sensor: &dyn Sensor,
        args: &[String],
    ) -> Result<bool, CapabilityError> {
        let entry = self.sensor.get(name).ok_or_else(|| CapabilityError::Unknown {
            name: name.to_string(),
        })?;
        check_arity(name, entry.arity, args)?;
        (entry.func)(ctx, sensor, args)
    }

    pub fn invoke_global(
        &self,
        name: &str,
        ctx: &CapabilityContext,
        args: &[String],
    ) -> Result<bool, CapabilityError> {
        let entry = self.global.get(name).ok_or_else(|| CapabilityError::Unknown {
            name: name.to_string(),
        })?;
        check_arity(name, entry.arity, args)?;
        (entry.func)(ctx, args)
    }

    /// Registered sensor capability names, sorted.
    pub fn sensor_capabilities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sensor.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered global capability names, sorted.
    pub fn global_capabilities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.global.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn check_arity(name: &str, arity: Arity, args: &[String]) -> Result<(), CapabilityError> {
    if arity.accepts(args.len()) {
        Ok(())
    } else {
        Err(CapabilityError::Arity {
            name: name.to_string(),
            expected: arity,
            got: args.len(),
        })
    }
}
