pub mod config;
pub mod error;
pub mod home;
pub mod model;

pub use config::{Config, EscalationBoundary, WorkingHours};
pub use error::*;
pub use home::{HomeModel, HomeSensor, Room};
pub use model::{Model, RuleAnnotation, Sensor};
