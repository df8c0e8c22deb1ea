//! In-memory house snapshot loaded from JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::{Model, RuleAnnotation, Sensor};

/// A room and the sensors mounted in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub sensors: BTreeSet<String>,
}

/// A sensor with its current field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeSensor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Names of the time-series logs recorded for this sensor.
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub annotations: BTreeMap<String, RuleAnnotation>,
}

impl HomeSensor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = Some(at);
        self
    }
}

impl Sensor for HomeSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    fn annotations(&self) -> &BTreeMap<String, RuleAnnotation> {
        &self.annotations
    }
}

/// On-disk snapshot shape: sensors as a list, rooms referencing them by name.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    rooms: Vec<Room>,
    #[serde(default)]
    sensors: Vec<HomeSensor>,
}

/// In-memory [`Model`] backed by a sensor map.
#[derive(Debug, Clone, Default)]
pub struct HomeModel {
    rooms: Vec<Room>,
    sensors: BTreeMap<String, HomeSensor>,
}

impl HomeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON snapshot.
    ///
    /// Sensors listed in a room inherit that room unless they name one
    /// themselves. A repeated sensor name replaces the earlier entry.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let mut model = Self {
            rooms: snapshot.rooms,
            sensors: BTreeMap::new(),
        };
        for sensor in snapshot.sensors {
            model.insert_sensor(sensor);
        }
        for room in &model.rooms {
            for name in &room.sensors {
                match model.sensors.get_mut(name) {
                    Some(sensor) if sensor.room.is_none() => sensor.room = Some(room.name.clone()),
                    Some(_) => {}
                    None => {
                        tracing::warn!(room = %room.name, sensor = %name, "room lists unknown sensor")
                    }
                }
            }
        }
        Ok(model)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize back to the snapshot shape, annotations included.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = Snapshot {
            rooms: self.rooms.clone(),
            sensors: self.sensors.values().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    pub fn with_sensor(mut self, sensor: HomeSensor) -> Self {
        self.insert_sensor(sensor);
        self
    }

    pub fn insert_sensor(&mut self, sensor: HomeSensor) {
        if self.sensors.contains_key(&sensor.name) {
            tracing::warn!(sensor = %sensor.name, "duplicate sensor name, replacing earlier entry");
        }
        self.sensors.insert(sensor.name.clone(), sensor);
    }

    /// Overwrite one field value; used when replaying successive snapshots.
    pub fn set_field(&mut self, sensor: &str, field: &str, value: impl Into<String>) -> Result<()> {
        let entry = self
            .sensors
            .get_mut(sensor)
            .ok_or_else(|| CoreError::UnknownSensor(sensor.to_string()))?;
        entry.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    pub fn remove_field(&mut self, sensor: &str, field: &str) -> Result<Option<String>> {
        let entry = self
            .sensors
            .get_mut(sensor)
            .ok_or_else(|| CoreError::UnknownSensor(sensor.to_string()))?;
        Ok(entry.fields.remove(field))
    }

    pub fn home_sensor(&self, name: &str) -> Option<&HomeSensor> {
        self.sensors.get(name)
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl Model for HomeModel {
    fn sensor(&self, name: &str) -> Option<&dyn Sensor> {
        self.sensors.get(name).map(|s| s as &dyn Sensor)
    }

    fn sensors(&self) -> Vec<&dyn Sensor> {
        self.sensors.values().map(|s| s as &dyn Sensor).collect()
    }

    fn annotate(&mut self, sensor: &str, annotation: RuleAnnotation) -> Result<()> {
        let entry = self
            .sensors
            .get_mut(sensor)
            .ok_or_else(|| CoreError::UnknownSensor(sensor.to_string()))?;
        entry
            .annotations
            .insert(annotation.rule_name.clone(), annotation);
        Ok(())
    }
}
