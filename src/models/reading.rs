use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single measured value together with the header metadata of its column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub value: String,
    pub unit: String,
    pub measurement_type: String,
}

impl Measurement {
    pub fn new(value: &str, unit: &str, measurement_type: &str) -> Self {
        Self {
            value: value.to_string(),
            unit: unit.to_string(),
            measurement_type: measurement_type.to_string(),
        }
    }
}

/// Measurements of one row keyed by lower-cased column identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(BTreeMap<String, Measurement>);

impl Reading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys are always stored lower-case.
    pub fn insert(&mut self, identifier: &str, measurement: Measurement) {
        self.0.insert(identifier.to_lowercase(), measurement);
    }

    pub fn get(&self, identifier: &str) -> Option<&Measurement> {
        self.0.get(&identifier.to_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// The unit of insertion: one row of one site at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datapoint {
    pub site_id: i32,
    pub timestamp: DateTime<Utc>,
    pub readings: Reading,
}

impl Datapoint {
    pub fn new(site_id: i32, timestamp: DateTime<Utc>, readings: Reading) -> Self {
        Self {
            site_id,
            timestamp,
            readings,
        }
    }
}
