// Wire format - Robot records as the telemetry backend encodes them
use crate::application::telemetry_source::FleetPayload;
use crate::domain::robot::{Position, RecordError, TelemetryRecord};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Deserialize)]
struct WireRobot {
    #[serde(rename = "Robot ID")]
    id: String,
    #[serde(rename = "Online/Offline")]
    online: bool,
    #[serde(rename = "Battery Percentage")]
    battery_percentage: f64,
    #[serde(rename = "CPU Usage")]
    cpu_usage: f64,
    #[serde(rename = "RAM Consumption")]
    ram_consumption: f64,
    #[serde(rename = "Location Coordinates")]
    location: (f64, f64),
    #[serde(rename = "Last Updated", default)]
    last_updated: String,
}

impl From<WireRobot> for TelemetryRecord {
    fn from(wire: WireRobot) -> Self {
        TelemetryRecord {
            id: wire.id,
            online: wire.online,
            battery_percent: wire.battery_percentage,
            cpu_percent: wire.cpu_usage,
            ram_mb: wire.ram_consumption,
            position: Position::new(wire.location.0, wire.location.1),
            last_updated: wire.last_updated,
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("fleet payload must be a JSON array, got {0}")]
    NotAList(&'static str),
    #[error("update event carried no payload")]
    MissingPayload,
    #[error("malformed robot record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid robot record: {0}")]
    Invalid(#[from] RecordError),
    #[error("duplicate robot id {0}")]
    DuplicateId(String),
}

/// Decode a full fleet. Records that fail to decode or validate are skipped
/// and counted; only a payload that is not an array fails as a whole.
pub fn decode_fleet(value: Value) -> Result<FleetPayload, WireError> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(WireError::NotAList(json_kind(&other))),
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());
    let mut rejected = 0;

    for (index, item) in items.into_iter().enumerate() {
        let decoded = decode_robot(item).and_then(|record| {
            if seen.insert(record.id.clone()) {
                Ok(record)
            } else {
                Err(WireError::DuplicateId(record.id))
            }
        });

        match decoded {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping robot record #{}: {}", index, e);
                rejected += 1;
            }
        }
    }

    Ok(FleetPayload { records, rejected })
}

fn decode_robot(item: Value) -> Result<TelemetryRecord, WireError> {
    let wire: WireRobot = serde_json::from_value(item)?;
    Ok(TelemetryRecord::from(wire).validate()?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
