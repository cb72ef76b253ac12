// Robot domain model - One telemetry record per robot
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub id: String,
    pub online: bool,
    pub battery_percent: f64,
    pub cpu_percent: f64,
    pub ram_mb: f64,
    pub position: Position,
    pub last_updated: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("robot id is empty")]
    EmptyId,
    #[error("battery percentage {0} outside [0, 100]")]
    BatteryOutOfRange(f64),
    #[error("ram consumption {0} is negative or not finite")]
    InvalidRam(f64),
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

impl TelemetryRecord {
    /// Check the invariants a record must hold before it can enter a snapshot.
    /// CPU usage is carried through unchecked.
    pub fn validate(self) -> Result<Self, RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::EmptyId);
        }
        if !(0.0..=100.0).contains(&self.battery_percent) {
            return Err(RecordError::BatteryOutOfRange(self.battery_percent));
        }
        if !self.ram_mb.is_finite() || self.ram_mb < 0.0 {
            return Err(RecordError::InvalidRam(self.ram_mb));
        }
        if !(-90.0..=90.0).contains(&self.position.lat) {
            return Err(RecordError::LatitudeOutOfRange(self.position.lat));
        }
        if !(-180.0..=180.0).contains(&self.position.lng) {
            return Err(RecordError::LongitudeOutOfRange(self.position.lng));
        }
        Ok(self)
    }

    /// Leading eight characters of the id, as shown in the table and marker popups.
    pub fn short_id(&self) -> String {
        self.id.chars().take(8).collect()
    }
}

#[cfg(test)]
pub(crate) fn robot(id: &str, online: bool, battery: f64, lat: f64, lng: f64) -> TelemetryRecord {
    TelemetryRecord {
        id: id.to_string(),
        online,
        battery_percent: battery,
        cpu_percent: 42.0,
        ram_mb: 4096.0,
        position: Position::new(lat, lng),
        last_updated: "2024-11-02 10:15:00".to_string(),
    }
}
