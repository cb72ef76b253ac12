// Status classification - Precedence: offline > low battery > nominal
use super::robot::TelemetryRecord;

pub const LOW_BATTERY_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Offline,
    OnlineLowBattery,
    Online,
}

impl StatusCategory {
    pub fn classify(record: &TelemetryRecord) -> Self {
        if !record.online {
            StatusCategory::Offline
        } else if record.battery_percent < LOW_BATTERY_THRESHOLD {
            StatusCategory::OnlineLowBattery
        } else {
            StatusCategory::Online
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCategory::Offline => "Offline",
            StatusCategory::OnlineLowBattery => "Online (Low Battery)",
            StatusCategory::Online => "Online",
        }
    }

    /// Marker colour understood by the map renderer
    pub fn marker_color(self) -> &'static str {
        match self {
            StatusCategory::Offline => "red",
            StatusCategory::OnlineLowBattery => "yellow",
            StatusCategory::Online => "green",
        }
    }
}
