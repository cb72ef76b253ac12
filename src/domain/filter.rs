// Filter engine - Derives the visible subset of a snapshot
use super::robot::TelemetryRecord;
use super::status::StatusCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    All,
    Online,
    Offline,
    LowBattery,
}

impl FilterMode {
    pub const ALL_MODES: [FilterMode; 4] = [
        FilterMode::All,
        FilterMode::Online,
        FilterMode::Offline,
        FilterMode::LowBattery,
    ];

    /// Parse a filter label. Anything unrecognized falls back to `All`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "online" => FilterMode::Online,
            "offline" => FilterMode::Offline,
            "low-battery" => FilterMode::LowBattery,
            _ => FilterMode::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Online => "online",
            FilterMode::Offline => "offline",
            FilterMode::LowBattery => "low-battery",
        }
    }

    pub fn matches(self, record: &TelemetryRecord) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Online => record.online,
            FilterMode::Offline => !record.online,
            FilterMode::LowBattery => {
                StatusCategory::classify(record) == StatusCategory::OnlineLowBattery
            }
        }
    }
}

/// Records of `snapshot` matching `mode`, in snapshot order.
pub fn visible(snapshot: &[TelemetryRecord], mode: FilterMode) -> Vec<&TelemetryRecord> {
    snapshot.iter().filter(|r| mode.matches(r)).collect()
}
