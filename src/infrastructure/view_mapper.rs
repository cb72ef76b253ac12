// Mapper to convert domain views to JSON transfer objects
use crate::application::ingestion::{ChannelState, IngestionStatus};
use crate::application::snapshot_store::Snapshot;
use crate::domain::filter::FilterMode;
use crate::domain::fleet_view::{FleetView, RobotRow};
use crate::domain::robot::Position;
use crate::domain::status::StatusCategory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetViewDto {
    pub filter: &'static str,
    pub snapshot_version: u64,
    pub total: usize,
    pub active: usize,
    pub focus: [f64; 2],
    pub robots: Vec<RobotRowDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotRowDto {
    pub id: String,
    pub short_id: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub marker_color: &'static str,
    pub dimmed: bool,
    pub battery_percent: f64,
    pub cpu_percent: f64,
    pub ram_mb: f64,
    pub position: [f64; 2],
    pub last_updated: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatusDto {
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect_reason: Option<String>,
    pub last_fetch_error: Option<String>,
    pub updates_applied: u64,
    pub snapshot_version: u64,
    pub replaced_at: Option<String>,
    pub robots: usize,
    pub filter: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterDto {
    pub mode: String,
}

impl From<FilterMode> for FilterDto {
    fn from(mode: FilterMode) -> Self {
        Self {
            mode: mode.as_str().to_string(),
        }
    }
}

pub fn fleet_view_to_dto(view: FleetView) -> FleetViewDto {
    FleetViewDto {
        filter: view.filter.as_str(),
        snapshot_version: view.snapshot_version,
        total: view.total,
        active: view.active,
        focus: position_to_pair(view.focus),
        robots: view.robots.into_iter().map(row_to_dto).collect(),
    }
}

fn row_to_dto(row: RobotRow) -> RobotRowDto {
    let dimmed = row.dimmed();
    RobotRowDto {
        status: status_key(row.status),
        status_label: row.status.label(),
        marker_color: row.status.marker_color(),
        dimmed,
        id: row.id,
        short_id: row.short_id,
        battery_percent: row.battery_percent,
        cpu_percent: row.cpu_percent,
        ram_mb: row.ram_mb,
        position: position_to_pair(row.position),
        last_updated: row.last_updated,
    }
}

fn status_key(status: StatusCategory) -> &'static str {
    match status {
        StatusCategory::Offline => "offline",
        StatusCategory::OnlineLowBattery => "online-low-battery",
        StatusCategory::Online => "online",
    }
}

fn position_to_pair(position: Position) -> [f64; 2] {
    [position.lat, position.lng]
}

pub fn status_to_dto(
    status: IngestionStatus,
    snapshot: &Snapshot,
    filter: FilterMode,
) -> IngestionStatusDto {
    let (channel, disconnect_reason) = match status.channel {
        ChannelState::Idle => ("idle", None),
        ChannelState::Connecting => ("connecting", None),
        ChannelState::Connected => ("connected", None),
        ChannelState::Disconnected { reason } => ("disconnected", Some(reason)),
        ChannelState::Closed => ("closed", None),
    };

    IngestionStatusDto {
        channel,
        disconnect_reason,
        last_fetch_error: status.last_fetch_error,
        updates_applied: status.updates_applied,
        snapshot_version: snapshot.version,
        replaced_at: snapshot.replaced_at.map(|t| t.to_rfc3339()),
        robots: snapshot.records.len(),
        filter: filter.as_str(),
    }
}
