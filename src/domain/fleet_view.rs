// Fleet view domain model - Everything the renderer needs, already resolved
use super::filter::{visible, FilterMode};
use super::focus::focus;
use super::robot::{Position, TelemetryRecord};
use super::status::StatusCategory;

#[derive(Debug, Clone, PartialEq)]
pub struct RobotRow {
    pub id: String,
    pub short_id: String,
    pub status: StatusCategory,
    pub battery_percent: f64,
    pub cpu_percent: f64,
    pub ram_mb: f64,
    pub position: Position,
    pub last_updated: String,
}

impl RobotRow {
    pub fn from_record(record: &TelemetryRecord) -> Self {
        Self {
            id: record.id.clone(),
            short_id: record.short_id(),
            status: StatusCategory::classify(record),
            battery_percent: record.battery_percent,
            cpu_percent: record.cpu_percent,
            ram_mb: record.ram_mb,
            position: record.position,
            last_updated: record.last_updated.clone(),
        }
    }

    /// Offline rows are rendered faded
    pub fn dimmed(&self) -> bool {
        self.status == StatusCategory::Offline
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetView {
    pub filter: FilterMode,
    pub snapshot_version: u64,
    pub total: usize,
    pub active: usize,
    pub focus: Position,
    pub robots: Vec<RobotRow>,
}

impl FleetView {
    pub fn compose(snapshot_version: u64, records: &[TelemetryRecord], filter: FilterMode) -> Self {
        let shown = visible(records, filter);
        let center = focus(shown.iter().copied());
        let robots: Vec<RobotRow> = shown.into_iter().map(RobotRow::from_record).collect();

        Self {
            filter,
            snapshot_version,
            total: records.len(),
            active: robots.len(),
            focus: center,
            robots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::focus::ORIGIN;
    use crate::domain::robot::robot;

    #[test]
    fn test_compose_counts_and_rows() {
        let fleet = vec![
            robot("offline-1", false, 90.0, 10.0, 10.0),
            robot("lowbat-1", true, 15.0, 20.0, 20.0),
            robot("nominal-1", true, 80.0, 30.0, 30.0),
        ];

        let view = FleetView::compose(4, &fleet, FilterMode::Online);
        assert_eq!(view.snapshot_version, 4);
        assert_eq!(view.total, 3);
        assert_eq!(view.active, 2);
        assert_eq!(view.focus, Position::new(25.0, 25.0));
        assert_eq!(view.robots[0].status, StatusCategory::OnlineLowBattery);
        assert_eq!(view.robots[1].status, StatusCategory::Online);
        assert_eq!(view.robots[0].short_id, "lowbat-1");
    }

    #[test]
    fn test_offline_rows_dimmed() {
        let fleet = vec![robot("r1", false, 90.0, 0.0, 0.0), robot("r2", true, 90.0, 0.0, 0.0)];
        let view = FleetView::compose(1, &fleet, FilterMode::All);
        assert!(view.robots[0].dimmed());
        assert!(!view.robots[1].dimmed());
    }

    #[test]
    fn test_empty_fleet() {
        for mode in FilterMode::ALL_MODES {
            let view = FleetView::compose(0, &[], mode);
            assert_eq!(view.total, 0);
            assert_eq!(view.active, 0);
            assert_eq!(view.focus, ORIGIN);
            assert!(view.robots.is_empty());
        }
    }
}
