// View aggregation - Map focus point for the visible set
use super::robot::{Position, TelemetryRecord};

/// Where the map centers when there is nothing to show.
pub const ORIGIN: Position = Position { lat: 0.0, lng: 0.0 };

/// Unweighted centroid of the given records. Longitudes are averaged as plain
/// numbers, so fleets straddling the antimeridian center near 0.
pub fn focus<'a, I>(records: I) -> Position
where
    I: IntoIterator<Item = &'a TelemetryRecord>,
{
    let (count, lat_sum, lng_sum) = records
        .into_iter()
        .fold((0usize, 0.0, 0.0), |(n, lat, lng), r| {
            (n + 1, lat + r.position.lat, lng + r.position.lng)
        });

    if count == 0 {
        return ORIGIN;
    }

    Position::new(lat_sum / count as f64, lng_sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::robot::robot;

    #[test]
    fn test_empty_is_origin() {
        assert_eq!(focus(&[]), ORIGIN);
    }

    #[test]
    fn test_single_record() {
        let fleet = [robot("r1", true, 50.0, 48.85, 2.35)];
        assert_eq!(focus(&fleet), Position::new(48.85, 2.35));
    }

    #[test]
    fn test_mean_position() {
        let fleet = [
            robot("r1", true, 50.0, 10.0, 10.0),
            robot("r2", true, 50.0, 20.0, 20.0),
        ];
        assert_eq!(focus(&fleet), Position::new(15.0, 15.0));
    }

    #[test]
    fn test_antimeridian_is_not_wrapped() {
        let fleet = [
            robot("r1", true, 50.0, 0.0, 179.0),
            robot("r2", true, 50.0, 0.0, -179.0),
        ];
        assert_eq!(focus(&fleet), Position::new(0.0, 0.0));
    }
}
