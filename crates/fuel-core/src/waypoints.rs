//! Route polyline sampling.

use crate::models::{RouteGeometry, Waypoint};
use crate::spatial::haversine_miles;

/// Sample a route polyline into waypoints spaced roughly `interval_miles` apart.
///
/// Coordinates are read in GeoJSON `[lng, lat]` order. The first coordinate is
/// always the first waypoint (at mile 0) and the last coordinate is always the
/// last waypoint. Fewer than two coordinates produce an empty list, which
/// callers treat as "no route".
pub fn build_waypoints(geometry: &RouteGeometry, interval_miles: f64) -> Vec<Waypoint> {
    sample_coordinates(&geometry.coordinates, interval_miles)
}

/// Same as [`build_waypoints`] over a bare coordinate slice.
pub fn sample_coordinates(coords: &[[f64; 2]], interval_miles: f64) -> Vec<Waypoint> {
    let Some((&[lng0, lat0], rest)) = coords.split_first() else {
        return Vec::new();
    };
    if rest.is_empty() {
        return Vec::new();
    }

    let mut waypoints = vec![Waypoint {
        lat: lat0,
        lng: lng0,
        cumulative_miles: 0.0,
    }];

    let mut cum = 0.0;
    let mut last_kept = 0.0;
    let (mut prev_lat, mut prev_lng) = (lat0, lng0);

    for &[lng, lat] in rest {
        cum += haversine_miles(prev_lat, prev_lng, lat, lng);

        if cum - last_kept >= interval_miles {
            waypoints.push(Waypoint {
                lat,
                lng,
                cumulative_miles: cum,
            });
            last_kept = cum;
        }

        prev_lat = lat;
        prev_lng = lng;
    }

    // The destination must always be represented.
    let [lng_last, lat_last] = coords[coords.len() - 1];
    let ends_at_destination = waypoints
        .last()
        .is_some_and(|wp| wp.lat == lat_last && wp.lng == lng_last);
    if !ends_at_destination {
        waypoints.push(Waypoint {
            lat: lat_last,
            lng: lng_last,
            cumulative_miles: cum,
        });
    }

    waypoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::EARTH_RADIUS_MI;

    fn miles_to_lat(miles: f64) -> f64 {
        (miles / EARTH_RADIUS_MI).to_degrees()
    }

    /// Coordinates due north from (30, -100) at the given mile offsets.
    fn meridian(marks: &[f64]) -> Vec<[f64; 2]> {
        marks.iter().map(|&m| [-100.0, 30.0 + miles_to_lat(m)]).collect()
    }

    #[test]
    fn fewer_than_two_coordinates_is_no_route() {
        assert!(sample_coordinates(&[], 50.0).is_empty());
        assert!(sample_coordinates(&[[-100.0, 30.0]], 50.0).is_empty());
        assert!(build_waypoints(&RouteGeometry::default(), 50.0).is_empty());
    }

    #[test]
    fn first_waypoint_is_origin_and_last_is_destination() {
        let coords = meridian(&[0.0, 10.0, 20.0, 30.0, 75.0, 130.0, 133.0]);
        let waypoints = sample_coordinates(&coords, 50.0);

        let first = waypoints.first().unwrap();
        assert_eq!(first.cumulative_miles, 0.0);
        assert_eq!([first.lng, first.lat], coords[0]);

        let last = waypoints.last().unwrap();
        assert_eq!([last.lng, last.lat], coords[coords.len() - 1]);
        assert!((last.cumulative_miles - 133.0).abs() < 1e-6);
    }

    #[test]
    fn emits_when_interval_is_reached() {
        let coords = meridian(&[0.0, 30.0, 60.0, 90.0, 150.0, 151.0]);
        let waypoints = sample_coordinates(&coords, 50.0);
        let miles: Vec<f64> = waypoints.iter().map(|wp| wp.cumulative_miles).collect();

        assert_eq!(miles.len(), 4);
        assert!((miles[1] - 60.0).abs() < 1e-6);
        assert!((miles[2] - 150.0).abs() < 1e-6);
        assert!((miles[3] - 151.0).abs() < 1e-6);
    }

    #[test]
    fn destination_is_not_duplicated() {
        let coords = meridian(&[0.0, 60.0, 120.0]);
        let waypoints = sample_coordinates(&coords, 50.0);
        assert_eq!(waypoints.len(), 3);
    }

    #[test]
    fn duplicate_coordinates_never_trigger_emission() {
        let coords = vec![
            [-100.0, 30.0],
            [-100.0, 30.0],
            [-100.0, 30.0],
            [-100.0, 30.0 + miles_to_lat(20.0)],
            [-100.0, 30.0 + miles_to_lat(20.0)],
        ];
        let waypoints = sample_coordinates(&coords, 5.0);
        assert_eq!(waypoints.len(), 2);
        assert!((waypoints[1].cumulative_miles - 20.0).abs() < 1e-6);
    }

    #[test]
    fn cumulative_miles_is_non_decreasing() {
        // Zig-zag with repeats.
        let coords = vec![
            [-97.0, 32.0],
            [-97.5, 32.4],
            [-97.5, 32.4],
            [-97.1, 32.9],
            [-98.0, 33.5],
            [-97.2, 34.1],
            [-97.2, 34.1],
        ];
        for interval in [1.0, 25.0, 50.0, 500.0] {
            let waypoints = sample_coordinates(&coords, interval);
            assert!(waypoints
                .windows(2)
                .all(|w| w[1].cumulative_miles >= w[0].cumulative_miles));
            let total: f64 = coords
                .windows(2)
                .map(|pair| haversine_miles(pair[0][1], pair[0][0], pair[1][1], pair[1][0]))
                .sum();
            assert!((waypoints.last().unwrap().cumulative_miles - total).abs() < 1e-9);
        }
    }

    #[test]
    fn sampling_is_repeatable() {
        let coords = meridian(&[0.0, 12.5, 44.0, 51.0, 99.0, 200.0]);
        assert_eq!(
            sample_coordinates(&coords, 50.0),
            sample_coordinates(&coords, 50.0)
        );
    }
}
