//! Spatial math for route sampling, corridor search and region lookup.

/// Mean Earth radius in statute miles.
pub const EARTH_RADIUS_MI: f64 = 3958.7613;

/// Conversion factor used for distances reported by routing providers in meters.
pub const MILES_PER_METER: f64 = 0.000621371;

/// Calculate great-circle distance between two points in miles using the
/// Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in miles. Identical points return 0; the `atan2` form keeps the
/// result finite for antipodal points.
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_MI * a.sqrt().atan2((1.0 - a).sqrt())
}

// ==== Local planar projection ====
// Latitude-aware scaling between miles and degrees, good enough for
// corridor widths of tens of miles.

/// Miles per degree of latitude at a given latitude (WGS84 approximation).
pub fn miles_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    let meters = 111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos();
    meters * MILES_PER_METER
}

/// Miles per degree of longitude at a given latitude (WGS84 approximation).
pub fn miles_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    let meters =
        111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos();
    meters * MILES_PER_METER
}

/// Minimum distance from a point to a line segment, in miles.
///
/// Projects into a local plane anchored at the segment start, so it is only
/// meaningful for segments and offsets well below a few hundred miles.
pub fn distance_to_segment_miles(
    point_lat: f64,
    point_lon: f64,
    seg_start_lat: f64,
    seg_start_lon: f64,
    seg_end_lat: f64,
    seg_end_lon: f64,
) -> f64 {
    let ref_lat = seg_start_lat;
    let lat_scale = miles_per_deg_lat(ref_lat);
    let lon_scale = miles_per_deg_lon(ref_lat);

    let px = (point_lon - seg_start_lon) * lon_scale;
    let py = (point_lat - seg_start_lat) * lat_scale;

    let sx = (seg_end_lon - seg_start_lon) * lon_scale;
    let sy = (seg_end_lat - seg_start_lat) * lat_scale;

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 1e-12 {
        return haversine_miles(point_lat, point_lon, seg_start_lat, seg_start_lon);
    }

    // t = ((P-A) · (B-A)) / |B-A|²
    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);

    let dx = px - t * sx;
    let dy = py - t * sy;
    (dx * dx + dy * dy).sqrt()
}

/// Minimum distance from a point to a polyline given as `[lng, lat]` pairs.
///
/// Returns `None` for an empty polyline.
pub fn distance_to_polyline_miles(lat: f64, lng: f64, coordinates: &[[f64; 2]]) -> Option<f64> {
    match coordinates {
        [] => None,
        [only] => Some(haversine_miles(lat, lng, only[1], only[0])),
        _ => coordinates
            .windows(2)
            .map(|pair| {
                let [a_lng, a_lat] = pair[0];
                let [b_lng, b_lat] = pair[1];
                distance_to_segment_miles(lat, lng, a_lat, a_lng, b_lat, b_lng)
            })
            .min_by(f64::total_cmp),
    }
}

/// Planar segment intersection test, including touches and collinear overlap.
pub(crate) fn segments_intersect_2d(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> bool {
    // Works in degrees here; the tolerance only absorbs arithmetic noise.
    const EPS: f64 = 1e-12;

    fn orient(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
        (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
    }

    fn within(a: f64, b: f64, value: f64) -> bool {
        let min = a.min(b) - EPS;
        let max = a.max(b) + EPS;
        value >= min && value <= max
    }

    fn on_segment(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
        within(p.0, q.0, r.0) && within(p.1, q.1, r.1)
    }

    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1.abs() <= EPS && on_segment(a1, a2, b1) {
        return true;
    }
    if o2.abs() <= EPS && on_segment(a1, a2, b2) {
        return true;
    }
    if o3.abs() <= EPS && on_segment(b1, b2, a1) {
        return true;
    }
    if o4.abs() <= EPS && on_segment(b1, b2, a2) {
        return true;
    }

    let a_crosses = (o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS);
    let b_crosses = (o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS);
    a_crosses && b_crosses
}
