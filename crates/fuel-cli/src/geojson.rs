//! GeoJSON inputs: region boundaries and route lines.

use anyhow::{anyhow, bail, Context, Result};
use fuel_core::regions::Polygon;
use fuel_core::{Region, RouteGeometry};
use serde_json::Value;

/// Regions accepted from a feature collection.
#[derive(Debug, Default)]
pub struct RegionImport {
    pub regions: Vec<Region>,
    /// Features without a usable code, name or polygon geometry
    pub skipped: usize,
}

/// Read region boundaries from a feature collection. Each feature needs
/// `properties.state_code` (two letters), `properties.name` and Polygon or
/// MultiPolygon geometry.
pub fn regions_from_geojson(data: &Value) -> Result<RegionImport> {
    let features = data
        .get("features")
        .and_then(Value::as_array)
        .filter(|features| !features.is_empty())
        .ok_or_else(|| anyhow!("No features found in GeoJSON"))?;

    let mut import = RegionImport::default();
    for feature in features {
        match region_from_feature(feature) {
            Some(region) => import.regions.push(region),
            None => import.skipped += 1,
        }
    }
    Ok(import)
}

fn region_from_feature(feature: &Value) -> Option<Region> {
    let props = feature.get("properties")?;
    let code = props.get("state_code")?.as_str()?.trim().to_ascii_uppercase();
    let name = props.get("name")?.as_str()?.trim().to_string();
    let polygons = polygons_from_geometry(feature.get("geometry")?)?;

    let region = Region::new(code, name, polygons);
    if !region.validate().is_empty() {
        return None;
    }
    Some(region)
}

/// Polygon is promoted to a one-member multi-polygon; other types yield `None`.
fn polygons_from_geometry(geometry: &Value) -> Option<Vec<Polygon>> {
    let coordinates = geometry.get("coordinates")?.clone();
    match geometry.get("type")?.as_str()? {
        "Polygon" => serde_json::from_value::<Polygon>(coordinates)
            .ok()
            .map(|polygon| vec![polygon]),
        "MultiPolygon" => serde_json::from_value::<Vec<Polygon>>(coordinates).ok(),
        _ => None,
    }
}

/// Extract a route line from a bare geometry, a Feature or a
/// FeatureCollection (the first line feature wins). A MultiLineString is
/// joined into one line.
pub fn route_geometry_from_geojson(data: &Value) -> Result<RouteGeometry> {
    match data.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = data
                .get("features")
                .and_then(Value::as_array)
                .context("FeatureCollection has no features")?;
            features
                .iter()
                .find_map(|feature| route_geometry_from_geojson(feature).ok())
                .context("no LineString feature found")
        }
        Some("Feature") => {
            route_geometry_from_geojson(data.get("geometry").context("Feature has no geometry")?)
        }
        Some("LineString") => {
            let coordinates: Vec<[f64; 2]> = line_coordinates(data)?;
            Ok(RouteGeometry::new(coordinates))
        }
        Some("MultiLineString") => {
            let lines: Vec<Vec<[f64; 2]>> = serde_json::from_value(
                data.get("coordinates").cloned().unwrap_or(Value::Null),
            )
            .context("MultiLineString coordinates are malformed")?;
            let mut joined: Vec<[f64; 2]> = Vec::new();
            for point in lines.into_iter().flatten() {
                if joined.last() != Some(&point) {
                    joined.push(point);
                }
            }
            Ok(RouteGeometry::new(joined))
        }
        Some(other) => bail!("unsupported GeoJSON type '{}'", other),
        None => bail!("GeoJSON object has no type"),
    }
}

fn line_coordinates(geometry: &Value) -> Result<Vec<[f64; 2]>> {
    // Positions may carry elevation; only lng/lat are kept.
    let positions: Vec<Vec<f64>> = serde_json::from_value(
        geometry.get("coordinates").cloned().unwrap_or(Value::Null),
    )
    .context("LineString coordinates are malformed")?;
    positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [lng, lat, ..] => Ok([*lng, *lat]),
            _ => Err(anyhow!("position needs at least two numbers")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(lng: f64, lat: f64) -> Value {
        json!([[[lng, lat], [lng + 1.0, lat], [lng + 1.0, lat + 1.0], [lng, lat + 1.0], [lng, lat]]])
    }

    #[test]
    fn polygon_and_multipolygon_features_load() {
        let data = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "state_code": "ks", "name": "Kansas" },
                    "geometry": { "type": "Polygon", "coordinates": square(-99.0, 38.0) }
                },
                {
                    "type": "Feature",
                    "properties": { "state_code": "HI", "name": "Hawaii" },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [square(-156.0, 20.0), square(-158.0, 21.0)]
                    }
                }
            ]
        });

        let import = regions_from_geojson(&data).unwrap();
        assert_eq!(import.skipped, 0);
        assert_eq!(import.regions.len(), 2);
        assert_eq!(import.regions[0].code, "KS");
        assert!(import.regions[0].contains_point(38.5, -98.5));
        assert_eq!(import.regions[1].polygons().len(), 2);
    }

    #[test]
    fn unusable_features_are_skipped() {
        let data = json!({
            "features": [
                {
                    "properties": { "state_code": "Kansas", "name": "Kansas" },
                    "geometry": { "type": "Polygon", "coordinates": square(-99.0, 38.0) }
                },
                {
                    "properties": { "state_code": "CO", "name": "" },
                    "geometry": { "type": "Polygon", "coordinates": square(-105.0, 39.0) }
                },
                {
                    "properties": { "state_code": "NE", "name": "Nebraska" },
                    "geometry": { "type": "Point", "coordinates": [-99.0, 41.0] }
                },
                { "properties": { "state_code": "IA", "name": "Iowa" } }
            ]
        });

        let import = regions_from_geojson(&data).unwrap();
        assert!(import.regions.is_empty());
        assert_eq!(import.skipped, 4);
    }

    #[test]
    fn empty_collection_is_an_error() {
        assert!(regions_from_geojson(&json!({ "type": "FeatureCollection", "features": [] })).is_err());
    }

    #[test]
    fn route_lines_are_found_in_any_wrapper() {
        let line = json!({ "type": "LineString", "coordinates": [[-100.0, 30.0, 250.0], [-100.0, 31.0]] });
        let bare = route_geometry_from_geojson(&line).unwrap();
        assert_eq!(bare.coordinates, vec![[-100.0, 30.0], [-100.0, 31.0]]);

        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [-100.0, 30.0] } },
                { "type": "Feature", "geometry": line }
            ]
        });
        assert_eq!(route_geometry_from_geojson(&collection).unwrap(), bare);
    }

    #[test]
    fn multilinestring_parts_are_joined() {
        let data = json!({
            "type": "MultiLineString",
            "coordinates": [[[-100.0, 30.0], [-100.0, 31.0]], [[-100.0, 31.0], [-100.0, 32.0]]]
        });
        let geometry = route_geometry_from_geojson(&data).unwrap();
        assert_eq!(geometry.len(), 3);
        assert_eq!(geometry.kind.as_deref(), Some("LineString"));
    }

    #[test]
    fn unsupported_inputs_are_rejected() {
        assert!(route_geometry_from_geojson(&json!({ "type": "Point", "coordinates": [0.0, 0.0] })).is_err());
        assert!(route_geometry_from_geojson(&json!({ "coordinates": [] })).is_err());
    }
}
