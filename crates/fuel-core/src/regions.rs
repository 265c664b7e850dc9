//! Administrative region boundaries used as pricing keys.

use crate::models::RouteGeometry;
use crate::resolver::{RegionDirectory, ResolverError};
use crate::spatial::segments_intersect_2d;
use serde::{Deserialize, Serialize};

/// A closed ring of `[lng, lat]` vertices.
pub type Ring = Vec<[f64; 2]>;

/// One polygon: the outer ring followed by any holes.
pub type Polygon = Vec<Ring>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundingBox {
    min_lng: f64,
    min_lat: f64,
    max_lng: f64,
    max_lat: f64,
}

impl BoundingBox {
    fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 2]>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox {
            min_lng: first[0],
            min_lat: first[1],
            max_lng: first[0],
            max_lat: first[1],
        };
        for p in iter {
            bbox.min_lng = bbox.min_lng.min(p[0]);
            bbox.min_lat = bbox.min_lat.min(p[1]);
            bbox.max_lng = bbox.max_lng.max(p[0]);
            bbox.max_lat = bbox.max_lat.max(p[1]);
        }
        Some(bbox)
    }

    fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }

    fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min_lng <= other.max_lng
            && other.min_lng <= self.max_lng
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

/// A state/province boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub code: String,
    pub name: String,
    polygons: Vec<Polygon>,
    #[serde(skip)]
    bbox: Option<BoundingBox>,
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.name == other.name && self.polygons == other.polygons
    }
}

impl Region {
    pub fn new(code: impl Into<String>, name: impl Into<String>, polygons: Vec<Polygon>) -> Self {
        let bbox = BoundingBox::from_points(polygons.iter().filter_map(|p| p.first()).flatten());
        Self {
            code: code.into().trim().to_uppercase(),
            name: name.into(),
            polygons,
            bbox,
        }
    }

    /// Convenience constructor for an axis-aligned box.
    pub fn rectangle(
        code: impl Into<String>,
        name: impl Into<String>,
        min_lat: f64,
        min_lng: f64,
        max_lat: f64,
        max_lng: f64,
    ) -> Self {
        let ring = vec![
            [min_lng, min_lat],
            [max_lng, min_lat],
            [max_lng, max_lat],
            [min_lng, max_lat],
            [min_lng, min_lat],
        ];
        Self::new(code, name, vec![vec![ring]])
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox
            .or_else(|| BoundingBox::from_points(self.polygons.iter().filter_map(|p| p.first()).flatten()))
    }

    /// Check if a point is inside the region (outer rings minus holes).
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        if !self.bounding_box().is_some_and(|b| b.contains(lat, lng)) {
            return false;
        }
        self.polygons.iter().any(|polygon| {
            let Some((outer, holes)) = polygon.split_first() else {
                return false;
            };
            ring_contains(outer, lat, lng) && !holes.iter().any(|h| ring_contains(h, lat, lng))
        })
    }

    /// Check if a route segment touches this region.
    pub fn intersects_segment(&self, lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> bool {
        if self.contains_point(lat1, lng1) || self.contains_point(lat2, lng2) {
            return true;
        }
        let a1 = (lng1, lat1);
        let a2 = (lng2, lat2);
        self.polygons.iter().flatten().any(|ring| {
            ring.windows(2)
                .any(|edge| segments_intersect_2d(a1, a2, (edge[0][0], edge[0][1]), (edge[1][0], edge[1][1])))
        })
    }

    /// Validate region configuration.
    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.code.len() != 2 || !self.code.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(format!("Region code '{}' must be two letters", self.code));
        }
        if self.name.trim().is_empty() {
            errors.push("Region name is empty".to_string());
        }
        if self.polygons.is_empty() {
            errors.push("Region has no polygons".to_string());
        }
        for ring in self.polygons.iter().flatten() {
            if ring.len() < 4 {
                errors.push("Ring must have at least 4 vertices".to_string());
                break;
            }
        }
        errors
    }
}

/// Ray casting over a `[lng, lat]` ring.
fn ring_contains(ring: &[[f64; 2]], lat: f64, lng: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let xi = ring[i][0];
        let yi = ring[i][1];
        let xj = ring[j][0];
        let yj = ring[j][1];

        if ((yi > lat) != (yj > lat)) && (lng < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// In-memory set of region boundaries.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    regions: Vec<Region>,
}

impl RegionIndex {
    pub fn new(mut regions: Vec<Region>) -> Self {
        regions.sort_by(|a, b| a.code.cmp(&b.code));
        regions.dedup_by(|a, b| a.code == b.code);
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Codes of every region the polyline touches, sorted.
    pub fn codes_for_route(&self, coordinates: &[[f64; 2]]) -> Vec<String> {
        if coordinates.len() < 2 {
            return Vec::new();
        }
        let Some(route_box) = BoundingBox::from_points(coordinates) else {
            return Vec::new();
        };

        self.regions
            .iter()
            .filter(|region| {
                let Some(region_box) = region.bounding_box() else {
                    return false;
                };
                if !region_box.overlaps(&route_box) {
                    return false;
                }
                coordinates.windows(2).any(|pair| {
                    let [lng1, lat1] = pair[0];
                    let [lng2, lat2] = pair[1];
                    let seg_box = BoundingBox {
                        min_lng: lng1.min(lng2),
                        min_lat: lat1.min(lat2),
                        max_lng: lng1.max(lng2),
                        max_lat: lat1.max(lat2),
                    };
                    seg_box.overlaps(&region_box) && region.intersects_segment(lat1, lng1, lat2, lng2)
                })
            })
            .map(|region| region.code.clone())
            .collect()
    }

    /// Code of the first region containing the point.
    pub fn code_for_point(&self, lat: f64, lng: f64) -> Option<String> {
        self.regions
            .iter()
            .find(|region| region.contains_point(lat, lng))
            .map(|region| region.code.clone())
    }
}

impl RegionDirectory for RegionIndex {
    fn regions_for_route(&self, geometry: &RouteGeometry) -> Result<Vec<String>, ResolverError> {
        Ok(self.codes_for_route(&geometry.coordinates))
    }

    fn region_for_point(&self, lat: f64, lng: f64) -> Result<Option<String>, ResolverError> {
        Ok(self.code_for_point(lat, lng))
    }
}
