use geojson::{Geometry, Value};
use serde::{Deserialize, Serialize};

/// A geographic position in degrees. In pixel-space maps `lat` is the row
/// axis and `lng` the column axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a GeoJSON position (`[lon, lat, ...]`).
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lng, lat, ..] if lat.is_finite() && lng.is_finite() => Some(Self::new(*lat, *lng)),
            _ => None,
        }
    }
}

/// Axis-aligned bounds in latitude/longitude, always normalized so that
/// `south <= north` and `west <= east`.
///
/// Deserializes from the backend's `[[lat, lon], [lat, lon]]` corner pair in
/// either corner order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 2]", into = "[[f64; 2]; 2]")]
pub struct LatLngBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl From<[[f64; 2]; 2]> for LatLngBounds {
    fn from(corners: [[f64; 2]; 2]) -> Self {
        Self::from_corners(
            LatLng::new(corners[0][0], corners[0][1]),
            LatLng::new(corners[1][0], corners[1][1]),
        )
    }
}

impl From<LatLngBounds> for [[f64; 2]; 2] {
    fn from(bounds: LatLngBounds) -> Self {
        [[bounds.south, bounds.west], [bounds.north, bounds.east]]
    }
}

impl LatLngBounds {
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south: a.lat.min(b.lat),
            west: a.lng.min(b.lng),
            north: a.lat.max(b.lat),
            east: a.lng.max(b.lng),
        }
    }

    pub fn from_point(p: LatLng) -> Self {
        Self::from_corners(p, p)
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::new(self.south, self.west)
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::new(self.north, self.east)
    }

    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north, self.west)
    }

    pub fn south_east(&self) -> LatLng {
        LatLng::new(self.south, self.east)
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south = self.south.min(p.lat);
        self.west = self.west.min(p.lng);
        self.north = self.north.max(p.lat);
        self.east = self.east.max(p.lng);
    }
}

/// Bounds of a raster in pixel space: `[[0, 0], [height, width]]`.
///
/// Kept distinct from [`LatLngBounds`]: the RGB comparison map has no
/// geo-reference and its coordinates must never be mixed with geographic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub width: u32,
    pub height: u32,
}

impl PixelBounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Map the pixel extent onto the simple-CRS plane (row → lat, column → lng).
    pub fn as_plane_bounds(&self) -> LatLngBounds {
        LatLngBounds::from_corners(
            LatLng::new(0.0, 0.0),
            LatLng::new(self.height as f64, self.width as f64),
        )
    }
}

/// One drawable shape: a single polygon (outer ring plus holes) or a single
/// line string.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoShape {
    pub rings: Vec<Vec<LatLng>>,
    pub closed: bool,
}

fn ring(positions: &[Vec<f64>]) -> Vec<LatLng> {
    positions
        .iter()
        .filter_map(|p| LatLng::from_position(p))
        .collect()
}

/// Flatten a GeoJSON geometry into drawable shapes. Points are skipped.
pub fn geometry_shapes(geometry: &Geometry) -> Vec<GeoShape> {
    let mut out = Vec::new();
    collect_shapes(&geometry.value, &mut out);
    out
}

fn collect_shapes(value: &Value, out: &mut Vec<GeoShape>) {
    match value {
        Value::Point(_) | Value::MultiPoint(_) => {}
        Value::LineString(line) => out.push(GeoShape {
            rings: vec![ring(line)],
            closed: false,
        }),
        Value::MultiLineString(lines) => {
            for line in lines {
                out.push(GeoShape {
                    rings: vec![ring(line)],
                    closed: false,
                });
            }
        }
        Value::Polygon(rings) => out.push(GeoShape {
            rings: rings.iter().map(|r| ring(r)).collect(),
            closed: true,
        }),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.push(GeoShape {
                    rings: rings.iter().map(|r| ring(r)).collect(),
                    closed: true,
                });
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_shapes(&g.value, out);
            }
        }
    }
}

/// Bounding box of every coordinate in a geometry, or `None` if it has none.
pub fn geometry_bounds(geometry: &Geometry) -> Option<LatLngBounds> {
    let mut bounds: Option<LatLngBounds> = None;
    visit_positions(&geometry.value, &mut |p| {
        if let Some(b) = bounds.as_mut() {
            b.extend(p);
        } else {
            bounds = Some(LatLngBounds::from_point(p));
        }
    });
    bounds
}

fn visit_line(positions: &[Vec<f64>], f: &mut impl FnMut(LatLng)) {
    for p in positions.iter().filter_map(|p| LatLng::from_position(p)) {
        f(p);
    }
}

fn visit_positions(value: &Value, f: &mut impl FnMut(LatLng)) {
    match value {
        Value::Point(p) => {
            if let Some(p) = LatLng::from_position(p) {
                f(p);
            }
        }
        Value::MultiPoint(points) | Value::LineString(points) => visit_line(points, f),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines {
                visit_line(line, &mut *f);
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                for r in rings {
                    visit_line(r, &mut *f);
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                visit_positions(&g.value, &mut *f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lng0: f64, lat0: f64, size: f64) -> Geometry {
        Geometry::new(Value::Polygon(vec![vec![
            vec![lng0, lat0],
            vec![lng0 + size, lat0],
            vec![lng0 + size, lat0 + size],
            vec![lng0, lat0 + size],
            vec![lng0, lat0],
        ]]))
    }

    #[test]
    fn bounds_deserialize_in_either_corner_order() {
        let a: LatLngBounds = serde_json::from_str("[[26.5, 75.1], [26.9, 75.6]]").unwrap();
        let b: LatLngBounds = serde_json::from_str("[[26.9, 75.6], [26.5, 75.1]]").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.south, 26.5);
        assert_eq!(a.east, 75.6);
    }

    #[test]
    fn bounds_contains_is_inclusive() {
        let b = LatLngBounds::from_corners(LatLng::new(0.0, 0.0), LatLng::new(1.0, 2.0));
        assert!(b.contains(LatLng::new(0.0, 0.0)));
        assert!(b.contains(LatLng::new(1.0, 2.0)));
        assert!(b.contains(LatLng::new(0.5, 1.0)));
        assert!(!b.contains(LatLng::new(1.01, 1.0)));
        assert!(!b.contains(LatLng::new(0.5, -0.01)));
    }

    #[test]
    fn geometry_bounds_of_polygon_swaps_lon_lat() {
        let b = geometry_bounds(&square(75.0, 26.0, 0.01)).unwrap();
        assert_eq!(b.south, 26.0);
        assert_eq!(b.west, 75.0);
        assert!((b.north - 26.01).abs() < 1e-12);
        assert!((b.center().lng - 75.005).abs() < 1e-12);
    }

    #[test]
    fn geometry_bounds_of_multipolygon_spans_parts() {
        let g = Geometry::new(Value::MultiPolygon(vec![
            vec![vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]]],
            vec![vec![vec![5.0, 5.0], vec![6.0, 5.0], vec![6.0, 7.0], vec![5.0, 5.0]]],
        ]));
        let b = geometry_bounds(&g).unwrap();
        assert_eq!((b.south, b.west, b.north, b.east), (0.0, 0.0, 7.0, 6.0));
        assert_eq!(geometry_shapes(&g).len(), 2);
    }

    #[test]
    fn empty_geometry_has_no_bounds() {
        let g = Geometry::new(Value::GeometryCollection(Vec::new()));
        assert!(geometry_bounds(&g).is_none());
    }

    #[test]
    fn pixel_bounds_map_rows_to_lat() {
        let b = PixelBounds::new(640, 480).as_plane_bounds();
        assert_eq!(b.south_west(), LatLng::new(0.0, 0.0));
        assert_eq!(b.north_east(), LatLng::new(480.0, 640.0));
    }
}
