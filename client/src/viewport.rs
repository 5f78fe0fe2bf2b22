use std::f64::consts::PI;

use rabi_shared::{LatLng, LatLngBounds};

/// Side of one map tile, and the width of the whole Web Mercator world at zoom 0.
pub const TILE_SIZE: f64 = 256.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_6;

/// How positions are laid onto the screen plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Spherical Web Mercator in 256-px tiles (geographic maps).
    WebMercator,
    /// Identity plane, `x = lng`, `y = -lat` (pixel-space rasters).
    Simple,
}

impl Projection {
    /// Position in world pixels at `zoom`.
    pub fn project(self, p: LatLng, zoom: f64) -> (f64, f64) {
        let scale = zoom.exp2();
        match self {
            Projection::WebMercator => {
                let world = TILE_SIZE * scale;
                let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
                let x = (p.lng + 180.0) / 360.0;
                let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
                (x * world, y * world)
            }
            Projection::Simple => (p.lng * scale, -p.lat * scale),
        }
    }

    pub fn unproject(self, (x, y): (f64, f64), zoom: f64) -> LatLng {
        let scale = zoom.exp2();
        match self {
            Projection::WebMercator => {
                let world = TILE_SIZE * scale;
                let n = PI - 2.0 * PI * y / world;
                LatLng::new(n.sinh().atan().to_degrees(), x / world * 360.0 - 180.0)
            }
            Projection::Simple => LatLng::new(-y / scale, x / scale),
        }
    }
}

/// Pan/zoom state of one map. Zoom moves in whole steps, so every change of
/// `zoom` is one discrete zoom-end for listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct MapViewport {
    pub projection: Projection,
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl MapViewport {
    pub fn geographic(center: LatLng, zoom: f64) -> Self {
        Self {
            projection: Projection::WebMercator,
            center,
            zoom: zoom.round().clamp(0.0, 19.0),
            min_zoom: 0.0,
            max_zoom: 19.0,
            width: 800.0,
            height: 600.0,
        }
    }

    pub fn pixel_plane() -> Self {
        Self {
            projection: Projection::Simple,
            center: LatLng::new(0.0, 0.0),
            zoom: 0.0,
            min_zoom: -5.0,
            max_zoom: 5.0,
            width: 800.0,
            height: 600.0,
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.width = width;
            self.height = height;
        }
    }

    /// World-pixel position of the screen's top-left corner.
    pub fn pixel_origin(&self) -> (f64, f64) {
        let (cx, cy) = self.projection.project(self.center, self.zoom);
        (cx - self.width / 2.0, cy - self.height / 2.0)
    }

    pub fn latlng_to_screen(&self, p: LatLng) -> (f64, f64) {
        let (x, y) = self.projection.project(p, self.zoom);
        let (ox, oy) = self.pixel_origin();
        (x - ox, y - oy)
    }

    pub fn screen_to_latlng(&self, sx: f64, sy: f64) -> LatLng {
        let (ox, oy) = self.pixel_origin();
        self.projection.unproject((ox + sx, oy + sy), self.zoom)
    }

    /// Drag the map content by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = self.projection.project(self.center, self.zoom);
        self.center = self.projection.unproject((cx - dx, cy - dy), self.zoom);
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.round().clamp(self.min_zoom, self.max_zoom)
    }

    /// Returns `true` if the zoom level changed.
    pub fn set_view(&mut self, center: LatLng, zoom: f64) -> bool {
        let zoom = self.clamp_zoom(zoom);
        let changed = zoom != self.zoom;
        self.center = center;
        self.zoom = zoom;
        changed
    }

    /// Zoom so the position under `(sx, sy)` stays fixed on screen.
    /// Returns `true` if the zoom level changed.
    pub fn zoom_around(&mut self, zoom: f64, sx: f64, sy: f64) -> bool {
        let zoom = self.clamp_zoom(zoom);
        if zoom == self.zoom {
            return false;
        }
        let anchor = self.screen_to_latlng(sx, sy);
        let (ax, ay) = self.projection.project(anchor, zoom);
        let center_px = (
            ax - (sx - self.width / 2.0),
            ay - (sy - self.height / 2.0),
        );
        self.zoom = zoom;
        self.center = self.projection.unproject(center_px, zoom);
        true
    }

    /// Step the zoom by whole levels around a screen point.
    pub fn zoom_step(&mut self, steps: i32, sx: f64, sy: f64) -> bool {
        self.zoom_around(self.zoom + steps as f64, sx, sy)
    }

    /// Largest whole zoom at which `bounds` fits inside the viewport.
    pub fn bounds_zoom(&self, bounds: &LatLngBounds) -> f64 {
        let (x0, y0) = self.projection.project(bounds.north_west(), self.zoom);
        let (x1, y1) = self.projection.project(bounds.south_east(), self.zoom);
        let scale = (self.width / (x1 - x0).abs()).min(self.height / (y1 - y0).abs());
        if scale.is_nan() {
            return self.zoom;
        }
        // Round to hundredths first so float noise cannot drop a whole level.
        let zoom = ((self.zoom + scale.log2()) * 100.0).round() / 100.0;
        zoom.floor().clamp(self.min_zoom, self.max_zoom)
    }

    /// Center on `bounds` at the largest zoom that shows all of it.
    /// Returns `true` if the zoom level changed.
    pub fn fit_bounds(&mut self, bounds: &LatLngBounds) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        let zoom = self.bounds_zoom(bounds);
        let (x0, y0) = self.projection.project(bounds.north_west(), zoom);
        let (x1, y1) = self.projection.project(bounds.south_east(), zoom);
        let center = self
            .projection
            .unproject(((x0 + x1) / 2.0, (y0 + y1) / 2.0), zoom);
        self.set_view(center, zoom)
    }
}
