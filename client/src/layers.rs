//! Layers drawn on a map, and the single-occupancy slots that own them.

use rabi_shared::{GeoShape, LatLng, LatLngBounds, crop_color};

use crate::labels::LabelLayer;
use crate::popup::Popup;
use crate::viewport::MapViewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

/// Raster drawn stretched over `bounds`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlay {
    pub src: String,
    pub bounds: LatLngBounds,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub color: String,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorStyle {
    pub stroke: String,
    pub weight: f64,
    pub fill: Option<Fill>,
}

impl VectorStyle {
    /// Thin grey parcel outlines without fill.
    pub fn cadastral() -> Self {
        Self {
            stroke: "#555".to_string(),
            weight: 1.0,
            fill: None,
        }
    }

    /// Selected parcel, tinted with its crop color.
    pub fn highlight(crop: Option<&str>) -> Self {
        let color = crop.map_or(rabi_shared::crop::UNKNOWN_CROP_COLOR, crop_color);
        Self {
            stroke: color.to_string(),
            weight: 1.0,
            fill: Some(Fill {
                color: color.to_string(),
                opacity: 0.5,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub shapes: Vec<GeoShape>,
    pub style: VectorStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Image(ImageOverlay),
    Vector(VectorLayer),
    Labels(LabelLayer),
}

/// Ordered set of layers currently attached to one map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapLayers {
    next_id: u64,
    entries: Vec<(LayerId, Layer)>,
}

impl MapLayers {
    pub fn add(&mut self, layer: Layer) -> LayerId {
        self.next_id += 1;
        let id = LayerId(self.next_id);
        self.entries.push((id, layer));
        id
    }

    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let idx = self.entries.iter().position(|(lid, _)| *lid == id)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.entries.iter().any(|(lid, _)| *lid == id)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.entries
            .iter()
            .find(|(lid, _)| *lid == id)
            .map(|(_, layer)| layer)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.entries
            .iter_mut()
            .find(|(lid, _)| *lid == id)
            .map(|(_, layer)| layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.entries.iter().map(|(_, layer)| layer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn image_sources(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|layer| match layer {
            Layer::Image(img) => Some(img.src.as_str()),
            _ => None,
        })
    }
}

/// Holds at most one layer on a map. Setting a new layer always removes the
/// previous one first, so a slot never leaves two of its layers attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlaySlot {
    current: Option<LayerId>,
}

impl OverlaySlot {
    /// Replace the slot's layer, returning the one it displaced.
    pub fn set(&mut self, layers: &mut MapLayers, layer: Layer) -> Option<Layer> {
        let previous = self.clear(layers);
        self.current = Some(layers.add(layer));
        previous
    }

    pub fn clear(&mut self, layers: &mut MapLayers) -> Option<Layer> {
        self.current.take().and_then(|id| layers.remove(id))
    }

    pub fn current(&self) -> Option<LayerId> {
        self.current
    }

    pub fn get<'a>(&self, layers: &'a MapLayers) -> Option<&'a Layer> {
        self.current.and_then(|id| layers.get(id))
    }

    pub fn image<'a>(&self, layers: &'a MapLayers) -> Option<&'a ImageOverlay> {
        match self.get(layers)? {
            Layer::Image(img) => Some(img),
            _ => None,
        }
    }
}

/// Everything one map widget renders.
#[derive(Debug, Clone, PartialEq)]
pub struct MapState {
    pub viewport: MapViewport,
    pub layers: MapLayers,
    pub popup: Option<Popup>,
    pub base_tiles: bool,
}

impl MapState {
    /// Map over OpenStreetMap tiles.
    pub fn geographic(center: LatLng, zoom: f64) -> Self {
        Self {
            viewport: MapViewport::geographic(center, zoom),
            layers: MapLayers::default(),
            popup: None,
            base_tiles: true,
        }
    }

    /// Map in raster pixel space, no base tiles.
    pub fn pixel_plane() -> Self {
        Self {
            viewport: MapViewport::pixel_plane(),
            layers: MapLayers::default(),
            popup: None,
            base_tiles: false,
        }
    }

    pub fn open_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(src: &str) -> Layer {
        Layer::Image(ImageOverlay {
            src: src.to_string(),
            bounds: LatLngBounds::from_point(LatLng::new(26.9, 75.8)),
            opacity: 1.0,
        })
    }

    #[test]
    fn setting_slot_twice_leaves_one_layer() {
        let mut layers = MapLayers::default();
        let mut slot = OverlaySlot::default();

        assert!(slot.set(&mut layers, image("a.png")).is_none());
        let displaced = slot.set(&mut layers, image("b.png"));

        assert_eq!(displaced, Some(image("a.png")));
        assert_eq!(layers.len(), 1);
        assert_eq!(slot.get(&layers), Some(&image("b.png")));
    }

    #[test]
    fn slots_do_not_disturb_each_other() {
        let mut layers = MapLayers::default();
        let mut ndvi = OverlaySlot::default();
        let mut outline = OverlaySlot::default();

        ndvi.set(&mut layers, image("ndvi.png"));
        outline.set(
            &mut layers,
            Layer::Vector(VectorLayer {
                shapes: Vec::new(),
                style: VectorStyle::cadastral(),
            }),
        );
        ndvi.set(&mut layers, image("ndvi2.png"));

        assert_eq!(layers.len(), 2);
        assert!(layers.contains(outline.current().unwrap()));
        assert_eq!(ndvi.image(&layers).map(|i| i.src.as_str()), Some("ndvi2.png"));
        assert_eq!(layers.image_sources().collect::<Vec<_>>(), vec!["ndvi2.png"]);
    }

    #[test]
    fn clearing_empty_slot_is_noop() {
        let mut layers = MapLayers::default();
        let mut slot = OverlaySlot::default();
        assert!(slot.clear(&mut layers).is_none());
        assert!(layers.is_empty());
    }

    #[test]
    fn highlight_uses_crop_color() {
        let style = VectorStyle::highlight(Some("सरसों"));
        assert_eq!(style.stroke, "#e41a1c");
        assert_eq!(style.fill.as_ref().map(|f| f.opacity), Some(0.5));
        assert_eq!(VectorStyle::highlight(None).stroke, "#000");
        assert_eq!(VectorStyle::highlight(Some("जौ")).stroke, "#000");
    }
}
