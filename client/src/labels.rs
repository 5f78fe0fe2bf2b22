//! Parcel-number labels: built once from the cadastral payload, attached to
//! the map only while the user has them switched on.

use geojson::FeatureCollection;
use rabi_shared::api::khasra_text;
use rabi_shared::geo::geometry_bounds;
use rabi_shared::{LatLng, label_font_size};

use crate::layers::{Layer, LayerId, MapState};

#[derive(Debug, Clone, PartialEq)]
pub struct ParcelLabel {
    pub anchor: LatLng,
    pub text: String,
}

/// Per-label presentation. Labels too small to read are hidden in place
/// rather than removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    pub visible: bool,
    pub font_px: f64,
}

impl LabelStyle {
    const HIDDEN: LabelStyle = LabelStyle {
        visible: false,
        font_px: 0.0,
    };

    fn at_zoom(zoom: f64) -> Self {
        let font_px = label_font_size(zoom);
        LabelStyle {
            visible: font_px > 0.0,
            font_px,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelLayer {
    labels: Vec<ParcelLabel>,
    styles: Vec<LabelStyle>,
}

impl LabelLayer {
    /// One label per feature, at the center of its bounding box. Features
    /// without geometry or parcel number are skipped.
    pub fn from_features(collection: &FeatureCollection) -> Self {
        let labels: Vec<ParcelLabel> = collection
            .features
            .iter()
            .filter_map(|feature| {
                let anchor = geometry_bounds(feature.geometry.as_ref()?)?.center();
                let text = khasra_text(feature.property("khasra_no")?)?;
                Some(ParcelLabel { anchor, text })
            })
            .collect();
        let styles = vec![LabelStyle::HIDDEN; labels.len()];
        Self { labels, styles }
    }

    pub fn restyle(&mut self, zoom: f64) {
        let style = LabelStyle::at_zoom(zoom);
        self.styles.fill(style);
    }

    pub fn styles(&self) -> &[LabelStyle] {
        &self.styles
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParcelLabel, LabelStyle)> {
        self.labels.iter().zip(self.styles.iter().copied())
    }
}

/// Hidden/Visible state machine for the label layer. While hidden the layer
/// is held here, detached from the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelController {
    visible: bool,
    attached: Option<LayerId>,
    detached: Option<LabelLayer>,
}

impl LabelController {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_attached(&self, map: &MapState) -> bool {
        self.attached.is_some_and(|id| map.layers.contains(id))
    }

    /// Take ownership of freshly built labels, attaching them at once if the
    /// user switched labels on before they arrived.
    pub fn install(&mut self, labels: LabelLayer, map: &mut MapState) {
        if let Some(id) = self.attached.take() {
            map.layers.remove(id);
        }
        self.detached = Some(labels);
        if self.visible {
            self.attach(map);
        }
    }

    /// Flip visibility; returns the new state.
    pub fn toggle(&mut self, map: &mut MapState) -> bool {
        self.visible = !self.visible;
        if self.visible {
            self.attach(map);
        } else {
            self.detach(map);
        }
        self.visible
    }

    pub fn on_zoom_end(&mut self, map: &mut MapState) {
        if !self.visible {
            return;
        }
        let zoom = map.viewport.zoom;
        if let Some(Layer::Labels(layer)) = self.attached.and_then(|id| map.layers.get_mut(id)) {
            layer.restyle(zoom);
        }
    }

    fn attach(&mut self, map: &mut MapState) {
        let Some(mut layer) = self.detached.take() else {
            return;
        };
        layer.restyle(map.viewport.zoom);
        self.attached = Some(map.layers.add(Layer::Labels(layer)));
    }

    fn detach(&mut self, map: &mut MapState) {
        let Some(id) = self.attached.take() else {
            return;
        };
        if let Some(Layer::Labels(layer)) = map.layers.remove(id) {
            self.detached = Some(layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> FeatureCollection {
        serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"khasra_no": "101"},
                    "geometry": {"type": "Polygon", "coordinates": [[[75.0, 26.0], [75.002, 26.0], [75.002, 26.002], [75.0, 26.002], [75.0, 26.0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"khasra_no": 102},
                    "geometry": {"type": "Polygon", "coordinates": [[[75.01, 26.0], [75.012, 26.0], [75.012, 26.002], [75.01, 26.0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"khasra_no": "103"},
                    "geometry": null
                }
            ]
        }))
        .unwrap()
    }

    fn map_at(zoom: f64) -> MapState {
        MapState::geographic(LatLng::new(26.001, 75.001), zoom)
    }

    #[test]
    fn labels_sit_at_feature_centers() {
        let layer = LabelLayer::from_features(&collection());
        assert_eq!(layer.iter().count(), 2);
        let (first, _) = layer.iter().next().unwrap();
        assert_eq!(first.text, "101");
        assert!((first.anchor.lat - 26.001).abs() < 1e-9);
        assert!((first.anchor.lng - 75.001).abs() < 1e-9);
        assert_eq!(layer.iter().nth(1).unwrap().0.text, "102");
    }

    #[test]
    fn labels_start_hidden_and_detached() {
        let mut map = map_at(17.0);
        let mut labels = LabelController::default();
        labels.install(LabelLayer::from_features(&collection()), &mut map);
        assert!(!labels.is_visible());
        assert!(!labels.is_attached(&map));
        assert!(map.layers.is_empty());
    }

    #[test]
    fn toggling_twice_restores_attachment_and_styles() {
        let mut map = map_at(17.0);
        let mut labels = LabelController::default();
        labels.install(LabelLayer::from_features(&collection()), &mut map);

        assert!(labels.toggle(&mut map));
        assert!(labels.is_attached(&map));
        let shown: Vec<LabelStyle> = match map.layers.iter().next() {
            Some(Layer::Labels(layer)) => layer.styles().to_vec(),
            other => panic!("expected label layer, got {other:?}"),
        };
        assert!(shown.iter().all(|s| s.visible && s.font_px == 12.0));

        assert!(!labels.toggle(&mut map));
        assert!(!labels.is_attached(&map));
        assert!(map.layers.is_empty());

        assert!(labels.toggle(&mut map));
        match map.layers.iter().next() {
            Some(Layer::Labels(layer)) => assert_eq!(layer.styles(), shown.as_slice()),
            other => panic!("expected label layer, got {other:?}"),
        }
    }

    #[test]
    fn zoom_end_resizes_or_hides_labels() {
        let mut map = map_at(17.0);
        let mut labels = LabelController::default();
        labels.install(LabelLayer::from_features(&collection()), &mut map);
        labels.toggle(&mut map);

        map.viewport.zoom = 15.0;
        labels.on_zoom_end(&mut map);
        let Some(Layer::Labels(layer)) = map.layers.iter().next() else {
            panic!("labels detached on zoom");
        };
        assert!(layer.styles().iter().all(|s| !s.visible && s.font_px == 0.0));
        // Hidden labels stay attached.
        assert!(labels.is_attached(&map));

        map.viewport.zoom = 19.0;
        labels.on_zoom_end(&mut map);
        let Some(Layer::Labels(layer)) = map.layers.iter().next() else {
            panic!("labels detached on zoom");
        };
        assert!(layer.styles().iter().all(|s| s.visible && s.font_px == 16.0));
    }

    #[test]
    fn labels_arriving_after_toggle_attach_immediately() {
        let mut map = map_at(16.0);
        let mut labels = LabelController::default();
        labels.toggle(&mut map);
        assert!(map.layers.is_empty());

        labels.install(LabelLayer::from_features(&collection()), &mut map);
        assert!(labels.is_attached(&map));
    }
}
