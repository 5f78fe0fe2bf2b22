//! Primary viewer: NDVI overlay, parcel outlines and labels, and the
//! click/search prediction flows.

use geojson::FeatureCollection;
use leptos::prelude::*;
use rabi_shared::api::{MissingField, panel_text};
use rabi_shared::chart::TrendSeries;
use rabi_shared::geo::{geometry_bounds, geometry_shapes};
use rabi_shared::{LatLng, LatLngBounds, Prediction, PredictionOutcome, PredictionResponse};

use crate::api::{ApiError, CropApi, HttpApi, log_failure};
use crate::chart::{ChartSlot, TrendChart};
use crate::config::ViewerConfig;
use crate::controls::{CropPanel, LabelToggle, Legend, NoticeBanner, SearchBox};
use crate::labels::{LabelController, LabelLayer};
use crate::layers::{ImageOverlay, Layer, MapState, OverlaySlot, VectorLayer, VectorStyle};
use crate::map_view::{MapLens, MapView};
use crate::notice::{Notice, NoticeSlot};
use crate::popup::{Popup, PopupContent};
use crate::sequence::RequestSequencer;
use crate::state::StateCell;

const NDVI_OPACITY: f64 = 1.0;

/// Read-only side-panel fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropPanelText {
    pub predicted_crop: String,
    pub actual_crop: String,
    pub crop_name: String,
}

impl Default for CropPanelText {
    fn default() -> Self {
        Self {
            predicted_crop: panel_text(None),
            actual_crop: panel_text(None),
            crop_name: panel_text(None),
        }
    }
}

impl CropPanelText {
    fn from_prediction(p: &Prediction) -> Self {
        Self {
            predicted_crop: panel_text(p.predicted_crop.as_deref()),
            actual_crop: panel_text(p.actual_crop.as_deref()),
            crop_name: panel_text(p.crop_name.as_deref()),
        }
    }
}

/// Where a prediction request came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Click(LatLng),
    Search,
}

/// What a prediction flow ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Empty search input; nothing was requested.
    Rejected,
    /// A newer request superseded this one, or the viewer is gone.
    Stale,
    Outside,
    Shown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryViewState {
    pub map: MapState,
    ndvi_overlay: OverlaySlot,
    cadastral: OverlaySlot,
    highlight: OverlaySlot,
    pub labels: LabelController,
    pub panel: CropPanelText,
    pub chart: ChartSlot,
    pub notices: NoticeSlot,
    sequencer: RequestSequencer,
}

impl PrimaryViewState {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            map: MapState::geographic(config.initial_center(), config.initial_zoom),
            ndvi_overlay: OverlaySlot::default(),
            cadastral: OverlaySlot::default(),
            highlight: OverlaySlot::default(),
            labels: LabelController::default(),
            panel: CropPanelText::default(),
            chart: ChartSlot::default(),
            notices: NoticeSlot::default(),
            sequencer: RequestSequencer::new(config.discard_stale_responses),
        }
    }

    fn fit(&mut self, bounds: &LatLngBounds) {
        if self.map.viewport.fit_bounds(bounds) {
            self.on_zoom_end();
        }
    }

    pub fn on_zoom_end(&mut self) {
        self.labels.on_zoom_end(&mut self.map);
    }

    pub fn toggle_labels(&mut self) -> bool {
        self.labels.toggle(&mut self.map)
    }

    pub fn set_ndvi_overlay(&mut self, src: String, bounds: LatLngBounds) {
        let overlay = ImageOverlay {
            src,
            bounds,
            opacity: NDVI_OPACITY,
        };
        self.ndvi_overlay
            .set(&mut self.map.layers, Layer::Image(overlay));
        self.fit(&bounds);
    }

    pub fn set_cadastral(&mut self, collection: &FeatureCollection) {
        let shapes = collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(geometry_shapes)
            .collect();
        self.cadastral.set(
            &mut self.map.layers,
            Layer::Vector(VectorLayer {
                shapes,
                style: VectorStyle::cadastral(),
            }),
        );
        self.labels
            .install(LabelLayer::from_features(collection), &mut self.map);
    }

    /// Show the pending popup at the clicked point and take a ticket.
    pub fn begin_click(&mut self, at: LatLng) -> u64 {
        self.map
            .open_popup(Popup::new(at, PopupContent::Loading));
        self.sequencer.issue()
    }

    /// Validate the search box. Blank input posts a notice and yields `None`.
    pub fn begin_search(&mut self, raw: &str) -> Option<(u64, String)> {
        let khasra_no = raw.trim();
        if khasra_no.is_empty() {
            self.notices.post(Notice::EnterKhasraNumber);
            return None;
        }
        Some((self.sequencer.issue(), khasra_no.to_string()))
    }

    pub fn apply_prediction(
        &mut self,
        ticket: u64,
        gesture: Gesture,
        response: PredictionResponse,
    ) -> Result<Applied, MissingField> {
        if !self.sequencer.is_current(ticket) {
            return Ok(Applied::Stale);
        }
        match response.into_outcome()? {
            PredictionOutcome::Outside => {
                self.chart.destroy();
                match gesture {
                    Gesture::Click(_) => {
                        if self
                            .map
                            .popup
                            .as_ref()
                            .is_some_and(|p| p.content == PopupContent::Loading)
                        {
                            self.map.close_popup();
                        }
                    }
                    Gesture::Search => {
                        self.notices.post(Notice::KhasraNotFound);
                    }
                }
                Ok(Applied::Outside)
            }
            PredictionOutcome::Found(prediction) => {
                self.show_prediction(gesture, &prediction);
                Ok(Applied::Shown)
            }
        }
    }

    fn show_prediction(&mut self, gesture: Gesture, p: &Prediction) {
        self.highlight.set(
            &mut self.map.layers,
            Layer::Vector(VectorLayer {
                shapes: geometry_shapes(&p.geometry),
                style: VectorStyle::highlight(p.predicted_crop.as_deref()),
            }),
        );
        self.panel = CropPanelText::from_prediction(p);

        let anchor = match gesture {
            Gesture::Click(at) => at,
            Gesture::Search => match geometry_bounds(&p.geometry) {
                Some(bounds) => {
                    self.fit(&bounds);
                    bounds.center()
                }
                None => self.map.viewport.center,
            },
        };
        self.map
            .open_popup(Popup::new(anchor, PopupContent::prediction(p)));

        match p.ndvi.as_ref().and_then(TrendSeries::from_ndvi) {
            Some(series) => {
                self.chart.draw(series);
            }
            None => {
                self.chart.destroy();
            }
        }
    }

    pub fn highlight_layer(&self) -> Option<&Layer> {
        self.highlight.get(&self.map.layers)
    }

    pub fn ndvi_layer(&self) -> Option<&ImageOverlay> {
        self.ndvi_overlay.image(&self.map.layers)
    }
}

fn decode_failure(e: MissingField) -> ApiError {
    ApiError::Decode(e.to_string())
}

/// Fetch the NDVI bounds, lay the season raster over them and fit the map.
pub async fn load_ndvi_layer<A, S>(api: &A, view: &S) -> Result<(), ApiError>
where
    A: CropApi,
    S: StateCell<PrimaryViewState>,
{
    let bounds = api.ndvi_bounds().await?;
    let src = api.ndvi_image_url();
    view.mutate(|s| s.set_ndvi_overlay(src, bounds));
    Ok(())
}

/// Fetch parcel outlines and build the (hidden) label layer.
pub async fn load_cadastral_layer<A, S>(api: &A, view: &S) -> Result<(), ApiError>
where
    A: CropApi,
    S: StateCell<PrimaryViewState>,
{
    let collection = api.khasra_geojson().await?;
    view.mutate(|s| s.set_cadastral(&collection));
    Ok(())
}

pub async fn predict_at<A, S>(api: &A, view: &S, at: LatLng) -> Result<Applied, ApiError>
where
    A: CropApi,
    S: StateCell<PrimaryViewState>,
{
    let Some(ticket) = view.mutate(|s| s.begin_click(at)) else {
        return Ok(Applied::Stale);
    };
    let response = api.predict(at).await?;
    view.mutate(|s| s.apply_prediction(ticket, Gesture::Click(at), response))
        .unwrap_or(Ok(Applied::Stale))
        .map_err(decode_failure)
}

pub async fn search_khasra<A, S>(api: &A, view: &S, raw: &str) -> Result<Applied, ApiError>
where
    A: CropApi,
    S: StateCell<PrimaryViewState>,
{
    let Some((ticket, khasra_no)) = view.mutate(|s| s.begin_search(raw)).flatten() else {
        return Ok(Applied::Rejected);
    };
    let response = api.predict_by_khasra(&khasra_no).await?;
    view.mutate(|s| s.apply_prediction(ticket, Gesture::Search, response))
        .unwrap_or(Ok(Applied::Stale))
        .map_err(decode_failure)
}

fn primary_map(s: &PrimaryViewState) -> &MapState {
    &s.map
}

fn primary_map_mut(s: &mut PrimaryViewState) -> &mut MapState {
    &mut s.map
}

#[component]
pub fn PrimaryViewer(config: ViewerConfig) -> impl IntoView {
    let api = HttpApi::new(config.api_base.clone());
    let state = RwSignal::new(PrimaryViewState::new(&config));

    {
        let api = api.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = load_ndvi_layer(&api, &state).await {
                log_failure("NDVI overlay load failed", &e);
            }
        });
    }
    {
        let api = api.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = load_cadastral_layer(&api, &state).await {
                log_failure("cadastral load failed", &e);
            }
        });
    }

    let on_map_click = {
        let api = api.clone();
        Callback::new(move |at: LatLng| {
            let api = api.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = predict_at(&api, &state, at).await {
                    log_failure("prediction failed", &e);
                }
            });
        })
    };
    let on_search = Callback::new(move |raw: String| {
        let api = api.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = search_khasra(&api, &state, &raw).await {
                log_failure("khasra search failed", &e);
            }
        });
    });
    let on_zoom_end = Callback::new(move |_zoom: f64| state.update(|s| s.on_zoom_end()));
    let on_toggle_labels = Callback::new(move |()| {
        state.update(|s| {
            s.toggle_labels();
        })
    });
    let on_dismiss = Callback::new(move |serial: u64| state.update(|s| s.notices.dismiss(serial)));

    let labels_visible = Memo::new(move |_| state.with(|s| s.labels.is_visible()));
    let panel = Memo::new(move |_| state.with(|s| s.panel.clone()));
    let chart = Memo::new(move |_| state.with(|s| s.chart.current().cloned()));
    let notice = Memo::new(move |_| state.with(|s| s.notices.current()));

    view! {
        <div class="viewer primary-viewer">
            <aside class="side-panel">
                <SearchBox on_search=on_search />
                <CropPanel panel=panel />
                <div class="chart-box">
                    <TrendChart chart=chart />
                </div>
            </aside>
            <main class="map-pane">
                <MapView
                    state=state
                    lens=MapLens::new(primary_map, primary_map_mut)
                    on_click=on_map_click
                    on_zoom_end=on_zoom_end
                >
                    <LabelToggle visible=labels_visible on_toggle=on_toggle_labels />
                    <Legend />
                </MapView>
            </main>
            <NoticeBanner notice=notice on_dismiss=on_dismiss />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::block_on;
    use rabi_shared::api::format_area;
    use serde_json::json;

    use super::*;
    use crate::layers::Fill;
    use crate::testing::{self, MockApi};

    fn view() -> Rc<RefCell<PrimaryViewState>> {
        Rc::new(RefCell::new(PrimaryViewState::new(&ViewerConfig::default())))
    }

    fn inside_parcel() -> LatLng {
        LatLng::new(26.911, 75.801)
    }

    #[test]
    fn layers_load_and_map_fits_ndvi_bounds() {
        let api = MockApi::default();
        let view = view();
        block_on(load_ndvi_layer(&api, &view)).unwrap();
        block_on(load_cadastral_layer(&api, &view)).unwrap();

        let s = view.borrow();
        let ndvi = s.ndvi_layer().unwrap();
        assert_eq!(ndvi.src, "mock://ndvi-image");
        assert_eq!(ndvi.opacity, 1.0);
        let mut fitted = s.map.viewport.clone();
        assert!(!fitted.fit_bounds(&api.bounds));
        assert_eq!(s.map.viewport.center, fitted.center);
        assert!(s.map.viewport.zoom > 6.0);
        // NDVI raster plus outlines; labels stay detached until toggled.
        assert_eq!(s.map.layers.len(), 2);
        assert!(!s.labels.is_attached(&s.map));
    }

    #[test]
    fn click_shows_loading_then_result_with_two_decimal_area() {
        let api = MockApi::default();
        api.respond_with(
            serde_json::from_value(json!({
                "predicted_crop": "सरसों",
                "actual_crop": "चना",
                "crop_name": "सरसों",
                "khasra_no": "88/2",
                "area_ha": 1.5,
                "geometry": testing::parcel_geometry(),
                "ndvi": {"NDVI_Nov": 0.2, "NDVI_Dec": 0.5, "NDVI_Jan": 0.6, "NDVI_Feb": 0.3}
            }))
            .unwrap(),
        );
        let view = view();

        let ticket = view.borrow_mut().begin_click(inside_parcel());
        assert_eq!(
            view.borrow().map.popup.as_ref().map(|p| &p.content),
            Some(&PopupContent::Loading)
        );
        assert!(view.borrow().sequencer.is_current(ticket));

        let applied = block_on(predict_at(&api, &view, inside_parcel())).unwrap();
        assert_eq!(applied, Applied::Shown);

        let s = view.borrow();
        let popup = s.map.popup.as_ref().unwrap();
        assert_eq!(popup.anchor, inside_parcel());
        let lines = popup.content.lines();
        assert_eq!(lines[3].text, "1.50");
        assert_eq!(lines[3].text, format_area(1.5));
        assert_eq!(s.panel.predicted_crop, "सरसों");
        assert_eq!(s.panel.actual_crop, "चना");
        assert!(s.chart.current().is_some());
        match s.highlight_layer() {
            Some(Layer::Vector(v)) => {
                assert_eq!(v.style.stroke, "#e41a1c");
                assert_eq!(
                    v.style.fill,
                    Some(Fill {
                        color: "#e41a1c".into(),
                        opacity: 0.5
                    })
                );
            }
            other => panic!("expected highlight, got {other:?}"),
        }
    }

    #[test]
    fn repeated_predictions_keep_one_highlight() {
        let api = MockApi::default();
        let view = view();
        block_on(predict_at(&api, &view, inside_parcel())).unwrap();
        block_on(search_khasra(&api, &view, "245")).unwrap();
        block_on(predict_at(&api, &view, inside_parcel())).unwrap();
        let s = view.borrow();
        let vectors = s
            .map
            .layers
            .iter()
            .filter(|l| matches!(l, Layer::Vector(_)))
            .count();
        assert_eq!(vectors, 1);
    }

    #[test]
    fn blank_search_never_requests() {
        let api = MockApi::default();
        let view = view();
        for raw in ["", "   ", "\t\n"] {
            let applied = block_on(search_khasra(&api, &view, raw)).unwrap();
            assert_eq!(applied, Applied::Rejected);
        }
        assert_eq!(api.calls.predict_by_khasra.get(), 0);
        assert_eq!(
            view.borrow().notices.current().map(|(_, n)| n),
            Some(Notice::EnterKhasraNumber)
        );
    }

    #[test]
    fn search_trims_and_fits_parcel() {
        let api = MockApi::default();
        let view = view();
        let applied = block_on(search_khasra(&api, &view, "  245 ")).unwrap();
        assert_eq!(applied, Applied::Shown);
        assert_eq!(api.last_khasra.borrow().as_deref(), Some("245"));

        let s = view.borrow();
        let parcel = LatLngBounds::from_corners(LatLng::new(26.910, 75.800), LatLng::new(26.912, 75.802));
        let mut expected = s.map.viewport.clone();
        expected.fit_bounds(&parcel);
        assert_eq!(s.map.viewport.zoom, expected.zoom);
        assert_eq!(s.map.viewport.center, expected.center);
        for corner in [parcel.south_west(), parcel.north_east()] {
            let (x, y) = s.map.viewport.latlng_to_screen(corner);
            assert!(x >= 0.0 && x <= s.map.viewport.width);
            assert!(y >= 0.0 && y <= s.map.viewport.height);
        }

        assert_eq!(s.map.popup.as_ref().unwrap().anchor, parcel.center());
        assert_eq!(s.panel.predicted_crop, "गेहूँ");
        assert_eq!(s.panel.actual_crop, "गेहूँ");
        assert_eq!(s.panel.crop_name, "गेहूँ (लोक-1)");
    }

    #[test]
    fn outside_click_destroys_chart_and_leaves_panel() {
        let api = MockApi::default();
        let view = view();
        block_on(predict_at(&api, &view, inside_parcel())).unwrap();
        let panel_before = view.borrow().panel.clone();
        let highlight_before = view.borrow().highlight_layer().cloned();
        assert!(view.borrow().chart.current().is_some());

        api.respond_with(testing::outside());
        let applied = block_on(predict_at(&api, &view, LatLng::new(10.0, 10.0))).unwrap();
        assert_eq!(applied, Applied::Outside);

        let s = view.borrow();
        assert!(s.chart.current().is_none());
        assert!(s.map.popup.is_none());
        assert_eq!(s.panel, panel_before);
        assert_eq!(s.highlight_layer().cloned(), highlight_before);
    }

    #[test]
    fn outside_search_posts_not_found() {
        let api = MockApi::default();
        api.respond_with(testing::outside());
        let view = view();
        let applied = block_on(search_khasra(&api, &view, "9999")).unwrap();
        assert_eq!(applied, Applied::Outside);
        let s = view.borrow();
        assert_eq!(s.notices.current().map(|(_, n)| n), Some(Notice::KhasraNotFound));
        assert!(s.map.popup.is_none());
        assert!(s.highlight_layer().is_none());
        assert_eq!(s.panel, CropPanelText::default());
    }

    #[test]
    fn missing_ndvi_clears_chart() {
        let api = MockApi::default();
        let view = view();
        block_on(predict_at(&api, &view, inside_parcel())).unwrap();

        let mut bare = testing::wheat_parcel();
        bare.ndvi = None;
        api.respond_with(bare);
        block_on(predict_at(&api, &view, inside_parcel())).unwrap();
        assert!(view.borrow().chart.current().is_none());
    }

    #[test]
    fn malformed_response_is_a_decode_error() {
        let api = MockApi::default();
        api.respond_with(serde_json::from_value(json!({"khasra_no": "1"})).unwrap());
        let view = view();
        let err = block_on(predict_at(&api, &view, inside_parcel())).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(view.borrow().highlight_layer().is_none());
    }

    #[test]
    fn transport_failure_leaves_loading_popup() {
        let api = MockApi::default();
        *api.prediction.borrow_mut() = Err(ApiError::Transport("offline".into()));
        let view = view();
        assert!(block_on(predict_at(&api, &view, inside_parcel())).is_err());
        assert_eq!(
            view.borrow().map.popup.as_ref().map(|p| &p.content),
            Some(&PopupContent::Loading)
        );
    }

    #[test]
    fn superseded_response_is_dropped() {
        let mut s = PrimaryViewState::new(&ViewerConfig::default());
        let first = s.begin_click(inside_parcel());
        let second = s.begin_click(LatLng::new(26.92, 75.81));
        assert_eq!(
            s.apply_prediction(first, Gesture::Click(inside_parcel()), testing::wheat_parcel()),
            Ok(Applied::Stale)
        );
        assert!(s.highlight_layer().is_none());
        assert_eq!(
            s.apply_prediction(second, Gesture::Click(LatLng::new(26.92, 75.81)), testing::wheat_parcel()),
            Ok(Applied::Shown)
        );
    }

    #[test]
    fn last_response_wins_when_not_discarding() {
        let config = ViewerConfig {
            discard_stale_responses: false,
            ..ViewerConfig::default()
        };
        let mut s = PrimaryViewState::new(&config);
        let first = s.begin_click(inside_parcel());
        let _second = s.begin_click(inside_parcel());
        assert_eq!(
            s.apply_prediction(first, Gesture::Click(inside_parcel()), testing::wheat_parcel()),
            Ok(Applied::Shown)
        );
    }

    #[test]
    fn search_fit_restyles_visible_labels() {
        let api = MockApi::default();
        let view = view();
        block_on(load_cadastral_layer(&api, &view)).unwrap();
        view.borrow_mut().toggle_labels();
        block_on(search_khasra(&api, &view, "245")).unwrap();

        let s = view.borrow();
        assert!(s.map.viewport.zoom >= 16.0);
        let labels = s
            .map
            .layers
            .iter()
            .find_map(|l| match l {
                Layer::Labels(labels) => Some(labels),
                _ => None,
            })
            .unwrap();
        assert!(labels.styles().iter().all(|st| st.visible && st.font_px >= 10.0));
    }
}
