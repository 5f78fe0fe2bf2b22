//! Comparison viewer: a month's RGB scene in pixel space next to its NDVI
//! raster on a geographic map.

use geojson::FeatureCollection;
use leptos::prelude::*;
use rabi_shared::geo::geometry_shapes;
use rabi_shared::{LatLng, LatLngBounds, Month};

use crate::api::{ApiError, CropApi, HttpApi, RasterImage, log_failure};
use crate::config::ViewerConfig;
use crate::controls::{MonthSelect, NoticeBanner};
use crate::layers::{ImageOverlay, Layer, MapState, OverlaySlot, VectorLayer, VectorStyle};
use crate::map_view::{MapLens, MapView};
use crate::notice::{Notice, NoticeSlot};
use crate::popup::{Popup, PopupContent};
use crate::sequence::RequestSequencer;
use crate::state::StateCell;

const NDVI_OPACITY: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonViewState {
    pub rgb_map: MapState,
    pub ndvi_map: MapState,
    rgb_overlay: OverlaySlot,
    ndvi_overlay: OverlaySlot,
    cadastral: OverlaySlot,
    cadastral_loading: bool,
    pub month: Month,
    pub date_label: String,
    /// NDVI bounds are the same for every month; fetched once.
    geo_bounds: Option<LatLngBounds>,
    pub notices: NoticeSlot,
    loads: RequestSequencer,
    probes: RequestSequencer,
}

impl ComparisonViewState {
    pub fn new(config: &ViewerConfig) -> Self {
        let month = Month::default();
        Self {
            rgb_map: MapState::pixel_plane(),
            ndvi_map: MapState::geographic(config.initial_center(), config.initial_zoom),
            rgb_overlay: OverlaySlot::default(),
            ndvi_overlay: OverlaySlot::default(),
            cadastral: OverlaySlot::default(),
            cadastral_loading: false,
            month,
            date_label: month.date_label(),
            geo_bounds: None,
            notices: NoticeSlot::default(),
            loads: RequestSequencer::new(config.discard_stale_responses),
            probes: RequestSequencer::new(config.discard_stale_responses),
        }
    }

    /// Switch the selected month and take a ticket for its raster load.
    pub fn select_month(&mut self, month: Month) -> u64 {
        self.month = month;
        self.date_label = month.date_label();
        self.loads.issue()
    }

    pub fn cached_bounds(&self) -> Option<LatLngBounds> {
        self.geo_bounds
    }

    pub fn remember_bounds(&mut self, bounds: LatLngBounds) {
        self.geo_bounds = Some(bounds);
    }

    /// Show a decoded RGB scene stretched over its own pixel extent.
    ///
    /// Returns the image URL that is no longer displayed and should be
    /// released: the replaced scene's, or this one's if the load went stale.
    pub fn apply_rgb(&mut self, ticket: u64, image: RasterImage) -> Option<String> {
        if !self.loads.is_current(ticket) {
            return Some(image.src);
        }
        let bounds = image.size.as_plane_bounds();
        let previous = self.rgb_overlay.set(
            &mut self.rgb_map.layers,
            Layer::Image(ImageOverlay {
                src: image.src,
                bounds,
                opacity: 1.0,
            }),
        );
        self.rgb_map.viewport.fit_bounds(&bounds);
        match previous {
            Some(Layer::Image(old)) => Some(old.src),
            _ => None,
        }
    }

    pub fn apply_ndvi(&mut self, ticket: u64, src: String, bounds: LatLngBounds) -> bool {
        if !self.loads.is_current(ticket) {
            return false;
        }
        self.ndvi_overlay.set(
            &mut self.ndvi_map.layers,
            Layer::Image(ImageOverlay {
                src,
                bounds,
                opacity: NDVI_OPACITY,
            }),
        );
        self.ndvi_map.viewport.fit_bounds(&bounds);
        true
    }

    /// `true` if the caller should fetch parcel outlines: they are neither
    /// shown nor already on their way.
    pub fn claim_cadastral_load(&mut self) -> bool {
        if self.cadastral_loading || self.cadastral.current().is_some() {
            return false;
        }
        self.cadastral_loading = true;
        true
    }

    pub fn install_cadastral(&mut self, collection: &FeatureCollection) {
        let shapes = collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(geometry_shapes)
            .collect();
        self.cadastral.set(
            &mut self.ndvi_map.layers,
            Layer::Vector(VectorLayer {
                shapes,
                style: VectorStyle::cadastral(),
            }),
        );
        self.cadastral_loading = false;
    }

    pub fn cadastral_load_failed(&mut self) {
        self.cadastral_loading = false;
    }

    pub fn raster_load_failed(&mut self, ticket: u64) {
        if self.loads.is_current(ticket) {
            self.notices.post(Notice::RasterLoadFailed);
        }
    }

    /// Start an NDVI lookup at `at`. Outside the current raster the popup
    /// says so and no lookup is made.
    pub fn begin_probe(&mut self, at: LatLng) -> Option<(u64, Month)> {
        let inside = self
            .ndvi_overlay
            .image(&self.ndvi_map.layers)
            .is_some_and(|overlay| overlay.bounds.contains(at));
        if !inside {
            self.ndvi_map
                .open_popup(Popup::new(at, PopupContent::OutsideRaster));
            return None;
        }
        Some((self.probes.issue(), self.month))
    }

    pub fn show_ndvi_value(&mut self, ticket: u64, at: LatLng, value: Option<f64>) -> bool {
        if !self.probes.is_current(ticket) {
            return false;
        }
        self.ndvi_map
            .open_popup(Popup::new(at, PopupContent::NdviValue(value)));
        true
    }

    pub fn rgb_layer(&self) -> Option<&ImageOverlay> {
        self.rgb_overlay.image(&self.rgb_map.layers)
    }

    pub fn ndvi_layer(&self) -> Option<&ImageOverlay> {
        self.ndvi_overlay.image(&self.ndvi_map.layers)
    }

    pub fn has_cadastral(&self) -> bool {
        self.cadastral.current().is_some()
    }
}

async fn load_rasters<A, S>(api: &A, view: &S, ticket: u64, month: Month) -> Result<(), ApiError>
where
    A: CropApi,
    S: StateCell<ComparisonViewState>,
{
    let bounds = match view.observe(|s| s.cached_bounds()).flatten() {
        Some(bounds) => bounds,
        None => {
            let bounds = api.ndvi_bounds().await?;
            view.mutate(|s| s.remember_bounds(bounds));
            bounds
        }
    };

    let rgb = api.rgb_image(month).await?;
    let fresh = rgb.src.clone();
    match view.mutate(|s| s.apply_rgb(ticket, rgb)) {
        Some(Some(unused)) => api.release_image(&unused),
        Some(None) => {}
        None => api.release_image(&fresh),
    }

    let ndvi_src = api.month_ndvi_image_url(month);
    view.mutate(|s| s.apply_ndvi(ticket, ndvi_src, bounds));

    if view.mutate(|s| s.claim_cadastral_load()).unwrap_or(false) {
        match api.khasra_geojson().await {
            Ok(collection) => {
                view.mutate(|s| s.install_cadastral(&collection));
            }
            Err(e) => {
                view.mutate(|s| s.cadastral_load_failed());
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Select `month` and bring both maps up to date with it. Failures post the
/// raster notice before being returned.
pub async fn load_month<A, S>(api: &A, view: &S, month: Month) -> Result<(), ApiError>
where
    A: CropApi,
    S: StateCell<ComparisonViewState>,
{
    let Some(ticket) = view.mutate(|s| s.select_month(month)) else {
        return Ok(());
    };
    let result = load_rasters(api, view, ticket, month).await;
    if result.is_err() {
        view.mutate(|s| s.raster_load_failed(ticket));
    }
    result
}

pub async fn inspect_ndvi_at<A, S>(api: &A, view: &S, at: LatLng) -> Result<(), ApiError>
where
    A: CropApi,
    S: StateCell<ComparisonViewState>,
{
    let Some((ticket, month)) = view.mutate(|s| s.begin_probe(at)).flatten() else {
        return Ok(());
    };
    let value = api.ndvi_value(at, month).await?;
    view.mutate(|s| s.show_ndvi_value(ticket, at, value));
    Ok(())
}

fn rgb_map(s: &ComparisonViewState) -> &MapState {
    &s.rgb_map
}

fn rgb_map_mut(s: &mut ComparisonViewState) -> &mut MapState {
    &mut s.rgb_map
}

fn ndvi_map(s: &ComparisonViewState) -> &MapState {
    &s.ndvi_map
}

fn ndvi_map_mut(s: &mut ComparisonViewState) -> &mut MapState {
    &mut s.ndvi_map
}

fn spawn_month_load(api: HttpApi, state: RwSignal<ComparisonViewState>, month: Month) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = load_month(&api, &state, month).await {
            log_failure("Raster load error", &e);
        }
    });
}

#[component]
pub fn ComparisonViewer(config: ViewerConfig) -> impl IntoView {
    let api = HttpApi::new(config.api_base.clone());
    let state = RwSignal::new(ComparisonViewState::new(&config));

    spawn_month_load(api.clone(), state, Month::default());

    let on_month = {
        let api = api.clone();
        Callback::new(move |month: Month| spawn_month_load(api.clone(), state, month))
    };
    let on_ndvi_click = Callback::new(move |at: LatLng| {
        let api = api.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = inspect_ndvi_at(&api, &state, at).await {
                log_failure("NDVI value lookup failed", &e);
            }
        });
    });
    let on_dismiss = Callback::new(move |serial: u64| state.update(|s| s.notices.dismiss(serial)));

    let month = Memo::new(move |_| state.with(|s| s.month));
    let date_label = Memo::new(move |_| state.with(|s| s.date_label.clone()));
    let notice = Memo::new(move |_| state.with(|s| s.notices.current()));

    view! {
        <div class="viewer comparison-viewer">
            <header class="compare-bar">
                <MonthSelect month=month on_change=on_month />
                <span class="date-label">{move || date_label.get()}</span>
            </header>
            <div class="compare-maps">
                <section class="map-pane">
                    <h3 class="pane-title">"RGB"</h3>
                    <MapView state=state lens=MapLens::new(rgb_map, rgb_map_mut) />
                </section>
                <section class="map-pane">
                    <h3 class="pane-title">"NDVI"</h3>
                    <MapView
                        state=state
                        lens=MapLens::new(ndvi_map, ndvi_map_mut)
                        on_click=on_ndvi_click
                    />
                </section>
            </div>
            <NoticeBanner notice=notice on_dismiss=on_dismiss />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::block_on;

    use super::*;
    use crate::testing::MockApi;

    fn view() -> Rc<RefCell<ComparisonViewState>> {
        Rc::new(RefCell::new(ComparisonViewState::new(&ViewerConfig::default())))
    }

    #[test]
    fn initial_month_is_november() {
        let s = ComparisonViewState::new(&ViewerConfig::default());
        assert_eq!(s.month, Month::Nov);
        assert_eq!(s.date_label, "📅 14 November 2024");
    }

    #[test]
    fn first_load_lays_out_both_maps() {
        let api = MockApi::default();
        let view = view();
        block_on(load_month(&api, &view, Month::Nov)).unwrap();

        let s = view.borrow();
        let rgb = s.rgb_layer().unwrap();
        assert_eq!(rgb.bounds.south_west(), LatLng::new(0.0, 0.0));
        assert_eq!(rgb.bounds.north_east(), LatLng::new(1200.0, 1600.0));
        assert_eq!(s.rgb_map.viewport.zoom, -1.0);

        let ndvi = s.ndvi_layer().unwrap();
        assert_eq!(ndvi.src, "mock://viz/ndvi-image?month=Nov");
        assert_eq!(ndvi.bounds, api.bounds);
        assert_eq!(ndvi.opacity, 0.8);
        assert!(s.has_cadastral());
        assert_eq!(s.ndvi_map.layers.len(), 2);
    }

    #[test]
    fn switching_month_refetches_rasters_and_reuses_outlines() {
        let api = MockApi::default();
        let view = view();
        block_on(load_month(&api, &view, Month::Nov)).unwrap();
        block_on(load_month(&api, &view, Month::Dec)).unwrap();

        let s = view.borrow();
        assert_eq!(s.date_label, "📅 16 December 2024");
        assert_eq!(api.calls.rgb.get(), 2);
        assert_eq!(api.calls.ndvi_image.get(), 2);
        assert_eq!(api.calls.geojson.get(), 1);
        assert_eq!(api.calls.bounds.get(), 1);
        assert_eq!(s.ndvi_layer().unwrap().src, "mock://viz/ndvi-image?month=Dec");
        assert_eq!(s.rgb_map.layers.len(), 1);
        assert_eq!(s.ndvi_map.layers.len(), 2);
    }

    #[test]
    fn replaced_scene_url_is_released() {
        let api = MockApi::default();
        let view = view();
        block_on(load_month(&api, &view, Month::Nov)).unwrap();
        let first = view.borrow().rgb_layer().unwrap().src.clone();
        block_on(load_month(&api, &view, Month::Jan)).unwrap();

        assert_eq!(*api.released.borrow(), vec![first.clone()]);
        assert_ne!(view.borrow().rgb_layer().unwrap().src, first);
    }

    #[test]
    fn stale_scene_is_released_not_shown() {
        let mut s = ComparisonViewState::new(&ViewerConfig::default());
        let nov = s.select_month(Month::Nov);
        let _dec = s.select_month(Month::Dec);
        let image = RasterImage {
            src: "blob:late".into(),
            size: rabi_shared::PixelBounds::new(10, 10),
        };
        assert_eq!(s.apply_rgb(nov, image).as_deref(), Some("blob:late"));
        assert!(s.rgb_layer().is_none());
        assert!(!s.apply_ndvi(nov, "x".into(), LatLngBounds::from_point(LatLng::new(0.0, 0.0))));
    }

    #[test]
    fn rgb_failure_posts_notice() {
        let api = MockApi::default();
        api.fail_rgb.set(true);
        let view = view();
        let err = block_on(load_month(&api, &view, Month::Feb)).unwrap_err();
        assert_eq!(err, ApiError::Status(500));

        let s = view.borrow();
        assert_eq!(s.notices.current().map(|(_, n)| n), Some(Notice::RasterLoadFailed));
        assert_eq!(s.date_label, "📅 23 February 2025");
        assert!(s.ndvi_layer().is_none());
        assert_eq!(api.calls.geojson.get(), 0);
    }

    #[test]
    fn outlines_load_once_even_when_claimed_twice() {
        let mut s = ComparisonViewState::new(&ViewerConfig::default());
        assert!(s.claim_cadastral_load());
        assert!(!s.claim_cadastral_load());
        s.cadastral_load_failed();
        assert!(s.claim_cadastral_load());
        s.install_cadastral(&crate::testing::cadastral());
        assert!(!s.claim_cadastral_load());
    }

    #[test]
    fn click_outside_raster_makes_no_request() {
        let api = MockApi::default();
        let view = view();
        // Nothing loaded yet: every point is outside.
        block_on(inspect_ndvi_at(&api, &view, LatLng::new(26.91, 75.80))).unwrap();
        block_on(load_month(&api, &view, Month::Nov)).unwrap();
        block_on(inspect_ndvi_at(&api, &view, LatLng::new(27.5, 75.80))).unwrap();

        assert_eq!(api.calls.ndvi_value.get(), 0);
        assert_eq!(
            view.borrow().ndvi_map.popup.as_ref().map(|p| &p.content),
            Some(&PopupContent::OutsideRaster)
        );
    }

    #[test]
    fn click_inside_raster_queries_selected_month() {
        let api = MockApi::default();
        let view = view();
        block_on(load_month(&api, &view, Month::Dec)).unwrap();
        let at = LatLng::new(26.91, 75.80);
        block_on(inspect_ndvi_at(&api, &view, at)).unwrap();

        assert_eq!(api.last_month.get(), Some(Month::Dec));
        let s = view.borrow();
        let popup = s.ndvi_map.popup.as_ref().unwrap();
        assert_eq!(popup.anchor, at);
        assert_eq!(popup.content.lines()[0].text, "0.457");
    }

    #[test]
    fn missing_value_reads_no_data() {
        let api = MockApi {
            ndvi: None,
            ..MockApi::default()
        };
        let view = view();
        block_on(load_month(&api, &view, Month::Nov)).unwrap();
        block_on(inspect_ndvi_at(&api, &view, LatLng::new(26.91, 75.80))).unwrap();
        let s = view.borrow();
        assert_eq!(
            s.ndvi_map.popup.as_ref().map(|p| p.content.lines()[0].text.clone()),
            Some("No data".to_string())
        );
    }
}
