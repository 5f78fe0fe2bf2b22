//! In-memory backend for exercising viewer flows.

use std::cell::{Cell, RefCell};

use geojson::FeatureCollection;
use rabi_shared::{LatLng, LatLngBounds, Month, PixelBounds, PredictionResponse};
use serde_json::json;

use crate::api::{ApiError, CropApi, RasterImage};

#[derive(Default)]
pub struct CallLog {
    pub bounds: Cell<usize>,
    pub geojson: Cell<usize>,
    pub predict: Cell<usize>,
    pub predict_by_khasra: Cell<usize>,
    pub rgb: Cell<usize>,
    pub ndvi_image: Cell<usize>,
    pub ndvi_value: Cell<usize>,
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

pub struct MockApi {
    pub calls: CallLog,
    pub bounds: LatLngBounds,
    pub prediction: RefCell<Result<PredictionResponse, ApiError>>,
    pub ndvi: Option<f64>,
    pub rgb_size: PixelBounds,
    pub fail_rgb: Cell<bool>,
    pub released: RefCell<Vec<String>>,
    pub last_khasra: RefCell<Option<String>>,
    pub last_month: Cell<Option<Month>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            calls: CallLog::default(),
            bounds: LatLngBounds::from_corners(LatLng::new(26.90, 75.78), LatLng::new(26.93, 75.82)),
            prediction: RefCell::new(Ok(wheat_parcel())),
            ndvi: Some(0.4567),
            rgb_size: PixelBounds::new(1600, 1200),
            fail_rgb: Cell::new(false),
            released: RefCell::new(Vec::new()),
            last_khasra: RefCell::new(None),
            last_month: Cell::new(None),
        }
    }
}

impl MockApi {
    pub fn respond_with(&self, response: PredictionResponse) {
        *self.prediction.borrow_mut() = Ok(response);
    }

    fn answer(&self) -> Result<PredictionResponse, ApiError> {
        self.prediction.borrow().clone()
    }
}

pub fn parcel_geometry() -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[75.800, 26.910], [75.802, 26.910], [75.802, 26.912], [75.800, 26.912], [75.800, 26.910]]]
    })
}

pub fn wheat_parcel() -> PredictionResponse {
    serde_json::from_value(json!({
        "outside": false,
        "predicted_crop": "गेहूँ",
        "actual_crop": "गेहूँ",
        "crop_name": "गेहूँ (लोक-1)",
        "khasra_no": 245,
        "area_ha": 0.8,
        "geometry": parcel_geometry(),
        "ndvi": {"NDVI_Nov": 0.21, "NDVI_Dec": 0.38, "NDVI_Jan": 0.71, "NDVI_Feb": 0.55}
    }))
    .unwrap()
}

pub fn outside() -> PredictionResponse {
    serde_json::from_value(json!({"outside": true})).unwrap()
}

pub fn cadastral() -> FeatureCollection {
    serde_json::from_value(json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"khasra_no": "245"}, "geometry": parcel_geometry()},
            {"type": "Feature", "properties": {"khasra_no": "246"}, "geometry": {
                "type": "Polygon",
                "coordinates": [[[75.802, 26.910], [75.804, 26.910], [75.804, 26.912], [75.802, 26.910]]]
            }}
        ]
    }))
    .unwrap()
}

impl CropApi for MockApi {
    async fn ndvi_bounds(&self) -> Result<LatLngBounds, ApiError> {
        bump(&self.calls.bounds);
        Ok(self.bounds)
    }

    fn ndvi_image_url(&self) -> String {
        "mock://ndvi-image".to_string()
    }

    async fn khasra_geojson(&self) -> Result<FeatureCollection, ApiError> {
        bump(&self.calls.geojson);
        Ok(cadastral())
    }

    async fn predict(&self, _at: LatLng) -> Result<PredictionResponse, ApiError> {
        bump(&self.calls.predict);
        self.answer()
    }

    async fn predict_by_khasra(&self, khasra_no: &str) -> Result<PredictionResponse, ApiError> {
        bump(&self.calls.predict_by_khasra);
        *self.last_khasra.borrow_mut() = Some(khasra_no.to_string());
        self.answer()
    }

    async fn rgb_image(&self, month: Month) -> Result<RasterImage, ApiError> {
        bump(&self.calls.rgb);
        if self.fail_rgb.get() {
            return Err(ApiError::Status(500));
        }
        Ok(RasterImage {
            src: format!("blob:mock/rgb-{}-{}", month.as_str(), self.calls.rgb.get()),
            size: self.rgb_size,
        })
    }

    fn month_ndvi_image_url(&self, month: Month) -> String {
        bump(&self.calls.ndvi_image);
        format!("mock://viz/ndvi-image?month={}", month.as_str())
    }

    async fn ndvi_value(&self, _at: LatLng, month: Month) -> Result<Option<f64>, ApiError> {
        bump(&self.calls.ndvi_value);
        self.last_month.set(Some(month));
        Ok(self.ndvi)
    }

    fn release_image(&self, src: &str) {
        self.released.borrow_mut().push(src.to_string());
    }
}
