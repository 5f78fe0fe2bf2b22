use std::fmt;

use geojson::Geometry;
use serde::{Deserialize, Deserializer, Serialize};

use crate::geo::LatLngBounds;
use crate::month::Month;

pub const NDVI_BOUNDS: &str = "/ndvi-bounds";
pub const NDVI_IMAGE: &str = "/ndvi-image";
pub const KHASRA_GEOJSON: &str = "/khasra-geojson";
pub const PREDICT: &str = "/predict";
pub const PREDICT_BY_KHASRA: &str = "/predict-by-khasra";
pub const VIZ_RGB_IMAGE: &str = "/viz/rgb-image";
pub const VIZ_NDVI_IMAGE: &str = "/viz/ndvi-image";
pub const VIZ_NDVI_VALUE: &str = "/viz/ndvi-value";

/// Join an API base (with or without trailing slash) and an endpoint path.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Endpoint URL with the `month` query parameter the `/viz/*` routes take.
pub fn month_url(base: &str, path: &str, month: Month) -> String {
    format!("{}?month={}", endpoint_url(base, path), month.as_str())
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoundsResponse {
    pub bounds: LatLngBounds,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KhasraRequest {
    pub khasra_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NdviValueRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub month: Month,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NdviValueResponse {
    #[serde(default)]
    pub ndvi: Option<f64>,
}

/// Per-month NDVI samples for one parcel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NdviByMonth {
    #[serde(rename = "NDVI_Nov", default)]
    pub nov: Option<f64>,
    #[serde(rename = "NDVI_Dec", default)]
    pub dec: Option<f64>,
    #[serde(rename = "NDVI_Jan", default)]
    pub jan: Option<f64>,
    #[serde(rename = "NDVI_Feb", default)]
    pub feb: Option<f64>,
}

impl NdviByMonth {
    pub fn get(&self, month: Month) -> Option<f64> {
        let value = match month {
            Month::Nov => self.nov,
            Month::Dec => self.dec,
            Month::Jan => self.jan,
            Month::Feb => self.feb,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn values(&self) -> [Option<f64>; 4] {
        Month::ALL.map(|m| self.get(m))
    }
}

/// Body returned by `/predict` and `/predict-by-khasra`, as sent.
///
/// Every field is optional on the wire: out-of-area answers carry little more
/// than `outside: true`. Use [`PredictionResponse::into_outcome`] to validate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub outside: Option<bool>,
    #[serde(default)]
    pub predicted_crop: Option<String>,
    #[serde(default)]
    pub actual_crop: Option<String>,
    #[serde(default)]
    pub crop_name: Option<String>,
    #[serde(default, deserialize_with = "khasra_no_field")]
    pub khasra_no: Option<String>,
    #[serde(default)]
    pub area_ha: Option<f64>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub ndvi: Option<NdviByMonth>,
}

/// A validated in-area prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub predicted_crop: Option<String>,
    pub actual_crop: Option<String>,
    pub crop_name: Option<String>,
    pub khasra_no: String,
    pub area_ha: f64,
    pub geometry: Geometry,
    pub ndvi: Option<NdviByMonth>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    /// The point or parcel lies outside the service area.
    Outside,
    Found(Box<Prediction>),
}

/// A field an in-area prediction must carry was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prediction response is missing `{}`", self.0)
    }
}

impl std::error::Error for MissingField {}

impl PredictionResponse {
    pub fn is_outside(&self) -> bool {
        self.outside.unwrap_or(false)
    }

    pub fn into_outcome(self) -> Result<PredictionOutcome, MissingField> {
        if self.is_outside() {
            return Ok(PredictionOutcome::Outside);
        }
        let khasra_no = self.khasra_no.ok_or(MissingField("khasra_no"))?;
        let area_ha = self
            .area_ha
            .filter(|a| a.is_finite())
            .ok_or(MissingField("area_ha"))?;
        let geometry = self.geometry.ok_or(MissingField("geometry"))?;
        Ok(PredictionOutcome::Found(Box::new(Prediction {
            predicted_crop: self.predicted_crop,
            actual_crop: self.actual_crop,
            crop_name: self.crop_name,
            khasra_no,
            area_ha,
            geometry,
            ndvi: self.ndvi,
        })))
    }
}

/// Parcel numbers come from a shapefile column and may be serialized as text
/// or as a number; render both as text (`12.0` becomes `12`).
pub fn khasra_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

fn khasra_no_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(khasra_text))
}

/// Text for a side-panel field: missing or empty values show as `--`.
pub fn panel_text(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "--".to_string(),
    }
}

/// Parcel area in hectares with exactly two decimals.
pub fn format_area(area_ha: f64) -> String {
    format!("{area_ha:.2}")
}

/// Point NDVI with three decimals.
pub fn format_ndvi(value: f64) -> String {
    format!("{value:.3}")
}
