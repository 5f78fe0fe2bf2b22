//! Backend access. Flows are written against [`CropApi`] so they can be
//! exercised without a network.

use std::fmt;

use geojson::FeatureCollection;
use gloo_net::http::{Request, Response};
use rabi_shared::api::{
    self, BoundsResponse, KhasraRequest, NdviValueRequest, NdviValueResponse, PredictRequest,
    endpoint_url, month_url,
};
use rabi_shared::{LatLng, LatLngBounds, Month, PixelBounds, PredictionResponse};
use serde::de::DeserializeOwned;
use wasm_bindgen_futures::JsFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response.
    Transport(String),
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The body could not be read as the expected shape.
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(e) => write!(f, "fetch error: {e}"),
            ApiError::Status(status) => write!(f, "HTTP {status}"),
            ApiError::Decode(e) => write!(f, "parse error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// A raster fetched as bytes and decoded, addressed by a URL the renderer
/// can load.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub src: String,
    pub size: PixelBounds,
}

#[allow(async_fn_in_trait)]
pub trait CropApi {
    async fn ndvi_bounds(&self) -> Result<LatLngBounds, ApiError>;
    /// URL of the season NDVI raster, loaded directly by the renderer.
    fn ndvi_image_url(&self) -> String;
    async fn khasra_geojson(&self) -> Result<FeatureCollection, ApiError>;
    async fn predict(&self, at: LatLng) -> Result<PredictionResponse, ApiError>;
    async fn predict_by_khasra(&self, khasra_no: &str) -> Result<PredictionResponse, ApiError>;
    async fn rgb_image(&self, month: Month) -> Result<RasterImage, ApiError>;
    fn month_ndvi_image_url(&self, month: Month) -> String;
    async fn ndvi_value(&self, at: LatLng, month: Month) -> Result<Option<f64>, ApiError>;
    /// Give back a URL obtained from [`CropApi::rgb_image`].
    fn release_image(&self, src: &str);
}

/// [`CropApi`] over `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApi {
    base: String,
}

impl HttpApi {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    fn url(&self, path: &str) -> String {
        endpoint_url(&self.base, path)
    }
}

fn check(resp: Response) -> Result<Response, ApiError> {
    if resp.ok() {
        Ok(resp)
    } else {
        Err(ApiError::Status(resp.status()))
    }
}

async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, ApiError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    check(resp)?
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
    url: &str,
    body: &B,
) -> Result<T, ApiError> {
    let resp = Request::post(url)
        .json(body)
        .map_err(|e| ApiError::Decode(e.to_string()))?
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    check(resp)?
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Wrap raw bytes in an object URL and wait until the browser decodes it.
async fn decode_image_bytes(bytes: &[u8]) -> Result<RasterImage, ApiError> {
    let decode_err = |e: wasm_bindgen::JsValue| ApiError::Decode(format!("{e:?}"));

    let parts = js_sys::Array::new();
    parts.push(&js_sys::Uint8Array::from(bytes));
    let blob = web_sys::Blob::new_with_u8_array_sequence(&parts).map_err(decode_err)?;
    let src = web_sys::Url::create_object_url_with_blob(&blob).map_err(decode_err)?;

    let img = web_sys::HtmlImageElement::new().map_err(decode_err)?;
    img.set_src(&src);
    if let Err(e) = JsFuture::from(img.decode()).await {
        let _ = web_sys::Url::revoke_object_url(&src);
        return Err(decode_err(e));
    }
    let size = PixelBounds::new(img.natural_width(), img.natural_height());
    Ok(RasterImage { src, size })
}

impl CropApi for HttpApi {
    async fn ndvi_bounds(&self) -> Result<LatLngBounds, ApiError> {
        let resp: BoundsResponse = get_json(&self.url(api::NDVI_BOUNDS)).await?;
        Ok(resp.bounds)
    }

    fn ndvi_image_url(&self) -> String {
        self.url(api::NDVI_IMAGE)
    }

    async fn khasra_geojson(&self) -> Result<FeatureCollection, ApiError> {
        get_json(&self.url(api::KHASRA_GEOJSON)).await
    }

    async fn predict(&self, at: LatLng) -> Result<PredictionResponse, ApiError> {
        let body = PredictRequest {
            latitude: at.lat,
            longitude: at.lng,
        };
        post_json(&self.url(api::PREDICT), &body).await
    }

    async fn predict_by_khasra(&self, khasra_no: &str) -> Result<PredictionResponse, ApiError> {
        let body = KhasraRequest {
            khasra_no: khasra_no.to_string(),
        };
        post_json(&self.url(api::PREDICT_BY_KHASRA), &body).await
    }

    async fn rgb_image(&self, month: Month) -> Result<RasterImage, ApiError> {
        let resp = Request::get(&month_url(&self.base, api::VIZ_RGB_IMAGE, month))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let bytes = check(resp)?
            .binary()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        decode_image_bytes(&bytes).await
    }

    fn month_ndvi_image_url(&self, month: Month) -> String {
        month_url(&self.base, api::VIZ_NDVI_IMAGE, month)
    }

    async fn ndvi_value(&self, at: LatLng, month: Month) -> Result<Option<f64>, ApiError> {
        let body = NdviValueRequest {
            latitude: at.lat,
            longitude: at.lng,
            month,
        };
        let resp: NdviValueResponse = post_json(&self.url(api::VIZ_NDVI_VALUE), &body).await?;
        Ok(resp.ndvi.filter(|v| v.is_finite()))
    }

    fn release_image(&self, src: &str) {
        if src.starts_with("blob:") {
            let _ = web_sys::Url::revoke_object_url(src);
        }
    }
}

/// Log a failed background request to the console.
pub fn log_failure(context: &str, err: &ApiError) {
    web_sys::console::error_1(&format!("{context}: {err}").into());
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn errors_describe_their_cause() {
        assert_eq!(ApiError::Status(502).to_string(), "HTTP 502");
        assert_eq!(
            ApiError::Transport("network down".into()).to_string(),
            "fetch error: network down"
        );
    }
}
