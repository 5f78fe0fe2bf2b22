pub mod api;
pub mod chart;
pub mod colors;
pub mod crop;
pub mod geo;
pub mod labels;
pub mod month;

pub use api::{NdviByMonth, Prediction, PredictionOutcome, PredictionResponse};
pub use crop::{CropClass, crop_color};
pub use geo::{GeoShape, LatLng, LatLngBounds, PixelBounds};
pub use labels::label_font_size;
pub use month::Month;
