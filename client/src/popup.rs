use leptos::prelude::*;
use rabi_shared::api::{format_area, format_ndvi, panel_text};
use rabi_shared::{LatLng, Prediction};

pub const LOADING_TEXT: &str = "⏳ NDVI निकाल रहे हैं और फसल अनुमान किया जा रहा है...";
pub const OUTSIDE_RASTER_TEXT: &str = "❌ Outside NDVI raster";

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub anchor: LatLng,
    pub content: PopupContent,
}

impl Popup {
    pub fn new(anchor: LatLng, content: PopupContent) -> Self {
        Self { anchor, content }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupContent {
    Loading,
    Prediction {
        predicted_crop: String,
        crop_name: String,
        khasra_no: String,
        area: String,
    },
    NdviValue(Option<f64>),
    OutsideRaster,
}

/// One popup line: an optional bold caption followed by text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupLine {
    pub caption: Option<&'static str>,
    pub text: String,
}

impl PopupContent {
    pub fn prediction(p: &Prediction) -> Self {
        PopupContent::Prediction {
            predicted_crop: panel_text(p.predicted_crop.as_deref()),
            crop_name: panel_text(p.crop_name.as_deref()),
            khasra_no: p.khasra_no.clone(),
            area: format_area(p.area_ha),
        }
    }

    pub fn lines(&self) -> Vec<PopupLine> {
        let plain = |text: &str| PopupLine {
            caption: None,
            text: text.to_string(),
        };
        match self {
            PopupContent::Loading => vec![plain(LOADING_TEXT)],
            PopupContent::OutsideRaster => vec![plain(OUTSIDE_RASTER_TEXT)],
            PopupContent::NdviValue(value) => vec![PopupLine {
                caption: Some("📊 NDVI:"),
                text: value.map_or_else(|| "No data".to_string(), format_ndvi),
            }],
            PopupContent::Prediction {
                predicted_crop,
                crop_name,
                khasra_no,
                area,
            } => vec![
                PopupLine {
                    caption: Some("🌾 अनुमानित रबी फसल:"),
                    text: predicted_crop.clone(),
                },
                PopupLine {
                    caption: Some("🌾 वास्तविक रबी फसल:"),
                    text: crop_name.clone(),
                },
                PopupLine {
                    caption: Some("खसरा नंबर:"),
                    text: khasra_no.clone(),
                },
                PopupLine {
                    caption: Some("क्षेत्रफल (ha):"),
                    text: area.clone(),
                },
            ],
        }
    }
}

/// Popup bubble anchored above `(x, y)` in map-container pixels.
#[component]
pub fn PopupBubble(
    x: f64,
    y: f64,
    lines: Vec<PopupLine>,
    #[prop(into)] on_close: Callback<()>,
) -> impl IntoView {
    view! {
        <div
            class="map-popup"
            style:left=format!("{x}px")
            style:top=format!("{y}px")
            on:pointerdown=|e: web_sys::PointerEvent| e.stop_propagation()
            on:wheel=|e: web_sys::WheelEvent| e.stop_propagation()
        >
            <button class="map-popup-close" on:click=move |_| on_close.run(())>"×"</button>
            <div class="map-popup-body">
                {lines
                    .into_iter()
                    .map(|line| {
                        view! {
                            <div>
                                {line.caption.map(|c| view! { <b>{c}</b>" " })}
                                {line.text}
                            </div>
                        }
                    })
                    .collect_view()}
            </div>
        </div>
    }
}
