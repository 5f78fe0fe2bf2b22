use gloo_storage::Storage;
use rabi_shared::LatLng;
use serde::{Deserialize, Serialize};

const CONFIG_KEY: &str = "rabi_viewer_config";

/// Deployment knobs, read once at startup from `localStorage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub api_base: String,
    /// Drop responses to requests a newer one has superseded.
    pub discard_stale_responses: bool,
    /// `[lat, lng]` shown before the NDVI bounds arrive.
    pub initial_center: [f64; 2],
    pub initial_zoom: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base: "https://127.0.0.1:8000".to_string(),
            discard_stale_responses: true,
            initial_center: [26.9, 75.8],
            initial_zoom: 6.0,
        }
    }
}

impl ViewerConfig {
    /// Stored config (or defaults), with `?api=` taking precedence.
    pub fn load() -> Self {
        let stored: Self = gloo_storage::LocalStorage::get(CONFIG_KEY).unwrap_or_default();
        let api = page_search()
            .and_then(|search| query_value(&search, "api"))
            .and_then(|raw| js_sys::decode_uri_component(&raw).ok())
            .map(String::from);
        stored.with_api_override(api)
    }

    pub fn with_api_override(mut self, api: Option<String>) -> Self {
        if let Some(api) = api.filter(|a| !a.trim().is_empty()) {
            self.api_base = api.trim().to_string();
        }
        self
    }

    pub fn initial_center(&self) -> LatLng {
        LatLng::new(self.initial_center[0], self.initial_center[1])
    }
}

/// Which viewer the page hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKind {
    Primary,
    Comparison,
}

impl ViewerKind {
    pub fn from_location(path: &str, search: &str) -> Self {
        let path = path.trim_end_matches('/');
        let compare_page = path.ends_with("/visualize")
            || path.ends_with("/visualize.html")
            || path == "visualize"
            || path == "visualize.html";
        if compare_page || query_value(search, "view").as_deref() == Some("compare") {
            ViewerKind::Comparison
        } else {
            ViewerKind::Primary
        }
    }

    pub fn current() -> Self {
        let location = web_sys::window().map(|w| w.location());
        let path = location
            .as_ref()
            .and_then(|l| l.pathname().ok())
            .unwrap_or_default();
        Self::from_location(&path, &page_search().unwrap_or_default())
    }
}

fn page_search() -> Option<String> {
    web_sys::window()?.location().search().ok()
}

/// Raw (still percent-encoded) value of `key` in a `?a=b&c=d` string.
pub fn query_value(search: &str, key: &str) -> Option<String> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}
