#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

//! OpenStreetMap base tiles and the image loader shared by tiles and
//! raster overlays.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use js_sys::Reflect;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

use crate::viewport::{MapViewport, Projection, TILE_SIZE};

pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";
pub const MAX_TILE_ZOOM: f64 = 19.0;
const OSM_SUBDOMAINS: [char; 3] = ['a', 'b', 'c'];
const TILE_CONCURRENCY: usize = 6;
const OVERLAY_CONCURRENCY: usize = 2;
const TILE_CACHE_LIMIT: usize = 400;
/// A failed image stays wanted; it is requested again after this long.
const RETRY_AFTER_MS: f64 = 5_000.0;
const ONLOAD_HANDLE_KEY: &str = "__rabiImageOnload";
const ONERROR_HANDLE_KEY: &str = "__rabiImageOnerror";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn url(&self) -> String {
        let s = OSM_SUBDOMAINS[((self.x + self.y) % 3) as usize];
        format!(
            "https://{s}.tile.openstreetmap.org/{}/{}/{}.png",
            self.z, self.x, self.y
        )
    }

    /// Top-left corner of the tile in screen pixels.
    pub fn screen_origin(&self, vp: &MapViewport) -> (f64, f64) {
        let (ox, oy) = vp.pixel_origin();
        (
            f64::from(self.x) * TILE_SIZE - ox,
            f64::from(self.y) * TILE_SIZE - oy,
        )
    }
}

/// Tiles covering the viewport, nearest to the center first. Pixel-plane
/// viewports have no tiles.
pub fn visible_tiles(vp: &MapViewport) -> Vec<TileKey> {
    if vp.projection != Projection::WebMercator || vp.zoom > MAX_TILE_ZOOM || vp.zoom < 0.0 {
        return Vec::new();
    }
    let z = vp.zoom as u8;
    let max_index = (1i64 << z) - 1;
    let (ox, oy) = vp.pixel_origin();
    let range = |start: f64, len: f64| {
        let first = ((start / TILE_SIZE).floor() as i64).clamp(0, max_index);
        let last = (((start + len) / TILE_SIZE).floor() as i64).clamp(0, max_index);
        first..=last
    };

    let center_x = (ox + vp.width / 2.0) / TILE_SIZE;
    let center_y = (oy + vp.height / 2.0) / TILE_SIZE;
    let mut tiles: Vec<TileKey> = range(ox, vp.width)
        .flat_map(|x| {
            range(oy, vp.height).map(move |y| TileKey {
                z,
                x: x as u32,
                y: y as u32,
            })
        })
        .collect();
    tiles.sort_by(|a, b| {
        let da = (f64::from(a.x) + 0.5 - center_x).powi(2) + (f64::from(a.y) + 0.5 - center_y).powi(2);
        let db = (f64::from(b.x) + 0.5 - center_x).powi(2) + (f64::from(b.y) + 0.5 - center_y).powi(2);
        da.total_cmp(&db)
    });
    tiles
}

/// Loads images by URL with bounded concurrency. Every finished load bumps
/// `revision` so renderers tracking it repaint.
#[derive(Clone)]
pub struct ImageStore {
    inner: Rc<StoreInner>,
}

struct StoreInner {
    loaded: RefCell<HashMap<String, HtmlImageElement>>,
    /// Failed srcs with the time (ms) of the failure.
    failed: RefCell<HashMap<String, f64>>,
    queue: RefCell<VecDeque<String>>,
    pending: RefCell<HashSet<String>>,
    in_flight: Cell<usize>,
    max_concurrency: usize,
    revision: RwSignal<u64>,
}

impl ImageStore {
    fn with_concurrency(max_concurrency: usize, revision: RwSignal<u64>) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                loaded: RefCell::new(HashMap::new()),
                failed: RefCell::new(HashMap::new()),
                queue: RefCell::new(VecDeque::new()),
                pending: RefCell::new(HashSet::new()),
                in_flight: Cell::new(0),
                max_concurrency,
                revision,
            }),
        }
    }

    pub fn for_tiles(revision: RwSignal<u64>) -> Self {
        Self::with_concurrency(TILE_CONCURRENCY, revision)
    }

    pub fn for_overlays(revision: RwSignal<u64>) -> Self {
        Self::with_concurrency(OVERLAY_CONCURRENCY, revision)
    }

    /// The decoded image, or `None` while it loads. The first miss queues it;
    /// a failed src is queued again once its retry is due.
    pub fn get(&self, src: &str) -> Option<HtmlImageElement> {
        if let Some(img) = self.inner.loaded.borrow().get(src) {
            return Some(img.clone());
        }
        let failed_at = self.inner.failed.borrow().get(src).copied();
        if failed_at.is_some_and(|at| !retry_due(at, js_sys::Date::now())) {
            return None;
        }
        if self.inner.pending.borrow_mut().insert(src.to_string()) {
            self.inner.failed.borrow_mut().remove(src);
            self.inner.queue.borrow_mut().push_back(src.to_string());
            pump_queue(self.inner.clone());
        }
        None
    }

    /// Drop queued requests for images no longer wanted and evict loaded
    /// ones once the cache grows past `limit`. Failures of unwanted images
    /// are forgotten, so wanting one again requests it at once.
    pub fn retain(&self, wanted: &HashSet<String>, limit: usize) {
        forget_unwanted_failures(&mut self.inner.failed.borrow_mut(), wanted);
        {
            let mut queue = self.inner.queue.borrow_mut();
            let mut pending = self.inner.pending.borrow_mut();
            queue.retain(|src| {
                let keep = wanted.contains(src);
                if !keep {
                    pending.remove(src);
                }
                keep
            });
        }
        let mut loaded = self.inner.loaded.borrow_mut();
        if loaded.len() > limit {
            loaded.retain(|src, _| wanted.contains(src));
        }
    }

    pub fn retain_tiles(&self, wanted: &HashSet<String>) {
        self.retain(wanted, TILE_CACHE_LIMIT);
    }
}

fn retry_due(failed_at: f64, now: f64) -> bool {
    now - failed_at >= RETRY_AFTER_MS
}

fn forget_unwanted_failures(failed: &mut HashMap<String, f64>, wanted: &HashSet<String>) {
    failed.retain(|src, _| wanted.contains(src));
}

fn pump_queue(inner: Rc<StoreInner>) {
    while inner.in_flight.get() < inner.max_concurrency {
        let Some(src) = inner.queue.borrow_mut().pop_front() else {
            break;
        };
        inner.in_flight.set(inner.in_flight.get() + 1);
        load_image(inner.clone(), src);
    }
}

fn finish(inner: &Rc<StoreInner>, src: &str, image: Option<HtmlImageElement>) {
    inner.pending.borrow_mut().remove(src);
    inner.in_flight.set(inner.in_flight.get().saturating_sub(1));
    match image {
        Some(img) => {
            inner.loaded.borrow_mut().insert(src.to_string(), img);
            inner.revision.update(|r| *r = r.wrapping_add(1));
        }
        None => {
            inner
                .failed
                .borrow_mut()
                .insert(src.to_string(), js_sys::Date::now());
            // Repaint once the retry is due so a still-wanted image is asked for again.
            let revision = inner.revision;
            Timeout::new(RETRY_AFTER_MS as u32, move || {
                let _ = revision.try_update(|r| *r = r.wrapping_add(1));
            })
            .forget();
        }
    }
    pump_queue(inner.clone());
}

fn load_image(inner: Rc<StoreInner>, src: String) {
    let img = match HtmlImageElement::new() {
        Ok(img) => img,
        Err(_) => {
            finish(&inner, &src, None);
            return;
        }
    };

    let img_for_load = img.clone();
    let inner_load = inner.clone();
    let src_load = src.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);
        let img = img_for_load.clone();
        let inner = inner_load.clone();
        let src = src_load.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = JsFuture::from(img.decode()).await;
            finish(&inner, &src, Some(img));
        });
    });

    let img_for_error = img.clone();
    let inner_error = inner.clone();
    let src_error = src.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
        web_sys::console::warn_1(&format!("image failed to load: {src_error}").into());
        finish(&inner_error, &src_error, None);
    });

    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY), &onload_js);
    let _ = Reflect::set(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY), &onerror_js);
    img.set_src(&src);
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}
