//! Interactive map widget: canvas rendering, pan/zoom input, popup and
//! controls overlay. Generic over the viewer state that owns the map.

use std::cell::Cell;
use std::rc::Rc;

use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use rabi_shared::LatLng;
use wasm_bindgen::JsCast;
use web_sys::{MouseEvent, PointerEvent, TouchEvent, WheelEvent};

use crate::canvas::{context_2d, fit_backing_store, paint_map};
use crate::layers::MapState;
use crate::popup::PopupBubble;
use crate::render_loop::RenderScheduler;
use crate::tiles::{ImageStore, OSM_ATTRIBUTION};
use crate::viewport::MapViewport;

/// Movement (CSS px) under which a press-release counts as a click.
const CLICK_SLOP_PX: f64 = 5.0;
/// Minimum time between two wheel zoom steps.
const WHEEL_STEP_MS: f64 = 120.0;
/// Finger-distance ratio that triggers one pinch zoom step.
const PINCH_STEP_RATIO: f64 = 1.5;

/// Picks one map out of a viewer's state.
pub struct MapLens<S> {
    get: fn(&S) -> &MapState,
    get_mut: fn(&mut S) -> &mut MapState,
}

impl<S> Clone for MapLens<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for MapLens<S> {}

impl<S> MapLens<S> {
    pub const fn new(get: fn(&S) -> &MapState, get_mut: fn(&mut S) -> &mut MapState) -> Self {
        Self { get, get_mut }
    }

    pub fn map<'a>(&self, state: &'a S) -> &'a MapState {
        (self.get)(state)
    }

    pub fn map_mut<'a>(&self, state: &'a mut S) -> &'a mut MapState {
        (self.get_mut)(state)
    }
}

fn is_click(start: (f64, f64), end: (f64, f64)) -> bool {
    (end.0 - start.0).abs() < CLICK_SLOP_PX && (end.1 - start.1).abs() < CLICK_SLOP_PX
}

/// Wheel down zooms out, wheel up zooms in, one level per event.
fn wheel_step(delta_y: f64) -> i32 {
    if delta_y > 0.0 {
        -1
    } else if delta_y < 0.0 {
        1
    } else {
        0
    }
}

fn pinch_step(start_dist: f64, dist: f64) -> i32 {
    if start_dist <= 0.0 {
        return 0;
    }
    let ratio = dist / start_dist;
    if ratio >= PINCH_STEP_RATIO {
        1
    } else if ratio <= 1.0 / PINCH_STEP_RATIO {
        -1
    } else {
        0
    }
}

fn touch_pair(e: &TouchEvent) -> Option<((f64, f64), (f64, f64))> {
    let touches = e.touches();
    if touches.length() != 2 {
        return None;
    }
    let (t0, t1) = (touches.get(0)?, touches.get(1)?);
    Some((
        (t0.client_x() as f64, t0.client_y() as f64),
        (t1.client_x() as f64, t1.client_y() as f64),
    ))
}

#[component]
pub fn MapView<S>(
    state: RwSignal<S>,
    lens: MapLens<S>,
    #[prop(optional, into)] on_click: Option<Callback<LatLng>>,
    /// Runs after every change of zoom level, with the new level.
    #[prop(optional, into)]
    on_zoom_end: Option<Callback<f64>>,
    #[prop(optional)] children: Option<Children>,
) -> impl IntoView
where
    S: Send + Sync + 'static,
{
    let container_ref = NodeRef::<html::Div>::new();
    let canvas_ref = NodeRef::<html::Canvas>::new();

    let tile_rev = RwSignal::new(0u64);
    let image_rev = RwSignal::new(0u64);
    let tiles = ImageStore::for_tiles(tile_rev);
    let overlays = ImageStore::for_overlays(image_rev);

    let scheduler = Rc::new(RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return;
        };
        let Some(ctx) = context_2d(&canvas) else {
            return;
        };
        state.try_with_untracked(|s| {
            let map = lens.map(s);
            fit_backing_store(&canvas, &ctx, map.viewport.width, map.viewport.height);
            paint_map(&ctx, map, &tiles, &overlays);
        });
    }));

    let sched = scheduler.clone();
    Effect::new(move || {
        state.track();
        tile_rev.track();
        image_rev.track();
        sched.mark_dirty();
    });

    // Zoom changes funnel through here so listeners see every zoom-end.
    let change_zoom = move |f: &dyn Fn(&mut MapViewport) -> bool| {
        let changed = state
            .try_update(|s| f(&mut lens.map_mut(s).viewport))
            .unwrap_or(false);
        if changed
            && let Some(cb) = on_zoom_end
            && let Some(zoom) = state.try_with_untracked(|s| lens.map(s).viewport.zoom)
        {
            cb.run(zoom);
        }
    };

    let sync_size = move || {
        let Some(container) = container_ref.get_untracked() else {
            return;
        };
        let w = container.client_width() as f64;
        let h = container.client_height() as f64;
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let unchanged = state
            .try_with_untracked(|s| {
                let vp = &lens.map(s).viewport;
                vp.width == w && vp.height == h
            })
            .unwrap_or(true);
        if !unchanged {
            state.update(|s| lens.map_mut(s).viewport.resize(w, h));
        }
    };

    Effect::new(move || {
        if container_ref.get().is_some() {
            sync_size();
        }
    });
    let resize_handle = window_event_listener(ev::resize, move |_| sync_size());
    on_cleanup(move || resize_handle.remove());

    let local_point = move |client_x: f64, client_y: f64| -> (f64, f64) {
        canvas_ref
            .get_untracked()
            .map(|el| {
                let rect = el.get_bounding_client_rect();
                (client_x - rect.left(), client_y - rect.top())
            })
            .unwrap_or((client_x, client_y))
    };

    // Drag state
    let dragging = Rc::new(Cell::new(false));
    let press = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last_wheel = Rc::new(Cell::new(0.0f64));
    let pinch_start = Rc::new(Cell::new(0.0f64));

    let on_pointer_down = {
        let dragging = dragging.clone();
        let press = press.clone();
        let last = last.clone();
        move |e: PointerEvent| {
            if !e.is_primary() {
                return;
            }
            let at = (e.client_x() as f64, e.client_y() as f64);
            dragging.set(true);
            press.set(at);
            last.set(at);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let dragging = dragging.clone();
        let last = last.clone();
        move |e: PointerEvent| {
            if !dragging.get() || !e.is_primary() {
                return;
            }
            let (lx, ly) = last.get();
            let (x, y) = (e.client_x() as f64, e.client_y() as f64);
            last.set((x, y));
            state.update(|s| lens.map_mut(s).viewport.pan_by(x - lx, y - ly));
        }
    };

    let on_pointer_up = {
        let dragging = dragging.clone();
        move |e: PointerEvent| {
            dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_canvas_click = {
        let press = press.clone();
        move |e: MouseEvent| {
            let (x, y) = (e.client_x() as f64, e.client_y() as f64);
            if !is_click(press.get(), (x, y)) {
                return;
            }
            let Some(cb) = on_click else {
                return;
            };
            let (sx, sy) = local_point(x, y);
            if let Some(at) = state.try_with_untracked(|s| lens.map(s).viewport.screen_to_latlng(sx, sy)) {
                cb.run(at);
            }
        }
    };

    let on_wheel = {
        move |e: WheelEvent| {
            e.prevent_default();
            let steps = wheel_step(e.delta_y());
            let now = js_sys::Date::now();
            if steps == 0 || now - last_wheel.get() < WHEEL_STEP_MS {
                return;
            }
            last_wheel.set(now);
            let (sx, sy) = local_point(e.client_x() as f64, e.client_y() as f64);
            change_zoom(&|vp: &mut MapViewport| vp.zoom_step(steps, sx, sy));
        }
    };

    let on_touch_start = {
        let pinch_start = pinch_start.clone();
        let dragging = dragging.clone();
        move |e: TouchEvent| {
            if let Some((a, b)) = touch_pair(&e) {
                e.prevent_default();
                dragging.set(false);
                pinch_start.set(((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt());
            }
        }
    };

    let on_touch_move = {
        move |e: TouchEvent| {
            let Some((a, b)) = touch_pair(&e) else {
                return;
            };
            e.prevent_default();
            let dist = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
            let steps = pinch_step(pinch_start.get(), dist);
            if steps == 0 {
                return;
            }
            pinch_start.set(dist);
            let (sx, sy) = local_point((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
            change_zoom(&|vp: &mut MapViewport| vp.zoom_step(steps, sx, sy));
        }
    };

    let zoom_by = move |steps: i32| {
        change_zoom(&|vp: &mut MapViewport| {
            let (cx, cy) = (vp.width / 2.0, vp.height / 2.0);
            vp.zoom_step(steps, cx, cy)
        });
    };

    let popup = Memo::new(move |_| {
        state.with(|s| {
            let map = lens.map(s);
            map.popup.as_ref().map(|p| {
                let (x, y) = map.viewport.latlng_to_screen(p.anchor);
                (x, y, p.content.lines())
            })
        })
    });
    let close_popup = Callback::new(move |()| state.update(|s| lens.map_mut(s).close_popup()));
    let base_tiles = state.with_untracked(|s| lens.map(s).base_tiles);

    view! {
        <div class="map-view" node_ref=container_ref>
            <canvas
                class="map-canvas"
                node_ref=canvas_ref
                on:pointerdown=on_pointer_down
                on:pointermove=on_pointer_move
                on:pointerup=on_pointer_up
                on:pointercancel=move |_| dragging.set(false)
                on:click=on_canvas_click
                on:wheel=on_wheel
                on:touchstart=on_touch_start
                on:touchmove=on_touch_move
            ></canvas>
            <div class="map-zoom">
                <button title="Zoom in" on:click=move |_| zoom_by(1)>"+"</button>
                <button title="Zoom out" on:click=move |_| zoom_by(-1)>"−"</button>
            </div>
            {move || {
                popup
                    .get()
                    .map(|(x, y, lines)| {
                        view! { <PopupBubble x=x y=y lines=lines on_close=close_popup /> }
                    })
            }}
            <div class="map-controls">{children.map(|c| c())}</div>
            {base_tiles.then(|| view! { <div class="map-attribution">{OSM_ATTRIBUTION}</div> })}
        </div>
    }
}
