#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

//! Canvas 2D painting of one map: base tiles, raster overlays, vectors, labels.

use std::collections::HashSet;

use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::colors::with_alpha;
use crate::labels::LabelLayer;
use crate::layers::{ImageOverlay, Layer, MapState, VectorLayer};
use crate::tiles::{ImageStore, visible_tiles};
use crate::viewport::{MapViewport, TILE_SIZE};

const TILE_BACKGROUND: &str = "#ddd";
const PLANE_BACKGROUND: &str = "#f2f2f2";
const LABEL_TEXT: &str = "#1b1b1b";
const LABEL_HALO: &str = "rgba(255,255,255,0.85)";

pub fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .ok()
        .flatten()?
        .dyn_into::<CanvasRenderingContext2d>()
        .ok()
}

/// Match the backing store to the CSS size at the device pixel ratio and
/// reset the transform so drawing happens in CSS pixels.
pub fn fit_backing_store(canvas: &HtmlCanvasElement, ctx: &CanvasRenderingContext2d, w: f64, h: f64) {
    let dpr = web_sys::window()
        .map(|win| win.device_pixel_ratio())
        .unwrap_or(1.0);
    let bw = (w * dpr).round().max(1.0) as u32;
    let bh = (h * dpr).round().max(1.0) as u32;
    if canvas.width() != bw || canvas.height() != bh {
        canvas.set_width(bw);
        canvas.set_height(bh);
    }
    let _ = ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
}

/// Layers keep insertion order within a pass; rasters always sit under
/// vectors, and labels on top.
pub fn paint_map(
    ctx: &CanvasRenderingContext2d,
    map: &MapState,
    tiles: &ImageStore,
    overlays: &ImageStore,
) {
    let vp = &map.viewport;
    ctx.set_global_alpha(1.0);
    ctx.set_fill_style_str(if map.base_tiles {
        TILE_BACKGROUND
    } else {
        PLANE_BACKGROUND
    });
    ctx.fill_rect(0.0, 0.0, vp.width, vp.height);

    if map.base_tiles {
        paint_tiles(ctx, vp, tiles);
    }

    let wanted: HashSet<String> = map.layers.image_sources().map(str::to_string).collect();
    for layer in map.layers.iter() {
        if let Layer::Image(overlay) = layer {
            paint_image(ctx, vp, overlay, overlays);
        }
    }
    overlays.retain(&wanted, wanted.len());

    for layer in map.layers.iter() {
        if let Layer::Vector(vector) = layer {
            paint_vector(ctx, vp, vector);
        }
    }
    for layer in map.layers.iter() {
        if let Layer::Labels(labels) = layer {
            paint_labels(ctx, vp, labels);
        }
    }
}

fn paint_tiles(ctx: &CanvasRenderingContext2d, vp: &MapViewport, tiles: &ImageStore) {
    let keys = visible_tiles(vp);
    let wanted: HashSet<String> = keys.iter().map(|k| k.url()).collect();
    for key in &keys {
        let Some(img) = tiles.get(&key.url()) else {
            continue;
        };
        let (x, y) = key.screen_origin(vp);
        let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
            &img,
            x.round(),
            y.round(),
            TILE_SIZE,
            TILE_SIZE,
        );
    }
    tiles.retain_tiles(&wanted);
}

fn paint_image(
    ctx: &CanvasRenderingContext2d,
    vp: &MapViewport,
    overlay: &ImageOverlay,
    overlays: &ImageStore,
) {
    let Some(img) = overlays.get(&overlay.src) else {
        return;
    };
    let (x0, y0) = vp.latlng_to_screen(overlay.bounds.north_west());
    let (x1, y1) = vp.latlng_to_screen(overlay.bounds.south_east());
    ctx.set_global_alpha(overlay.opacity.clamp(0.0, 1.0));
    let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(&img, x0, y0, x1 - x0, y1 - y0);
    ctx.set_global_alpha(1.0);
}

fn paint_vector(ctx: &CanvasRenderingContext2d, vp: &MapViewport, vector: &VectorLayer) {
    let style = &vector.style;
    ctx.set_line_join("round");
    ctx.set_line_cap("round");
    ctx.set_line_width(style.weight);
    ctx.set_stroke_style_str(&style.stroke);
    if let Some(fill) = &style.fill {
        ctx.set_fill_style_str(&with_alpha(&fill.color, fill.opacity));
    }

    for shape in &vector.shapes {
        ctx.begin_path();
        for ring in &shape.rings {
            let mut points = ring.iter().map(|p| vp.latlng_to_screen(*p));
            let Some((x, y)) = points.next() else {
                continue;
            };
            ctx.move_to(x, y);
            for (x, y) in points {
                ctx.line_to(x, y);
            }
            if shape.closed {
                ctx.close_path();
            }
        }
        if shape.closed && style.fill.is_some() {
            ctx.fill();
        }
        ctx.stroke();
    }
}

fn paint_labels(ctx: &CanvasRenderingContext2d, vp: &MapViewport, labels: &LabelLayer) {
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.set_line_join("round");
    let mut font_px = 0.0;
    for (label, style) in labels.iter() {
        if !style.visible {
            continue;
        }
        let (x, y) = vp.latlng_to_screen(label.anchor);
        if x < -50.0 || y < -20.0 || x > vp.width + 50.0 || y > vp.height + 20.0 {
            continue;
        }
        if style.font_px != font_px {
            font_px = style.font_px;
            ctx.set_font(&format!("600 {font_px}px sans-serif"));
            ctx.set_line_width((font_px / 4.0).max(2.0));
        }
        ctx.set_stroke_style_str(LABEL_HALO);
        let _ = ctx.stroke_text(&label.text, x, y);
        ctx.set_fill_style_str(LABEL_TEXT);
        let _ = ctx.fill_text(&label.text, x, y);
    }
}
