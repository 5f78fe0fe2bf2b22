//! NDVI trend chart: the single-instance slot and its canvas renderer.

use leptos::html;
use leptos::prelude::*;
use rabi_shared::chart::{
    ChartPoint, LINE_TENSION, SERIES_LABEL, TrendSeries, Y_AXIS_TITLE, Y_MAX, Y_MIN,
    spline_control_points, y_ticks,
};
use web_sys::CanvasRenderingContext2d;

use crate::canvas::{context_2d, fit_backing_store};

const LINE_COLOR: &str = "green";
const FILL_COLOR: &str = "rgba(0,128,0,0.25)";
const POINT_RADIUS: f64 = 5.0;
const GRID_COLOR: &str = "rgba(0,0,0,0.1)";
const TEXT_COLOR: &str = "#666";

/// A drawn chart. Each draw gets a new id, so a redraw is always a distinct
/// instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInstance {
    pub id: u64,
    pub series: TrendSeries,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSlot {
    current: Option<ChartInstance>,
    drawn: u64,
}

impl ChartSlot {
    /// Replace whatever chart is on the canvas. Returns `true` if an older
    /// instance was destroyed.
    pub fn draw(&mut self, series: TrendSeries) -> bool {
        let destroyed = self.destroy();
        self.drawn += 1;
        self.current = Some(ChartInstance {
            id: self.drawn,
            series,
        });
        destroyed
    }

    pub fn destroy(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn current(&self) -> Option<&ChartInstance> {
        self.current.as_ref()
    }
}

/// Plot area inside the canvas, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotArea {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl PlotArea {
    fn for_canvas(width: f64, height: f64) -> Self {
        Self {
            left: 44.0,
            top: 28.0,
            right: (width - 12.0).max(56.0),
            bottom: (height - 26.0).max(40.0),
        }
    }

    /// Category centers, as in a category axis with offset.
    fn x_of(&self, index: usize, count: usize) -> f64 {
        let step = (self.right - self.left) / count as f64;
        self.left + step * (index as f64 + 0.5)
    }

    fn y_of(&self, value: f64) -> f64 {
        let t = (value - Y_MIN) / (Y_MAX - Y_MIN);
        self.bottom - t * (self.bottom - self.top)
    }

    fn clamp(&self, p: ChartPoint) -> ChartPoint {
        ChartPoint {
            x: p.x.clamp(self.left, self.right),
            y: p.y.clamp(self.top, self.bottom),
        }
    }
}

fn trace_run(ctx: &CanvasRenderingContext2d, area: &PlotArea, points: &[ChartPoint]) {
    let Some(first) = points.first() else {
        return;
    };
    let controls = spline_control_points(points, LINE_TENSION);
    ctx.move_to(first.x, first.y);
    for i in 1..points.len() {
        let c1 = area.clamp(controls[i - 1].after);
        let c2 = area.clamp(controls[i].before);
        ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, points[i].x, points[i].y);
    }
}

fn draw_axes(ctx: &CanvasRenderingContext2d, area: &PlotArea, categories: &[&str]) {
    ctx.set_stroke_style_str(GRID_COLOR);
    ctx.set_line_width(1.0);
    ctx.set_fill_style_str(TEXT_COLOR);
    ctx.set_font("11px sans-serif");
    ctx.set_text_align("right");
    ctx.set_text_baseline("middle");
    for tick in y_ticks() {
        let y = area.y_of(tick);
        ctx.begin_path();
        ctx.move_to(area.left, y);
        ctx.line_to(area.right, y);
        ctx.stroke();
        let _ = ctx.fill_text(&format!("{tick:.1}"), area.left - 6.0, y);
    }

    ctx.set_text_align("center");
    ctx.set_text_baseline("top");
    for (i, label) in categories.iter().enumerate() {
        let _ = ctx.fill_text(label, area.x_of(i, categories.len()), area.bottom + 6.0);
    }

    ctx.save();
    ctx.translate(12.0, (area.top + area.bottom) / 2.0).ok();
    ctx.rotate(-std::f64::consts::FRAC_PI_2).ok();
    ctx.set_text_baseline("middle");
    let _ = ctx.fill_text(Y_AXIS_TITLE, 0.0, 0.0);
    ctx.restore();
}

fn draw_legend(ctx: &CanvasRenderingContext2d, width: f64) {
    ctx.set_font("12px sans-serif");
    ctx.set_text_baseline("middle");
    ctx.set_text_align("left");
    let text_w = ctx
        .measure_text(SERIES_LABEL)
        .map(|m| m.width())
        .unwrap_or(70.0);
    let box_w = 30.0;
    let x = (width - box_w - 6.0 - text_w) / 2.0;
    ctx.set_fill_style_str(FILL_COLOR);
    ctx.fill_rect(x, 6.0, box_w, 12.0);
    ctx.set_stroke_style_str(LINE_COLOR);
    ctx.set_line_width(2.0);
    ctx.stroke_rect(x, 6.0, box_w, 12.0);
    ctx.set_fill_style_str(TEXT_COLOR);
    let _ = ctx.fill_text(SERIES_LABEL, x + box_w + 6.0, 12.0);
}

/// Screen points of each unbroken run, values clamped to the fixed axis.
fn plot_runs(area: &PlotArea, series: &TrendSeries) -> Vec<Vec<ChartPoint>> {
    let count = TrendSeries::categories().len();
    series
        .runs()
        .into_iter()
        .map(|run| {
            run.into_iter()
                .map(|(i, v)| ChartPoint {
                    x: area.x_of(i, count),
                    y: area.y_of(v.clamp(Y_MIN, Y_MAX)),
                })
                .collect()
        })
        .collect()
}

fn paint(ctx: &CanvasRenderingContext2d, width: f64, height: f64, series: &TrendSeries) {
    let area = PlotArea::for_canvas(width, height);
    let categories = TrendSeries::categories();
    draw_legend(ctx, width);
    draw_axes(ctx, &area, &categories);

    let runs = plot_runs(&area, series);

    // Line and points only; the area under the line stays unfilled.
    ctx.set_stroke_style_str(LINE_COLOR);
    ctx.set_line_width(3.0);
    for run in &runs {
        ctx.begin_path();
        trace_run(ctx, &area, run);
        ctx.stroke();
    }

    ctx.set_fill_style_str(FILL_COLOR);
    ctx.set_line_width(1.0);
    for p in runs.iter().flatten() {
        ctx.begin_path();
        let _ = ctx.arc(p.x, p.y, POINT_RADIUS, 0.0, std::f64::consts::TAU);
        ctx.fill();
        ctx.stroke();
    }
}

/// Canvas bound to one chart slot. The canvas is cleared whenever the slot's
/// instance changes, so at most one chart is ever painted on it.
#[component]
pub fn TrendChart(#[prop(into)] chart: Signal<Option<ChartInstance>>) -> impl IntoView {
    let canvas_ref = NodeRef::<html::Canvas>::new();

    Effect::new(move || {
        let instance = chart.get();
        let Some(canvas) = canvas_ref.get() else {
            return;
        };
        let Some(ctx) = context_2d(&canvas) else {
            return;
        };
        let width = f64::from(canvas.client_width().max(1));
        let height = f64::from(canvas.client_height().max(1));
        fit_backing_store(&canvas, &ctx, width, height);
        ctx.clear_rect(0.0, 0.0, width, height);

        if let Some(instance) = instance {
            paint(&ctx, width, height, &instance.series);
        }
    });

    view! { <canvas class="ndvi-chart" node_ref=canvas_ref></canvas> }
}
