//! Geometry for the NDVI trend chart: fixed axes plus spline control points.

use crate::api::NdviByMonth;
use crate::month::Month;

pub const Y_MIN: f64 = -0.4;
pub const Y_MAX: f64 = 1.0;
pub const Y_TICK_STEP: f64 = 0.2;
pub const LINE_TENSION: f64 = 0.3;
pub const SERIES_LABEL: &str = "NDVI Trend";
pub const Y_AXIS_TITLE: &str = "NDVI";

/// Four monthly samples in category order (Nov, Dec, Jan, Feb).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSeries {
    values: [Option<f64>; 4],
}

impl TrendSeries {
    /// `None` when no month has a value, i.e. nothing would be drawn.
    pub fn from_ndvi(ndvi: &NdviByMonth) -> Option<Self> {
        let values = ndvi.values();
        values
            .iter()
            .any(Option::is_some)
            .then_some(Self { values })
    }

    pub fn values(&self) -> [Option<f64>; 4] {
        self.values
    }

    pub fn categories() -> [&'static str; 4] {
        Month::ALL.map(Month::as_str)
    }

    /// Runs of consecutive present values as `(category index, value)`.
    /// Missing months split the line.
    pub fn runs(&self) -> Vec<Vec<(usize, f64)>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for (i, v) in self.values.iter().enumerate() {
            match v {
                Some(v) => current.push((i, *v)),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}

/// Tick values on the fixed value axis, bottom to top.
pub fn y_ticks() -> Vec<f64> {
    let steps = ((Y_MAX - Y_MIN) / Y_TICK_STEP).round() as usize;
    (0..=steps)
        .map(|i| ((Y_MIN + i as f64 * Y_TICK_STEP) * 10.0).round() / 10.0)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

/// Incoming and outgoing bezier control points for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoints {
    pub before: ChartPoint,
    pub after: ChartPoint,
}

/// Cardinal-spline control points for a polyline, one pair per vertex.
///
/// Each vertex's tangent follows the chord between its neighbours, split in
/// proportion to the adjacent segment lengths; end vertices use themselves as
/// the missing neighbour. `tension == 0` yields straight segments.
pub fn spline_control_points(points: &[ChartPoint], tension: f64) -> Vec<ControlPoints> {
    (0..points.len())
        .map(|i| {
            let current = points[i];
            let previous = if i == 0 { current } else { points[i - 1] };
            let next = points.get(i + 1).copied().unwrap_or(current);

            let d01 = ((current.x - previous.x).powi(2) + (current.y - previous.y).powi(2)).sqrt();
            let d12 = ((next.x - current.x).powi(2) + (next.y - current.y).powi(2)).sqrt();
            let total = d01 + d12;
            let (s01, s12) = if total > 0.0 {
                (d01 / total, d12 / total)
            } else {
                (0.0, 0.0)
            };
            let fa = tension * s01;
            let fb = tension * s12;

            ControlPoints {
                before: ChartPoint {
                    x: current.x - fa * (next.x - previous.x),
                    y: current.y - fa * (next.y - previous.y),
                },
                after: ChartPoint {
                    x: current.x + fb * (next.x - previous.x),
                    y: current.y + fb * (next.y - previous.y),
                },
            }
        })
        .collect()
}
