//! Zoom-dependent sizing for parcel-number labels.

/// Below this zoom, labels are hidden.
pub const LABEL_MIN_ZOOM: f64 = 16.0;
pub const LABEL_MIN_FONT_PX: f64 = 10.0;
pub const LABEL_MAX_FONT_PX: f64 = 16.0;
/// Font growth per zoom level above [`LABEL_MIN_ZOOM`].
pub const LABEL_FONT_STEP_PX: f64 = 2.0;

/// Font size in CSS pixels for parcel labels at `zoom`; `0.0` means hidden.
pub fn label_font_size(zoom: f64) -> f64 {
    if zoom.is_nan() || zoom < LABEL_MIN_ZOOM {
        return 0.0;
    }
    let size = LABEL_MIN_FONT_PX + (zoom - LABEL_MIN_ZOOM) * LABEL_FONT_STEP_PX;
    size.clamp(LABEL_MIN_FONT_PX, LABEL_MAX_FONT_PX)
}
