use rabi_shared::colors::parse_hex;

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

/// Apply an alpha to a hex color. Colors that are not hex pass through opaque.
pub fn with_alpha(color: &str, alpha: f64) -> String {
    match parse_hex(color) {
        Some((r, g, b)) => rgba_css(r, g, b, alpha),
        None => color.to_string(),
    }
}
