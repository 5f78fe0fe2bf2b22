/// Rabi crop classes the prediction model emits, in legend order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CropClass {
    NoCrop,
    Gram,
    Wheat,
    Mustard,
    Other,
}

/// Stroke/fill color for a crop name that matches no known class.
pub const UNKNOWN_CROP_COLOR: &str = "#000";

impl CropClass {
    pub const ALL: [CropClass; 5] = [
        CropClass::NoCrop,
        CropClass::Gram,
        CropClass::Wheat,
        CropClass::Mustard,
        CropClass::Other,
    ];

    /// Display name, exactly as the backend spells it.
    pub const fn label(self) -> &'static str {
        match self {
            CropClass::NoCrop => "कोई फ़सल नहीं",
            CropClass::Gram => "चना",
            CropClass::Wheat => "गेहूँ",
            CropClass::Mustard => "सरसों",
            // ZWJ after the virama is part of the backend's spelling.
            CropClass::Other => "अन्\u{200d}य फसल",
        }
    }

    pub const fn color(self) -> &'static str {
        match self {
            CropClass::NoCrop => "#bdbdbd",
            CropClass::Gram => "#4daf4a",
            CropClass::Wheat => "#ffd92f",
            CropClass::Mustard => "#e41a1c",
            CropClass::Other => "#984ea3",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Highlight color for a predicted crop name.
pub fn crop_color(name: &str) -> &'static str {
    CropClass::from_label(name)
        .map(CropClass::color)
        .unwrap_or(UNKNOWN_CROP_COLOR)
}
