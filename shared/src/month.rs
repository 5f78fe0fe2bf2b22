use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Acquisition months of the Rabi season imagery, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Month {
    #[default]
    Nov,
    Dec,
    Jan,
    Feb,
}

impl Month {
    pub const ALL: [Month; 4] = [Month::Nov, Month::Dec, Month::Jan, Month::Feb];

    /// Wire and query-string form (`?month=Dec`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Month::Nov => "Nov",
            Month::Dec => "Dec",
            Month::Jan => "Jan",
            Month::Feb => "Feb",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == raw.trim())
    }

    /// Date the scene for this month was captured.
    pub fn acquisition_date(self) -> NaiveDate {
        let (y, m, d) = match self {
            Month::Nov => (2024, 11, 14),
            Month::Dec => (2024, 12, 16),
            Month::Jan => (2025, 1, 25),
            Month::Feb => (2025, 2, 23),
        };
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    /// Text for the comparison viewer's date badge, e.g. `📅 16 December 2024`.
    pub fn date_label(self) -> String {
        format!("📅 {}", self.acquisition_date().format("%-d %B %Y"))
    }
}
