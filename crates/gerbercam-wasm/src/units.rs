//! Unit systems and millimeter normalization.

use serde::{Deserialize, Serialize};

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Unit system declared by (or assumed for) a manufacturing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSystem {
    /// Metric (millimeters).
    #[serde(rename = "MM")]
    Millimeters,
    /// Imperial (inches).
    #[serde(rename = "IN")]
    Inches,
    /// No unit declaration was found.
    #[serde(rename = "unknown")]
    Unknown,
}

impl UnitSystem {
    /// Converts a length in this unit system to millimeters.
    ///
    /// `Unknown` is treated as millimeters.
    pub fn to_mm(self, value: f64) -> f64 {
        match self {
            Self::Inches => value * MM_PER_INCH,
            Self::Millimeters | Self::Unknown => value,
        }
    }
}

impl From<&gerber_types::Unit> for UnitSystem {
    fn from(unit: &gerber_types::Unit) -> Self {
        match unit {
            gerber_types::Unit::Millimeters => Self::Millimeters,
            gerber_types::Unit::Inches => Self::Inches,
        }
    }
}

/// Rounds `value` to `digits` decimal places for presentation.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
