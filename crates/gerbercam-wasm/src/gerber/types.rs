//! Gerber parse result types and the bounding-box accumulator.

use serde::Serialize;

use crate::units::UnitSystem;

/// Axis-aligned bounding box in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Minimum X coordinate.
    pub min_x: f64,
    /// Minimum Y coordinate.
    pub min_y: f64,
    /// Maximum X coordinate.
    pub max_x: f64,
    /// Maximum Y coordinate.
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates an empty bounding box that will expand with the first `update` call.
    pub const fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Expands the bounding box to include the given point.
    pub fn update(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Returns `true` until at least one point has been added.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Extent along X.
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    /// Extent along Y.
    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Which parsing strategy produced a [`GerberParseResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    /// Full RS-274X command decode.
    Geometry,
    /// Text scan over the first 10 KB.
    Heuristic,
}

/// Primitive tallies from a full command decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrimitiveCounts {
    /// Linear D01 strokes outside regions.
    pub lines: usize,
    /// Circular D01 strokes outside regions.
    pub arcs: usize,
    /// G36 region blocks.
    pub regions: usize,
    /// D03 flashes.
    pub flashes: usize,
}

impl PrimitiveCounts {
    /// Total number of primitives.
    pub const fn total(&self) -> usize {
        self.lines + self.arcs + self.regions + self.flashes
    }
}

/// Aperture table statistics, all sizes in millimeters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApertureStats {
    /// Number of declared apertures.
    pub count: usize,
    /// Smallest effective size.
    pub min_size: Option<f64>,
    /// Largest effective size.
    pub max_size: Option<f64>,
    /// Mean effective size.
    pub avg_size: Option<f64>,
    /// First 20 unique sizes, ascending.
    pub unique_sizes: Vec<f64>,
    /// Circular (and folded near-square oval) apertures.
    pub circular_count: usize,
    /// Rectangular apertures.
    pub rectangular_count: usize,
    /// Oval apertures with distinct sides.
    pub oval_count: usize,
}

/// Result of parsing one Gerber file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GerberParseResult {
    /// Strategy that produced this result.
    pub tier: ParseTier,
    /// Semantic role tag supplied by the caller, passed through untouched.
    pub file_type: Option<String>,
    /// Whether extended (RS-274X) parameters were found.
    pub is_rs274x: bool,
    /// Declared unit system.
    pub units: UnitSystem,
    /// First `%FS` line, verbatim.
    pub format_spec: Option<String>,
    /// Effective aperture sizes in mm; one entry per declared aperture.
    pub aperture_sizes: Vec<f64>,
    /// Summary statistics over `aperture_sizes`.
    pub apertures: ApertureStats,
    /// Primitive tallies; absent when only the heuristic tier succeeded.
    pub primitive_counts: Option<PrimitiveCounts>,
    /// Number of decoded commands; absent for the heuristic tier.
    pub statements_count: Option<usize>,
    /// Occurrences of `D01`, `D02` and `D03` in the scanned text.
    pub draw_commands: usize,
    /// Bounding box of decoded geometry in mm.
    pub bounds: Option<BoundingBox>,
    /// Width in mm; `None` means not determined.
    pub width_mm: Option<f64>,
    /// Height in mm; `None` means not determined.
    pub height_mm: Option<f64>,
    /// Non-fatal problems encountered while parsing.
    pub warnings: Vec<String>,
}

impl GerberParseResult {
    /// Unique aperture sizes, ascending.
    pub fn unique_aperture_sizes(&self) -> Vec<f64> {
        let mut sizes = self.aperture_sizes.clone();
        sizes.sort_by(f64::total_cmp);
        sizes.dedup();
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_has_zero_extent() {
        let bounds = BoundingBox::new();
        assert!(bounds.is_empty());
        assert!(bounds.width().abs() < f64::EPSILON);
        assert!(bounds.height().abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_expands_with_points() {
        let mut bounds = BoundingBox::new();
        bounds.update(1.0, 2.0);
        bounds.update(-3.0, 4.0);
        assert!((bounds.min_x - (-3.0)).abs() < f64::EPSILON);
        assert!((bounds.min_y - 2.0).abs() < f64::EPSILON);
        assert!((bounds.max_x - 1.0).abs() < f64::EPSILON);
        assert!((bounds.max_y - 4.0).abs() < f64::EPSILON);
        assert!((bounds.width() - 4.0).abs() < f64::EPSILON);
        assert!((bounds.height() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn primitive_total_sums_all_kinds() {
        let counts = PrimitiveCounts {
            lines: 3,
            arcs: 1,
            regions: 2,
            flashes: 4,
        };
        assert_eq!(counts.total(), 10);
    }
}
