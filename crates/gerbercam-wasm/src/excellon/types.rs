//! Excellon drill file types.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::units::UnitSystem;

/// Result of parsing one Excellon drill file.
///
/// Tool identifiers are kept exactly as written (`"01"`, `"1"`), so `T01` and
/// `T1` are distinct tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillParseResult {
    /// Unit system of the tool table.
    pub units: UnitSystem,
    /// Tool id to diameter, in file units.
    pub tool_table: BTreeMap<String, f64>,
    /// Tool id to diameter, in millimeters.
    pub tool_table_mm: BTreeMap<String, f64>,
    /// Coordinate lines attributed to each selected tool.
    pub holes_by_tool: BTreeMap<String, usize>,
    /// Raw `X..Y..` coordinate records in the whole file.
    pub total_holes: usize,
    /// Sum of `holes_by_tool`; may differ from `total_holes`.
    pub tool_attributed_holes: usize,
    /// Unique hole diameters in millimeters, ascending.
    pub hole_sizes_mm: Vec<f64>,
    /// Smallest tool diameter in millimeters.
    pub min_hole_size_mm: Option<f64>,
    /// Largest tool diameter in millimeters.
    pub max_hole_size_mm: Option<f64>,
    /// Attributed hole count per raw diameter.
    pub hole_counts_by_size: BTreeMap<String, usize>,
    /// Number of distinct raw tool diameters.
    pub unique_hole_sizes: usize,
    /// Parser warnings encountered while processing the file.
    pub warnings: Vec<String>,
}

impl DrillParseResult {
    /// Number of defined tools.
    pub fn tools_count(&self) -> usize {
        self.tool_table.len()
    }
}
