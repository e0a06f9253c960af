//! Excellon drill parser.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AnalysisError;
use crate::units::UnitSystem;

use super::types::DrillParseResult;

static RE_TOOL_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"T(\d+)C([\d.]+)").unwrap_or_else(|_| unreachable!("tool pattern is valid"))
});
static RE_TOOL_SELECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"T(\d+)").unwrap_or_else(|_| unreachable!("selection pattern is valid"))
});
static RE_HOLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"X([\d.]+)\s*Y([\d.]+)").unwrap_or_else(|_| unreachable!("hole pattern is valid"))
});

#[derive(Debug, Default)]
struct ScanState {
    current_tool: Option<String>,
    usage: BTreeMap<String, usize>,
    orphan_records: usize,
}

impl ScanState {
    fn scan_line(&mut self, line: &str) {
        if let Some(tool) = RE_TOOL_SELECTION
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        {
            self.usage.entry(tool.clone()).or_insert(0);
            self.current_tool = Some(tool);
        }

        if line.contains('X') && line.contains('Y') {
            match &self.current_tool {
                Some(tool) => *self.usage.entry(tool.clone()).or_insert(0) += 1,
                None => self.orphan_records += 1,
            }
        }
    }
}

/// Parse an Excellon drill file.
///
/// Tool definitions (`T<id>C<diameter>`) may appear anywhere; a later
/// definition of the same id replaces the earlier one. Every line carrying
/// both `X` and `Y` is attributed to the most recently mentioned tool.
///
/// # Errors
///
/// Returns [`AnalysisError::ParseFailure`] if the input is empty.
pub fn parse(data: &[u8]) -> Result<DrillParseResult, AnalysisError> {
    if data.is_empty() {
        return Err(AnalysisError::ParseFailure("empty input".to_string()));
    }

    let content = String::from_utf8_lossy(data);
    let mut warnings = Vec::new();

    let mut tool_table: BTreeMap<String, f64> = BTreeMap::new();
    for caps in RE_TOOL_DEFINITION.captures_iter(&content) {
        let (Some(id), Some(raw)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        match raw.as_str().parse::<f64>() {
            Ok(diameter) => {
                if tool_table.insert(id.as_str().to_string(), diameter).is_some() {
                    warnings.push(format!(
                        "duplicate tool definition for T{}; last definition wins",
                        id.as_str()
                    ));
                }
            }
            Err(err) => warnings.push(format!(
                "invalid diameter `{}` for T{}: {err}",
                raw.as_str(),
                id.as_str()
            )),
        }
    }

    let total_holes = RE_HOLE.find_iter(&content).count();

    let mut state = ScanState::default();
    for line in content.split('\n') {
        state.scan_line(line);
    }

    if state.orphan_records > 0 {
        warnings.push(format!(
            "{} coordinate records precede any tool selection",
            state.orphan_records
        ));
    }
    for tool in state.usage.keys() {
        if !tool_table.contains_key(tool) {
            warnings.push(format!("tool T{tool} selected but not defined"));
        }
    }

    let units = if content.to_uppercase().contains("METRIC") || content.contains("MM") {
        UnitSystem::Millimeters
    } else {
        UnitSystem::Inches
    };

    let tool_table_mm: BTreeMap<String, f64> = tool_table
        .iter()
        .map(|(id, diameter)| (id.clone(), units.to_mm(*diameter)))
        .collect();

    let mut hole_counts_by_size: BTreeMap<String, usize> = BTreeMap::new();
    for (id, diameter) in &tool_table {
        let count = state.usage.get(id).copied().unwrap_or(0);
        *hole_counts_by_size.entry(format!("{diameter:?}")).or_insert(0) += count;
    }

    let unique_hole_sizes = tool_table
        .values()
        .map(|diameter| diameter.to_bits())
        .collect::<BTreeSet<_>>()
        .len();

    let mut hole_sizes_mm: Vec<f64> = tool_table_mm.values().copied().collect();
    hole_sizes_mm.sort_by(f64::total_cmp);
    hole_sizes_mm.dedup();

    let tool_attributed_holes = state.usage.values().sum();

    Ok(DrillParseResult {
        units,
        min_hole_size_mm: hole_sizes_mm.first().copied(),
        max_hole_size_mm: hole_sizes_mm.last().copied(),
        tool_table,
        tool_table_mm,
        holes_by_tool: state.usage,
        total_holes,
        tool_attributed_holes,
        hole_sizes_mm,
        hole_counts_by_size,
        unique_hole_sizes,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    const TWO_TOOLS: &[u8] =
        b"M48\nINCH,TZ\nT01C0.0250\nT02C0.0394\n%\nT01\nX01000Y01000\nX02000Y01000\nT02\nX03000Y03000\nM30\n";

    #[test]
    fn ut_exc_001_holes_attributed_to_selected_tools() {
        let result = parse(TWO_TOOLS);
        assert!(result.is_ok(), "expected parser to accept two-tool input");

        if let Ok(parsed) = result {
            assert_eq!(parsed.holes_by_tool.get("01"), Some(&2));
            assert_eq!(parsed.holes_by_tool.get("02"), Some(&1));
            assert_eq!(parsed.total_holes, 3);
            assert_eq!(parsed.tool_attributed_holes, 3);
            assert_eq!(parsed.tools_count(), 2);
        }
    }

    #[test]
    fn ut_exc_002_inch_diameters_convert_to_mm() {
        let result = parse(TWO_TOOLS);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        if let Ok(parsed) = result {
            assert_eq!(parsed.units, UnitSystem::Inches);
            let t1 = parsed.tool_table_mm.get("01").copied().unwrap_or_default();
            let t2 = parsed.tool_table_mm.get("02").copied().unwrap_or_default();
            assert!((t1 - 0.635).abs() < EPSILON);
            assert!((t2 - 1.000_76).abs() < EPSILON);
            assert!((parsed.min_hole_size_mm.unwrap_or_default() - 0.635).abs() < EPSILON);
            assert_eq!(parsed.unique_hole_sizes, 2);
        }
    }

    #[test]
    fn ut_exc_003_metric_keyword_switches_units() {
        let input = b"M48\nMETRIC,TZ\nT1C0.8\n%\nT1\nX10.0Y10.0\nM30\n";
        let result = parse(input);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        if let Ok(parsed) = result {
            assert_eq!(parsed.units, UnitSystem::Millimeters);
            assert_eq!(parsed.tool_table_mm.get("1"), Some(&0.8));
        }

        let lowercase = parse(b"metric\nT1C0.8\n");
        assert!(lowercase.is_ok());
        if let Ok(parsed) = lowercase {
            assert_eq!(parsed.units, UnitSystem::Millimeters);
        }
    }

    #[test]
    fn ut_exc_004_hole_counts_keyed_by_raw_diameter() {
        let result = parse(TWO_TOOLS);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        if let Ok(parsed) = result {
            assert_eq!(parsed.hole_counts_by_size.get("0.025"), Some(&2));
            assert_eq!(parsed.hole_counts_by_size.get("0.0394"), Some(&1));
        }
    }

    #[test]
    fn bc_exc_001_empty_input_returns_error() {
        let result = parse(&[]);
        assert!(result.is_err(), "empty input must return an error");
    }

    #[test]
    fn bc_exc_002_records_before_tool_selection_diverge_from_total() {
        let input = b"T1C0.8\nX1000Y1000\nT1\nX2000Y2000\n";
        let result = parse(input);
        assert!(result.is_ok());

        if let Ok(parsed) = result {
            // The definition line also selects T1, so both records are attributed.
            assert_eq!(parsed.holes_by_tool.get("1"), Some(&2));
            assert_eq!(parsed.total_holes, 2);
        }

        let orphan = parse(b"X1000Y1000\nT1C0.8\nT1\nX2000Y2000\n");
        assert!(orphan.is_ok(), "expected Ok, got {:?}", orphan.as_ref().err());
        if let Ok(parsed) = orphan {
            assert_eq!(parsed.total_holes, 2);
            assert_eq!(parsed.tool_attributed_holes, 1);
            assert!(parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("precede any tool selection")));
        }
    }

    #[test]
    fn bc_exc_003_duplicate_tool_definition_last_wins_with_warning() {
        let input = b"M48\nMETRIC\nT1C0.8\nT1C1.0\n%\nT1\nX1.0Y1.0\nM30\n";
        let result = parse(input);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        if let Ok(parsed) = result {
            assert_eq!(parsed.tool_table.get("1"), Some(&1.0));
            assert!(parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("duplicate tool definition")));
        }
    }

    #[test]
    fn bc_exc_004_selected_but_undefined_tool_is_reported() {
        let input = b"T5\nX1000Y1000\n";
        let result = parse(input);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        if let Ok(parsed) = result {
            assert_eq!(parsed.holes_by_tool.get("5"), Some(&1));
            assert!(parsed.tool_table.is_empty());
            assert!(parsed.min_hole_size_mm.is_none());
            assert!(parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("selected but not defined")));
        }
    }

    #[test]
    fn bc_exc_005_whole_number_diameters_keep_decimal_in_size_keys() {
        let input = b"M48\nMETRIC\nT1C1.0\nT2C2\n%\nT1\nX1.0Y1.0\nT2\nX2.0Y2.0\nX3.0Y3.0\nM30\n";
        let result = parse(input);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        if let Ok(parsed) = result {
            assert_eq!(parsed.hole_counts_by_size.get("1.0"), Some(&1));
            assert_eq!(parsed.hole_counts_by_size.get("2.0"), Some(&2));
            assert!(!parsed.hole_counts_by_size.contains_key("1"));
        }
    }
}
