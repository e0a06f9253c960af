//! Text-scan tier used when the full decode is unavailable or rejected.
//!
//! Only the first [`SCAN_LIMIT`] bytes are examined. Coordinates are read as
//! fixed-point integers with five implied decimals.

use std::sync::LazyLock;

use regex::Regex;

use crate::units::UnitSystem;

use super::aperture::{aperture_statistics, scan_definitions, ApertureShape};
use super::types::{GerberParseResult, ParseTier};

/// Bytes of content examined by the heuristic tier.
pub const SCAN_LIMIT: usize = 10_000;

/// Assumed fixed-point scale for bare coordinate digits.
pub const FIXED_POINT_DIVISOR: f64 = 100_000.0;

static RE_XY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"X(\d+)Y(\d+)").unwrap_or_else(|_| unreachable!("XY pattern is valid"))
});
static RE_X: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"X(\d+)").unwrap_or_else(|_| unreachable!("X pattern is valid")));
static RE_Y: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Y(\d+)").unwrap_or_else(|_| unreachable!("Y pattern is valid")));

/// Lossy text of the first [`SCAN_LIMIT`] bytes.
pub fn scan_window(data: &[u8]) -> String {
    let window = data.get(..SCAN_LIMIT).unwrap_or(data);
    String::from_utf8_lossy(window).into_owned()
}

/// Units declared by literal `%MO` statements.
pub fn detect_units(text: &str) -> UnitSystem {
    if text.contains("%MOMM*%") || text.contains("%MO MM*%") {
        UnitSystem::Millimeters
    } else if text.contains("%MOIN*%") || text.contains("%MO IN*%") {
        UnitSystem::Inches
    } else {
        UnitSystem::Unknown
    }
}

/// The first line containing `%FS`, trimmed.
pub fn first_format_line(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.contains("%FS"))
        .map(|line| line.trim().to_string())
}

/// Number of `D01`, `D02` and `D03` occurrences.
pub fn count_draw_commands(text: &str) -> usize {
    ["D01", "D02", "D03"]
        .iter()
        .map(|token| text.matches(token).count())
        .sum()
}

/// Width and height in mm derived from raw coordinate digits.
///
/// Parameter lines (starting with `%`) are skipped. Combined `X..Y..` tokens
/// are preferred; separate `X` and `Y` streams are used only when no combined
/// token exists. A zero extent on an axis is reported as `None`.
pub fn coordinate_extent(text: &str, units: UnitSystem) -> (Option<f64>, Option<f64>) {
    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('%'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for caps in RE_XY.captures_iter(&body) {
        if let (Some(x), Some(y)) = (parse_digits(caps.get(1)), parse_digits(caps.get(2))) {
            xs.push(x);
            ys.push(y);
        }
    }

    if xs.is_empty() {
        xs = RE_X
            .captures_iter(&body)
            .filter_map(|caps| parse_digits(caps.get(1)))
            .collect();
        ys = RE_Y
            .captures_iter(&body)
            .filter_map(|caps| parse_digits(caps.get(1)))
            .collect();
        if xs.is_empty() || ys.is_empty() {
            return (None, None);
        }
    }

    (axis_extent(&xs, units), axis_extent(&ys, units))
}

fn parse_digits(capture: Option<regex::Match<'_>>) -> Option<f64> {
    capture.and_then(|m| m.as_str().parse::<f64>().ok())
}

fn axis_extent(values: &[f64], units: UnitSystem) -> Option<f64> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    let extent = units.to_mm((max - min) / FIXED_POINT_DIVISOR);
    (extent > 0.0).then_some(extent)
}

/// Run the heuristic tier over `data`.
pub fn parse(data: &[u8], file_type: Option<&str>) -> GerberParseResult {
    let text = scan_window(data);
    let units = detect_units(&text);

    let shapes: Vec<ApertureShape> = scan_definitions(&text)
        .into_iter()
        .map(|(_, shape)| shape.to_mm(units))
        .collect();
    let (aperture_sizes, apertures) = aperture_statistics(&shapes);

    let (width_mm, height_mm) = coordinate_extent(&text, units);

    let mut warnings = Vec::new();
    if data.len() > SCAN_LIMIT {
        warnings.push(format!(
            "heuristic scan limited to the first {SCAN_LIMIT} of {} bytes",
            data.len()
        ));
    }
    if units == UnitSystem::Unknown {
        warnings.push("no %MO unit declaration; assuming millimeters".to_string());
    }

    GerberParseResult {
        tier: ParseTier::Heuristic,
        file_type: file_type.map(str::to_string),
        is_rs274x: text.contains("%FS") || text.contains("%MO"),
        units,
        format_spec: first_format_line(&text),
        aperture_sizes,
        apertures,
        primitive_counts: None,
        statements_count: None,
        draw_commands: count_draw_commands(&text),
        bounds: None,
        width_mm,
        height_mm,
        warnings,
    }
}
