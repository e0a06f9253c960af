//! Design-rule estimation from Gerber aperture tables and coordinates.
//!
//! This is a separate text pass over the raw content with its own unit
//! detection; it does not consume [`crate::gerber::GerberParseResult`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::file::RawFile;
use crate::units::{round_to, UnitSystem};

/// Apertures outside `(MIN, MAX)` mm are discarded as implausible.
const PLAUSIBLE_SIZE_MIN: f64 = 0.001;
const PLAUSIBLE_SIZE_MAX: f64 = 100.0;

/// Typical trace widths fall inside this band (mm, inclusive).
const TRACE_BAND: (f64, f64) = (0.05, 0.5);

/// Apertures at or above this size are treated as pads, below as vias.
const PAD_THRESHOLD: f64 = 0.5;

const SPACING_FROM_TRACE_FACTOR: f64 = 1.2;

const SAMPLE_MIN_COORDINATES: usize = 10;
const SAMPLE_COORDINATE_LIMIT: usize = 5000;
const SAMPLE_ORIGINS: usize = 500;
const SAMPLE_WINDOW: usize = 50;
const SAMPLE_DISTANCE_BAND: (f64, f64) = (0.01, 5.0);

const OUTPUT_DIGITS: i32 = 3;

static RE_CIRCULAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%ADD\d+C,([\d.]+)").unwrap_or_else(|_| unreachable!("circular pattern is valid"))
});
static RE_RECTANGULAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%ADD\d+R,([\d.]+)X([\d.]+)")
        .unwrap_or_else(|_| unreachable!("rectangular pattern is valid"))
});
static RE_COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"X([\d.]+)\s*Y([\d.]+)")
        .unwrap_or_else(|_| unreachable!("coordinate pattern is valid"))
});

/// Design rules estimated for one Gerber layer. Lengths are mm, rounded to
/// three decimals; `None` means the layer did not carry enough data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignRuleEstimate {
    /// Likely minimum trace width.
    pub trace_width_mm: Option<f64>,
    /// Likely minimum copper-to-copper spacing.
    pub min_spacing_mm: Option<f64>,
    /// Likely minimum annular ring.
    pub annular_ring_mm: Option<f64>,
    /// Plausible aperture sizes, deduplicated and ascending.
    pub aperture_sizes_mm: Vec<f64>,
    /// Smallest plausible aperture.
    pub min_aperture_mm: Option<f64>,
    /// Largest plausible aperture.
    pub max_aperture_mm: Option<f64>,
    /// Units declared by the layer (inches when undeclared).
    pub units: UnitSystem,
    /// Number of plausible aperture definitions.
    pub aperture_count: usize,
}

/// Minimum rules across all copper layers of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CopperRules {
    /// Smallest trace width over all copper layers.
    pub min_trace_width_mm: Option<f64>,
    /// Smallest spacing over all copper layers.
    pub min_spacing_mm: Option<f64>,
    /// Smallest annular ring over all copper layers.
    pub min_annular_ring_mm: Option<f64>,
    /// Estimate per layer, keyed by `file_type`.
    pub layer_results: BTreeMap<String, DesignRuleEstimate>,
}

/// Units as declared by `%MO`, defaulting to inches.
pub fn detect_units(content: &str) -> UnitSystem {
    if content.contains("%MOMM") || content.contains("%MO MM") {
        UnitSystem::Millimeters
    } else {
        UnitSystem::Inches
    }
}

/// Circular and rectangular aperture sizes in mm, filtered to the plausible band.
///
/// Rectangles contribute their smaller side.
pub fn plausible_aperture_sizes(content: &str, units: UnitSystem) -> Vec<f64> {
    let circular = RE_CIRCULAR
        .captures_iter(content)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok());
    let rectangular = RE_RECTANGULAR.captures_iter(content).filter_map(|caps| {
        let width = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let height = caps.get(2)?.as_str().parse::<f64>().ok()?;
        Some(width.min(height))
    });

    circular
        .chain(rectangular)
        .map(|size| units.to_mm(size))
        .filter(|size| *size > PLAUSIBLE_SIZE_MIN && *size < PLAUSIBLE_SIZE_MAX)
        .collect()
}

/// Smallest size inside the trace band, else the smallest size overall.
pub fn estimate_trace_width(sizes: &[f64]) -> Option<f64> {
    let (low, high) = TRACE_BAND;
    sizes
        .iter()
        .copied()
        .filter(|size| (low..=high).contains(size))
        .reduce(f64::min)
        .or_else(|| sizes.iter().copied().reduce(f64::min))
}

/// Half the gap between the smallest pad and the largest via.
///
/// Without both pads and vias, half the full size range is used when at
/// least two distinct sizes exist.
pub fn estimate_annular_ring(sizes: &[f64]) -> Option<f64> {
    if sizes.len() < 2 {
        return None;
    }

    let smallest_pad = sizes
        .iter()
        .copied()
        .filter(|size| *size >= PAD_THRESHOLD)
        .reduce(f64::min);
    let largest_via = sizes
        .iter()
        .copied()
        .filter(|size| *size < PAD_THRESHOLD)
        .reduce(f64::max);

    if let (Some(pad), Some(via)) = (smallest_pad, largest_via) {
        return Some((pad - via) / 2.0);
    }

    let min = sizes.iter().copied().reduce(f64::min)?;
    let max = sizes.iter().copied().reduce(f64::max)?;
    (max > min).then(|| (max - min) / 2.0)
}

/// Smallest plausible neighbour distance among the leading coordinates, in mm.
///
/// Coordinates are used as written, without fixed-point scaling. Sampling is
/// skipped when there are too few coordinates or any of them fails to parse.
pub fn sample_spacing(content: &str, units: UnitSystem) -> Option<f64> {
    let tokens: Vec<_> = RE_COORDINATE.captures_iter(content).collect();
    if tokens.len() <= SAMPLE_MIN_COORDINATES {
        return None;
    }

    let points: Vec<(f64, f64)> = tokens
        .iter()
        .take(SAMPLE_COORDINATE_LIMIT)
        .map(|caps| {
            let x = caps.get(1)?.as_str().parse::<f64>().ok()?;
            let y = caps.get(2)?.as_str().parse::<f64>().ok()?;
            Some((x, y))
        })
        .collect::<Option<_>>()?;

    let (low, high) = SAMPLE_DISTANCE_BAND;
    let mut closest: Option<f64> = None;
    for (i, &(x1, y1)) in points.iter().enumerate().take(SAMPLE_ORIGINS) {
        let end = (i + SAMPLE_WINDOW).min(points.len());
        for &(x2, y2) in points.get(i + 1..end).unwrap_or_default() {
            let distance = units.to_mm((x2 - x1).hypot(y2 - y1));
            if distance > low && distance < high {
                closest = Some(closest.map_or(distance, |current| current.min(distance)));
            }
        }
    }
    closest
}

/// Estimates design rules for one Gerber layer.
pub fn extract(data: &[u8]) -> DesignRuleEstimate {
    let content = String::from_utf8_lossy(data);
    let units = detect_units(&content);
    let sizes = plausible_aperture_sizes(&content, units);

    let trace_width = estimate_trace_width(&sizes);
    let annular_ring = estimate_annular_ring(&sizes);

    let proxy_spacing = trace_width.map(|width| width * SPACING_FROM_TRACE_FACTOR);
    let min_spacing = match (proxy_spacing, sample_spacing(&content, units)) {
        (Some(proxy), Some(sampled)) => Some(proxy.min(sampled)),
        (proxy, sampled) => proxy.or(sampled),
    };

    let mut aperture_sizes_mm: Vec<f64> = sizes
        .iter()
        .map(|size| round_to(*size, OUTPUT_DIGITS))
        .collect();
    aperture_sizes_mm.sort_by(f64::total_cmp);
    aperture_sizes_mm.dedup();

    let rounded = |value: Option<f64>| value.map(|v| round_to(v, OUTPUT_DIGITS));

    DesignRuleEstimate {
        trace_width_mm: rounded(trace_width),
        min_spacing_mm: rounded(min_spacing),
        annular_ring_mm: rounded(annular_ring),
        min_aperture_mm: rounded(sizes.iter().copied().reduce(f64::min)),
        max_aperture_mm: rounded(sizes.iter().copied().reduce(f64::max)),
        aperture_sizes_mm,
        units,
        aperture_count: sizes.len(),
    }
}

/// Runs [`extract`] over every copper layer and keeps the minimum of each rule.
///
/// Later files with the same `file_type` replace earlier entries in the
/// per-layer map but still count toward the minimums.
pub fn extract_copper_rules<'a>(files: impl IntoIterator<Item = &'a RawFile>) -> CopperRules {
    let mut rules = CopperRules::default();

    for file in files.into_iter().filter(|file| file.is_copper()) {
        let estimate = extract(&file.content);
        rules.min_trace_width_mm = min_option(rules.min_trace_width_mm, estimate.trace_width_mm);
        rules.min_spacing_mm = min_option(rules.min_spacing_mm, estimate.min_spacing_mm);
        rules.min_annular_ring_mm =
            min_option(rules.min_annular_ring_mm, estimate.annular_ring_mm);
        log::debug!(
            "design rules for {}: trace {:?} spacing {:?} ring {:?}",
            file.filename,
            estimate.trace_width_mm,
            estimate.min_spacing_mm,
            estimate.annular_ring_mm
        );
        rules.layer_results.insert(file.file_type.clone(), estimate);
    }

    rules
}

fn min_option(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
