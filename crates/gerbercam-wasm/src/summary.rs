//! Board-level summary built from every file of one analysis session.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::excellon::DrillParseResult;
use crate::file::{FileFormat, ParsedFile, RawFile};
use crate::gerber::GerberParseResult;
use crate::units::round_to;

const LAYER_DETAIL_SIZES: usize = 10;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Per-layer Gerber details, keyed by `file_type` in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDetails {
    /// Sum of all primitive kinds; zero without a geometry decode.
    pub primitives_count: usize,
    /// Declared apertures.
    pub apertures_count: usize,
    /// Decoded commands, when known.
    pub statements_count: Option<usize>,
    /// Linear strokes.
    pub lines_count: usize,
    /// Circular strokes.
    pub arcs_count: usize,
    /// Region blocks.
    pub regions_count: usize,
    /// Smallest aperture in mm.
    pub min_aperture_size: Option<f64>,
    /// Largest aperture in mm.
    pub max_aperture_size: Option<f64>,
    /// Mean aperture in mm.
    pub avg_aperture_size: Option<f64>,
    /// First ten unique aperture sizes in mm.
    pub aperture_sizes: Vec<f64>,
}

impl From<&GerberParseResult> for LayerDetails {
    fn from(result: &GerberParseResult) -> Self {
        let counts = result.primitive_counts.unwrap_or_default();
        let mut aperture_sizes = result.apertures.unique_sizes.clone();
        aperture_sizes.truncate(LAYER_DETAIL_SIZES);
        Self {
            primitives_count: counts.total(),
            apertures_count: result.apertures.count,
            statements_count: result.statements_count,
            lines_count: counts.lines,
            arcs_count: counts.arcs,
            regions_count: counts.regions,
            min_aperture_size: result.apertures.min_size,
            max_aperture_size: result.apertures.max_size,
            avg_aperture_size: result.apertures.avg_size,
            aperture_sizes,
        }
    }
}

/// Aperture statistics of one layer with at least one aperture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerApertures {
    /// Declared apertures.
    pub count: usize,
    /// Unique sizes in mm.
    pub sizes: Vec<f64>,
    /// Smallest size in mm.
    pub min: Option<f64>,
    /// Largest size in mm.
    pub max: Option<f64>,
}

/// Drill statistics of one drill file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillStatistics {
    /// Raw coordinate records.
    pub total_holes: usize,
    /// Records attributed to a tool.
    pub tool_attributed_holes: usize,
    /// Defined tools.
    pub tools_count: usize,
    /// Smallest hole in mm.
    pub min_hole_size_mm: Option<f64>,
    /// Largest hole in mm.
    pub max_hole_size_mm: Option<f64>,
    /// Distinct raw diameters.
    pub unique_hole_sizes: usize,
    /// Unique hole sizes in mm, ascending.
    pub hole_sizes_mm: Vec<f64>,
    /// Attributed holes per raw diameter.
    pub hole_counts_by_size: BTreeMap<String, usize>,
}

impl From<&DrillParseResult> for DrillStatistics {
    fn from(result: &DrillParseResult) -> Self {
        Self {
            total_holes: result.total_holes,
            tool_attributed_holes: result.tool_attributed_holes,
            tools_count: result.tools_count(),
            min_hole_size_mm: result.min_hole_size_mm,
            max_hole_size_mm: result.max_hole_size_mm,
            unique_hole_sizes: result.unique_hole_sizes,
            hole_sizes_mm: result.hole_sizes_mm.clone(),
            hole_counts_by_size: result.hole_counts_by_size.clone(),
        }
    }
}

/// Board-level facts derived from one session.
///
/// Absent values mean "not determined", never a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    /// Format of the first file.
    pub file_format: FileFormat,
    /// Number of files in the session.
    pub file_count: usize,
    /// Sum of file sizes.
    pub total_size_bytes: u64,
    /// Sum of file sizes in MiB, two decimals.
    pub total_size_mb: f64,
    /// Files per `file_type` tag.
    pub file_types: BTreeMap<String, usize>,
    /// Largest width seen on any layer, two decimals.
    pub board_width_mm: Option<f64>,
    /// Largest height seen on any layer, two decimals.
    pub board_height_mm: Option<f64>,
    /// Copper layer count.
    pub layer_count: Option<usize>,
    /// Panels; always 1.
    pub panel_count: u32,
    /// Boards per panel; always 1.
    pub boards_per_panel: u32,
    /// Total boards; always 1.
    pub total_boards: u32,
    /// Panel detection; always `false`.
    pub is_panelized: bool,
    /// Files that parsed successfully.
    pub parsed_files_count: usize,
    /// Gerber details per `file_type`.
    pub layer_details: BTreeMap<String, LayerDetails>,
    /// Drill statistics per `file_type`.
    pub drill_statistics: BTreeMap<String, DrillStatistics>,
    /// Aperture statistics per `file_type`, for layers with apertures.
    pub aperture_statistics: BTreeMap<String, LayerApertures>,
    /// Sum of raw drill records over all drill files.
    pub total_vias: usize,
    /// Sum of aperture counts over Gerber files with apertures.
    pub total_pads: usize,
    /// Same as `total_vias`.
    pub total_holes: usize,
}

/// Copper layer count from the session's `file_type` tags.
///
/// Explicit top and bottom layers plus inner layers; inner layers alone
/// imply an enclosing top and bottom pair. Returns `None` for zero.
pub fn count_layers<'a>(file_types: impl IntoIterator<Item = &'a str>) -> Option<usize> {
    let (top_bottom, inner) =
        file_types
            .into_iter()
            .fold((0usize, 0usize), |(top_bottom, inner), file_type| {
                (
                    top_bottom + usize::from(matches!(file_type, "copper_top" | "copper_bottom")),
                    inner + usize::from(file_type.contains("inner_layer")),
                )
            });

    let count = if inner > 0 && top_bottom == 0 {
        inner + 2
    } else {
        top_bottom + inner
    };
    (count > 0).then_some(count)
}

/// Folds every file of a session into one [`AnalysisSummary`].
///
/// Files without a parse result still count toward tallies, sizes and the
/// layer count. Width and height are maximized independently, so the result
/// does not depend on file order. Detail maps are keyed by `file_type`; a
/// later file with the same tag replaces the earlier entry.
pub fn summarize<'a>(
    entries: impl IntoIterator<Item = (&'a RawFile, Option<&'a ParsedFile>)>,
) -> AnalysisSummary {
    let entries: Vec<_> = entries.into_iter().collect();

    let mut summary = AnalysisSummary {
        file_format: entries
            .first()
            .map_or(FileFormat::Gerber, |(file, _)| file.file_format),
        file_count: entries.len(),
        total_size_bytes: 0,
        total_size_mb: 0.0,
        file_types: BTreeMap::new(),
        board_width_mm: None,
        board_height_mm: None,
        layer_count: count_layers(entries.iter().map(|(file, _)| file.file_type.as_str())),
        panel_count: 1,
        boards_per_panel: 1,
        total_boards: 1,
        is_panelized: false,
        parsed_files_count: 0,
        layer_details: BTreeMap::new(),
        drill_statistics: BTreeMap::new(),
        aperture_statistics: BTreeMap::new(),
        total_vias: 0,
        total_pads: 0,
        total_holes: 0,
    };

    let mut max_width: Option<f64> = None;
    let mut max_height: Option<f64> = None;

    for (file, parsed) in entries {
        *summary.file_types.entry(file.file_type.clone()).or_insert(0) += 1;
        summary.total_size_bytes = summary.total_size_bytes.saturating_add(file.byte_size);

        let Some(parsed) = parsed else {
            continue;
        };
        summary.parsed_files_count += 1;

        match parsed {
            ParsedFile::Gerber(result) => {
                summary
                    .layer_details
                    .insert(file.file_type.clone(), LayerDetails::from(result));

                if result.apertures.count > 0 {
                    summary.total_pads += result.apertures.count;
                    summary.aperture_statistics.insert(
                        file.file_type.clone(),
                        LayerApertures {
                            count: result.apertures.count,
                            sizes: result.apertures.unique_sizes.clone(),
                            min: result.apertures.min_size,
                            max: result.apertures.max_size,
                        },
                    );
                }

                if let (Some(width), Some(height)) = (result.width_mm, result.height_mm) {
                    if width > 0.0 && height > 0.0 {
                        max_width = Some(max_width.map_or(width, |w| w.max(width)));
                        max_height = Some(max_height.map_or(height, |h| h.max(height)));
                    }
                }
            }
            ParsedFile::Drill(result) => {
                summary
                    .drill_statistics
                    .insert(file.file_type.clone(), DrillStatistics::from(result));
                summary.total_vias += result.total_holes;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let total_mb = summary.total_size_bytes as f64 / BYTES_PER_MB;
    summary.total_size_mb = round_to(total_mb, 2);
    summary.board_width_mm = max_width.map(|w| round_to(w, 2));
    summary.board_height_mm = max_height.map(|h| round_to(h, 2));
    summary.total_holes = summary.total_vias;
    summary
}
