//! Full-decode tier: walks the `gerber_parser` command stream.

use std::io::{BufReader, Cursor};
use std::panic::{self, AssertUnwindSafe};

use gerber_types::{
    Aperture, Command, Coordinates, DCode, FunctionCode, GCode, InterpolationMode, Operation,
};

use crate::units::UnitSystem;

use super::aperture::{aperture_statistics, ApertureShape};
use super::heuristic;
use super::types::{BoundingBox, GerberParseResult, ParseTier, PrimitiveCounts};

/// Interpreter state carried across commands.
#[derive(Debug)]
struct WalkState {
    x: f64,
    y: f64,
    interpolation: InterpolationMode,
    region_mode: bool,
    counts: PrimitiveCounts,
    bounds: BoundingBox,
}

impl Default for WalkState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            interpolation: InterpolationMode::Linear,
            region_mode: false,
            counts: PrimitiveCounts::default(),
            bounds: BoundingBox::new(),
        }
    }
}

impl WalkState {
    fn advance(&mut self, coordinates: Option<&Coordinates>, units: UnitSystem) {
        if let Some(coordinates) = coordinates {
            if let Some(x) = coordinates.x.as_ref() {
                self.x = units.to_mm(f64::from(*x));
            }
            if let Some(y) = coordinates.y.as_ref() {
                self.y = units.to_mm(f64::from(*y));
            }
        }
        self.bounds.update(self.x, self.y);
    }
}

/// First line the decoder would slice out of bounds on.
///
/// `gerber_parser` reads a `G0x` code as a three-byte prefix, so a shorter
/// `G0` line, or one whose third byte is not a char boundary, makes it panic.
/// Returns the 1-based line number.
pub fn first_undecodable_line(data: &[u8]) -> Option<usize> {
    data.split(|byte| *byte == b'\n')
        .position(|raw| {
            let line = String::from_utf8_lossy(raw);
            let line = line.trim();
            line.starts_with("G0") && !line.is_char_boundary(3)
        })
        .map(|index| index + 1)
}

fn decode(data: &[u8]) -> Result<gerber_parser::GerberDoc, String> {
    let reader = BufReader::new(Cursor::new(data));
    panic::catch_unwind(AssertUnwindSafe(|| gerber_parser::parse(reader)))
        .map_err(|_| "decoder panicked".to_string())?
        .map_err(|(_, err)| format!("{err:?}"))
}

/// Decode `data` as a complete RS-274X document.
///
/// # Errors
///
/// Returns a description of why the geometry tier cannot be trusted: a line
/// the decoder cannot handle, a decoder panic or fatal error, or no decoded
/// commands.
pub fn parse(data: &[u8], file_type: Option<&str>) -> Result<GerberParseResult, String> {
    if let Some(line) = first_undecodable_line(data) {
        return Err(format!("truncated G code on line {line}"));
    }
    let doc = decode(data)?;

    let commands = doc.commands();
    if commands.is_empty() {
        return Err("no commands decoded".to_string());
    }

    let units = doc.units.as_ref().map_or(UnitSystem::Unknown, UnitSystem::from);
    let text = String::from_utf8_lossy(data);

    let mut state = WalkState::default();
    for command in &commands {
        walk(command, &mut state, units);
    }

    let mut table: Vec<(&i32, &Aperture)> = doc.apertures.iter().collect();
    table.sort_by_key(|(code, _)| **code);
    let shapes: Vec<ApertureShape> = table
        .into_iter()
        .map(|(_, aperture)| ApertureShape::from_aperture(aperture).to_mm(units))
        .collect();
    let (aperture_sizes, apertures) = aperture_statistics(&shapes);

    let mut warnings = Vec::new();
    if doc.units.is_none() {
        warnings.push("no %MO unit declaration; assuming millimeters".to_string());
    }

    let (bounds, width_mm, height_mm) = if state.bounds.width() > 0.0
        && state.bounds.height() > 0.0
    {
        (
            Some(state.bounds),
            Some(state.bounds.width()),
            Some(state.bounds.height()),
        )
    } else {
        let window = heuristic::scan_window(data);
        let (width, height) = heuristic::coordinate_extent(&window, units);
        (None, width, height)
    };

    Ok(GerberParseResult {
        tier: ParseTier::Geometry,
        file_type: file_type.map(str::to_string),
        is_rs274x: text.contains("%FS") || text.contains("%MO"),
        units,
        format_spec: heuristic::first_format_line(&text),
        aperture_sizes,
        apertures,
        primitive_counts: Some(state.counts),
        statements_count: Some(commands.len()),
        draw_commands: heuristic::count_draw_commands(&text),
        bounds,
        width_mm,
        height_mm,
        warnings,
    })
}

fn walk(command: &Command, state: &mut WalkState, units: UnitSystem) {
    match command {
        Command::FunctionCode(FunctionCode::DCode(DCode::Operation(operation))) => {
            match operation {
                Operation::Interpolate(coordinates, _) => {
                    state.advance(coordinates.as_ref(), units);
                    if !state.region_mode {
                        match state.interpolation {
                            InterpolationMode::Linear => state.counts.lines += 1,
                            InterpolationMode::ClockwiseCircular
                            | InterpolationMode::CounterclockwiseCircular => {
                                state.counts.arcs += 1;
                            }
                        }
                    }
                }
                Operation::Move(coordinates) => state.advance(coordinates.as_ref(), units),
                Operation::Flash(coordinates) => {
                    state.advance(coordinates.as_ref(), units);
                    state.counts.flashes += 1;
                }
            }
        }
        Command::FunctionCode(FunctionCode::GCode(gcode)) => match gcode {
            GCode::InterpolationMode(mode) => state.interpolation = *mode,
            GCode::RegionMode(enabled) => {
                if *enabled && !state.region_mode {
                    state.counts.regions += 1;
                }
                state.region_mode = *enabled;
            }
            _ => {}
        },
        _ => {}
    }
}
