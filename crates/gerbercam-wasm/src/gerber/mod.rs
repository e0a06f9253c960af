//! Gerber RS-274X parsing.
//!
//! Parsing is attempted in two tiers. The geometry tier decodes the full
//! command stream with `gerber_parser`; when it is disabled or rejects the
//! input, the heuristic tier scans the leading text instead. The tier that
//! produced a result is recorded in [`GerberParseResult::tier`].

pub mod aperture;
pub mod geometry;
pub mod heuristic;
pub mod types;

pub use aperture::*;
pub use types::*;

use crate::error::AnalysisError;

/// Two-tier Gerber parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GerberParser {
    geometry: bool,
}

impl GerberParser {
    /// Parser that tries the geometry tier first.
    pub const fn new() -> Self {
        Self { geometry: true }
    }

    /// Parser that always uses the heuristic tier.
    pub const fn without_geometry() -> Self {
        Self { geometry: false }
    }

    /// Parse one Gerber file.
    ///
    /// `file_type` is carried into the result without interpretation.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ParseFailure`] for empty input. Every other
    /// problem degrades to the heuristic tier.
    pub fn parse(
        &self,
        data: &[u8],
        file_type: Option<&str>,
    ) -> Result<GerberParseResult, AnalysisError> {
        if data.is_empty() {
            return Err(AnalysisError::ParseFailure("empty input".to_string()));
        }

        if !self.geometry {
            return Ok(heuristic::parse(data, file_type));
        }

        match geometry::parse(data, file_type) {
            Ok(result) => Ok(result),
            Err(reason) => {
                log::debug!("geometry decode rejected ({reason}); using heuristic scan");
                let mut result = heuristic::parse(data, file_type);
                result
                    .warnings
                    .insert(0, format!("geometry decode unavailable: {reason}"));
                Ok(result)
            }
        }
    }
}

impl Default for GerberParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one Gerber file with the default two-tier strategy.
///
/// # Errors
///
/// See [`GerberParser::parse`].
pub fn parse(data: &[u8], file_type: Option<&str>) -> Result<GerberParseResult, AnalysisError> {
    GerberParser::new().parse(data, file_type)
}
