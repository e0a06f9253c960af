#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::indexing_slicing)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `GerberCAM` WASM module: manufacturing file analysis for Gerber and
//! Excellon data: format detection, parsing, design-rule estimation and
//! session summaries.

pub mod detect;
pub mod error;
pub mod excellon;
pub mod file;
pub mod gerber;
pub mod issues;
pub mod layer;
pub mod rules;
pub mod session;
pub mod summary;
pub mod units;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::detect::{Detection, Peek};
use crate::error::AnalysisError;
use crate::excellon::DrillParseResult;
use crate::file::RawFile;
use crate::gerber::GerberParseResult;
use crate::issues::RuleSet;
use crate::layer::FileDetails;
use crate::rules::DesignRuleEstimate;
use crate::session::{Session, SessionReport};

/// Initialize the WASM module. Sets up the panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::debug!("console logger already installed");
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_error(err: &AnalysisError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Detect whether a file or archive holds Gerber or ODB++ data.
///
/// `data` may be empty when only the name is known.
///
/// # Errors
///
/// Returns a descriptive error string when no format can be determined.
#[wasm_bindgen]
pub fn detect_format(filename: &str, data: &[u8]) -> Result<JsValue, JsValue> {
    let detection = detect_format_internal(filename, data).map_err(|e| js_error(&e))?;
    to_js(&detection)
}

/// Internal detection logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn detect_format_internal(filename: &str, data: &[u8]) -> Result<Detection, AnalysisError> {
    let peek = if data.is_empty() {
        Peek::None
    } else {
        Peek::Bytes(data)
    };
    detect::detect_format(filename, peek)
}

/// Parse a Gerber RS-274X file from raw bytes.
///
/// Returns `GerberParseResult` as a `JsValue` via `serde-wasm-bindgen`.
///
/// # Errors
///
/// Returns a descriptive error string for empty input.
#[allow(clippy::needless_pass_by_value)]
#[wasm_bindgen]
pub fn parse_gerber(data: &[u8], file_type: Option<String>) -> Result<JsValue, JsValue> {
    let result =
        parse_gerber_internal(data, file_type.as_deref()).map_err(|e| js_error(&e))?;
    to_js(&result)
}

/// Internal parse logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn parse_gerber_internal(
    data: &[u8],
    file_type: Option<&str>,
) -> Result<GerberParseResult, AnalysisError> {
    gerber::parse(data, file_type)
}

/// Parse an Excellon drill file from raw bytes.
///
/// Returns `DrillParseResult` as a `JsValue` via `serde-wasm-bindgen`.
///
/// # Errors
///
/// Returns a descriptive error string for empty input.
#[wasm_bindgen]
pub fn parse_excellon(data: &[u8]) -> Result<JsValue, JsValue> {
    let result = parse_excellon_internal(data).map_err(|e| js_error(&e))?;
    to_js(&result)
}

/// Internal parse logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn parse_excellon_internal(data: &[u8]) -> Result<DrillParseResult, AnalysisError> {
    excellon::parse(data)
}

/// Estimate trace width, spacing and annular ring for one Gerber layer.
///
/// # Errors
///
/// Returns an error string only if the estimate cannot be serialized.
#[wasm_bindgen]
pub fn extract_design_rules(data: &[u8]) -> Result<JsValue, JsValue> {
    to_js(&extract_design_rules_internal(data))
}

/// Internal estimation logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn extract_design_rules_internal(data: &[u8]) -> DesignRuleEstimate {
    rules::extract(data)
}

/// Infer a layer tag such as `copper_top` from a file name.
#[wasm_bindgen]
pub fn classify_layer(filename: &str) -> Option<String> {
    layer::classify_layer_role(filename)
}

/// Collect command statistics and the manufacturing purpose of one file.
///
/// # Errors
///
/// Returns an error string only if the details cannot be serialized.
#[wasm_bindgen]
pub fn inspect_file(filename: &str, file_type: &str, data: &[u8]) -> Result<JsValue, JsValue> {
    to_js(&inspect_file_internal(filename, file_type, data))
}

/// Internal inspection logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn inspect_file_internal(filename: &str, file_type: &str, data: &[u8]) -> FileDetails {
    let file = RawFile::new(
        filename,
        layer::file_format_for(filename),
        file_type,
        data.to_vec(),
    );
    layer::inspect_file(&file)
}

/// Run a full analysis session.
///
/// `files` is an array of `{filename, file_format, file_type, byte_size,
/// content}` objects with `content` as an array of bytes. `rules` may be
/// `undefined` to use the default rule set.
///
/// # Errors
///
/// Returns a descriptive error string for malformed arguments or an empty
/// session.
#[wasm_bindgen]
pub fn analyze_session(files: JsValue, rules: JsValue) -> Result<JsValue, JsValue> {
    let files: Vec<RawFile> =
        serde_wasm_bindgen::from_value(files).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let rule_set: RuleSet = if rules.is_undefined() || rules.is_null() {
        RuleSet::default()
    } else {
        serde_wasm_bindgen::from_value(rules).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    let report = analyze_session_internal(files, &rule_set).map_err(|e| js_error(&e))?;
    to_js(&report)
}

/// Internal session logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn analyze_session_internal(
    files: Vec<RawFile>,
    rule_set: &RuleSet,
) -> Result<SessionReport, AnalysisError> {
    Session::new(files).run(rule_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Confidence, FormatType};
    use crate::file::FileFormat;

    #[test]
    fn detect_format_by_extension() {
        let result = detect_format_internal("board.GBR", &[]);
        assert!(result.is_ok(), "expected Ok, got {:?}", result.as_ref().err());
        let Some(detection) = result.ok() else {
            return;
        };
        assert_eq!(detection.format_type, FormatType::Gerber);
        assert_eq!(detection.confidence, Confidence::High);
    }

    #[test]
    fn parse_gerber_valid_fixture() {
        let data = include_bytes!("../tests/fixtures/minimal/copper_top.gbr");
        let result = parse_gerber_internal(data, Some("copper_top"));
        assert!(
            result.is_ok(),
            "expected Ok, got Err: {:?}",
            result.as_ref().err()
        );
        let Some(parsed) = result.ok() else {
            return;
        };
        assert!(
            !parsed.aperture_sizes.is_empty(),
            "expected apertures from valid Gerber"
        );
        assert!(parsed.width_mm.is_some(), "expected a board width");
    }

    #[test]
    fn parse_gerber_empty_bytes() {
        let result = parse_gerber_internal(&[], None);
        assert!(result.is_err(), "empty input should return Err");
    }

    #[test]
    fn parse_gerber_malformed_fixture() {
        let data = include_bytes!("../tests/fixtures/minimal/malformed.gbr");
        let result = parse_gerber_internal(data, None);
        assert!(
            result.is_ok(),
            "expected Ok for partial parse, got Err: {:?}",
            result.as_ref().err()
        );
    }

    #[test]
    fn parse_excellon_fixture() {
        let data = include_bytes!("../tests/fixtures/minimal/drill.drl");
        let result = parse_excellon_internal(data);
        assert!(
            result.is_ok(),
            "expected Ok, got Err: {:?}",
            result.as_ref().err()
        );
        let Some(parsed) = result.ok() else {
            return;
        };
        assert_eq!(parsed.total_holes, 5, "expected five drill records");
        assert_eq!(parsed.tools_count(), 2);
    }

    #[test]
    fn classify_layer_from_name() {
        assert_eq!(classify_layer("Top_Copper.gbr").as_deref(), Some("copper_top"));
        assert_eq!(classify_layer("README"), None);
    }

    #[test]
    fn inspect_file_infers_format_from_name() {
        let details = inspect_file_internal("elec2.ger", "inner_layer_2", b"%FSLAX46Y46*%\n");
        assert_eq!(details.format.as_deref(), Some("RS-274X"));
        assert_eq!(details.size_bytes, 14);
    }

    #[test]
    fn analyze_session_rejects_empty() {
        let result = analyze_session_internal(Vec::new(), &RuleSet::default());
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn analyze_session_with_fixtures() {
        let files = vec![
            RawFile::new(
                "copper_top.gbr",
                FileFormat::Gerber,
                "copper_top",
                include_bytes!("../tests/fixtures/minimal/copper_top.gbr").to_vec(),
            ),
            RawFile::new(
                "drill.drl",
                FileFormat::Drill,
                "drill",
                include_bytes!("../tests/fixtures/minimal/drill.drl").to_vec(),
            ),
        ];
        let result = analyze_session_internal(files, &RuleSet::default());
        assert!(
            result.is_ok(),
            "expected Ok, got Err: {:?}",
            result.as_ref().err()
        );
        let Some(report) = result.ok() else {
            return;
        };
        assert_eq!(report.summary.layer_count, Some(1));
        assert_eq!(report.summary.total_vias, 5);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn wasm_classify_layer() {
        assert_eq!(classify_layer("board.exc").as_deref(), Some("drill"));
    }

    #[wasm_bindgen_test]
    fn wasm_parse_excellon_returns_object() {
        let result = parse_excellon(b"M48\nMETRIC\nT1C0.8\n%\nT1\nX1.0Y1.0\nM30\n");
        assert!(result.is_ok());
    }
}
