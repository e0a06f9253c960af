//! Format detection for uploaded manufacturing artifacts.
//!
//! Classification is by file extension first, then by archive contents, then
//! by sniffing the leading bytes of the content.

use std::io::Cursor;

use serde::Serialize;
use zip::ZipArchive;

use crate::error::AnalysisError;

const ARCHIVE_GERBER_SUFFIXES: &[&str] = &[".ger", ".gbr", ".art", ".exc", ".drill"];
const ODB_MARKERS: &[&str] = &["steps", "matrix", "layers"];
const ODB_SUFFIXES: &[&str] = &[".tgz", ".tar.gz", ".odb"];
const GERBER_SUFFIXES: &[&str] = &[".gbr", ".ger", ".art", ".drill", ".txt"];
const GERBER_TOKENS: &[&str] = &["G04", "G01", "D01", "D02", "D03", "%FS", "%MO"];
const SNIFF_WINDOW: usize = 1000;

/// Detected interchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// Gerber RS-274X (and companion drill files).
    Gerber,
    /// ODB++ structured archive.
    Odbp,
}

/// How certain the detector is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Decided by an unambiguous extension or archive listing.
    High,
    /// Decided by a fallback rule.
    Medium,
}

/// What the caller can show the detector beyond the filename.
#[derive(Debug, Clone, Copy, Default)]
pub enum Peek<'a> {
    /// Nothing besides the name is accessible.
    #[default]
    None,
    /// Raw file or archive bytes.
    Bytes(&'a [u8]),
    /// Entry names of a directory.
    Directory(&'a [String]),
}

/// Successful detection outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Detected format.
    pub format_type: FormatType,
    /// Detection confidence.
    pub confidence: Confidence,
    /// Free-form explanation, if any.
    pub note: Option<String>,
}

impl Detection {
    const fn new(format_type: FormatType, confidence: Confidence) -> Self {
        Self {
            format_type,
            confidence,
            note: None,
        }
    }

    fn with_note(mut self, note: String) -> Self {
        self.note = Some(note);
        self
    }
}

/// Classify an artifact as Gerber or ODB++.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for an empty name and
/// [`AnalysisError::Inconclusive`] when no rule matches.
pub fn detect_format(filename: &str, peek: Peek<'_>) -> Result<Detection, AnalysisError> {
    let name = filename.trim();
    if name.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "no filename or file path provided".to_string(),
        ));
    }

    let lower = name.to_ascii_lowercase();

    if lower.ends_with(".zip") {
        return Ok(detect_zip(peek));
    }

    if ends_with_any(&lower, ODB_SUFFIXES) {
        return Ok(Detection::new(FormatType::Odbp, Confidence::High));
    }

    if ends_with_any(&lower, GERBER_SUFFIXES) {
        return Ok(Detection::new(FormatType::Gerber, Confidence::High));
    }

    match peek {
        Peek::Directory(entries) => {
            if entries
                .iter()
                .any(|entry| ODB_MARKERS.contains(&entry.trim_end_matches('/')))
            {
                return Ok(Detection::new(FormatType::Odbp, Confidence::Medium));
            }
        }
        Peek::Bytes(bytes) => {
            let window = bytes.get(..SNIFF_WINDOW).unwrap_or(bytes);
            let text = String::from_utf8_lossy(window);
            if GERBER_TOKENS.iter().any(|token| text.contains(token)) {
                return Ok(Detection::new(FormatType::Gerber, Confidence::Medium));
            }
        }
        Peek::None => {}
    }

    Err(AnalysisError::Inconclusive(format!(
        "could not detect file format of `{name}`"
    )))
}

fn detect_zip(peek: Peek<'_>) -> Detection {
    let fallback = Detection::new(FormatType::Gerber, Confidence::Medium)
        .with_note("ZIP file (assuming Gerber contents)".to_string());

    let Peek::Bytes(bytes) = peek else {
        return fallback;
    };

    let entries = match zip_entry_names(bytes) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("zip listing failed, assuming Gerber: {err}");
            return fallback;
        }
    };

    let gerber_entries = entries
        .iter()
        .filter(|entry| ends_with_any(&entry.to_ascii_lowercase(), ARCHIVE_GERBER_SUFFIXES))
        .count();
    if gerber_entries > 0 {
        return Detection::new(FormatType::Gerber, Confidence::High).with_note(format!(
            "ZIP contains {gerber_entries} Gerber/drill files"
        ));
    }

    let has_odb_structure = entries.iter().any(|entry| {
        let lower = entry.to_ascii_lowercase();
        ODB_MARKERS.iter().any(|marker| lower.contains(marker))
    });
    if has_odb_structure {
        return Detection::new(FormatType::Odbp, Confidence::High)
            .with_note("ZIP contains ODB++ structure".to_string());
    }

    fallback
}

/// List the entry names of an in-memory ZIP archive.
///
/// # Errors
///
/// Returns the underlying archive error when the bytes are not a readable ZIP.
pub fn zip_entry_names(bytes: &[u8]) -> Result<Vec<String>, zip::result::ZipError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}

fn ends_with_any(name: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|suffix| name.ends_with(suffix))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use super::*;

    fn build_zip(names: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for name in names {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(b"G04 test*\n").expect("write entry");
        }
        writer.finish().expect("finish archive").into_inner()
    }

    #[test]
    fn ut_det_001_zip_with_gerber_entries_is_high_confidence_gerber() {
        let bytes = build_zip(&["top.gbr", "drill.exc"]);
        let result = detect_format("panel.zip", Peek::Bytes(&bytes));
        assert!(result.is_ok());
        if let Ok(detection) = result {
            assert_eq!(detection.format_type, FormatType::Gerber);
            assert_eq!(detection.confidence, Confidence::High);
        }
    }

    #[test]
    fn ut_det_002_zip_with_odb_structure_is_odbp() {
        let bytes = build_zip(&["job/matrix/matrix", "job/steps/pcb/profile"]);
        let result = detect_format("job.zip", Peek::Bytes(&bytes));
        assert!(result.is_ok());
        if let Ok(detection) = result {
            assert_eq!(detection.format_type, FormatType::Odbp);
            assert_eq!(detection.confidence, Confidence::High);
        }
    }

    #[test]
    fn ut_det_003_unreadable_zip_defaults_to_medium_gerber() {
        let result = detect_format("broken.ZIP", Peek::Bytes(b"not a zip"));
        assert!(result.is_ok());
        if let Ok(detection) = result {
            assert_eq!(detection.format_type, FormatType::Gerber);
            assert_eq!(detection.confidence, Confidence::Medium);
        }
    }

    #[test]
    fn ut_det_004_zip_with_unrelated_entries_defaults_to_medium_gerber() {
        let bytes = build_zip(&["readme.md"]);
        let result = detect_format("misc.zip", Peek::Bytes(&bytes));
        assert_eq!(
            result.map(|d| (d.format_type, d.confidence)),
            Ok((FormatType::Gerber, Confidence::Medium))
        );
    }

    #[test]
    fn ut_det_005_extension_rules() {
        let odb = detect_format("board.tar.gz", Peek::None);
        assert_eq!(
            odb.map(|d| (d.format_type, d.confidence)),
            Ok((FormatType::Odbp, Confidence::High))
        );
        let gerber = detect_format("TOP.GBR", Peek::None);
        assert_eq!(
            gerber.map(|d| (d.format_type, d.confidence)),
            Ok((FormatType::Gerber, Confidence::High))
        );
    }

    #[test]
    fn ut_det_006_directory_with_odb_markers_is_medium_odbp() {
        let entries = vec!["matrix".to_string(), "misc".to_string()];
        let result = detect_format("design", Peek::Directory(&entries));
        assert_eq!(
            result.map(|d| (d.format_type, d.confidence)),
            Ok((FormatType::Odbp, Confidence::Medium))
        );
    }

    #[test]
    fn ut_det_007_content_sniffing_finds_gerber_tokens() {
        let result = detect_format("layer.pho", Peek::Bytes(b"%FSLAX25Y25*%\n%MOIN*%\n"));
        assert_eq!(
            result.map(|d| (d.format_type, d.confidence)),
            Ok((FormatType::Gerber, Confidence::Medium))
        );
    }

    #[test]
    fn bc_det_001_unknown_content_is_inconclusive() {
        let result = detect_format("notes.bin", Peek::Bytes(b"hello world"));
        assert!(matches!(result, Err(AnalysisError::Inconclusive(_))));
    }

    #[test]
    fn bc_det_002_empty_name_is_invalid_input() {
        let result = detect_format("  ", Peek::None);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn bc_det_003_tokens_past_sniff_window_are_ignored() {
        let mut content = vec![b' '; SNIFF_WINDOW];
        content.extend_from_slice(b"%FSLAX25Y25*%");
        let result = detect_format("layer.pho", Peek::Bytes(&content));
        assert!(matches!(result, Err(AnalysisError::Inconclusive(_))));
    }
}
