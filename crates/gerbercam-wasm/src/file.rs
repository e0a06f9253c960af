//! Session input files.

use serde::{Deserialize, Serialize};

use crate::excellon::DrillParseResult;
use crate::gerber::GerberParseResult;

/// Container format of one uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Gerber RS-274X layer.
    Gerber,
    /// Excellon NC drill file.
    Drill,
    /// ODB++ archive or directory; counted but not parsed.
    Odbp,
}

impl FileFormat {
    /// Lowercase tag used in tallies and JSON.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gerber => "gerber",
            Self::Drill => "drill",
            Self::Odbp => "odbp",
        }
    }
}

/// One file of an analysis session, as handed over by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    /// Original file name.
    pub filename: String,
    /// Container format.
    pub file_format: FileFormat,
    /// Layer role tag such as `copper_top` or `inner_layer_2`.
    pub file_type: String,
    /// Size reported at upload.
    pub byte_size: u64,
    /// File content; never echoed back in results.
    #[serde(default, skip_serializing)]
    pub content: Vec<u8>,
}

impl RawFile {
    /// Builds a file record, taking `byte_size` from the content length.
    pub fn new(
        filename: impl Into<String>,
        file_format: FileFormat,
        file_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            file_format,
            file_type: file_type.into(),
            byte_size: u64::try_from(content.len()).unwrap_or(u64::MAX),
            content,
        }
    }

    /// Whether the design-rule extractor treats this file as copper.
    pub fn is_copper(&self) -> bool {
        let file_type = self.file_type.to_lowercase();
        self.file_format == FileFormat::Gerber
            && (file_type.contains("elec") || file_type.contains("inner_layer"))
    }
}

/// Parse result of one session file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedFile {
    /// Gerber layer result.
    Gerber(GerberParseResult),
    /// Excellon drill result.
    Drill(DrillParseResult),
}

impl ParsedFile {
    /// The Gerber result, if this is one.
    pub const fn as_gerber(&self) -> Option<&GerberParseResult> {
        match self {
            Self::Gerber(result) => Some(result),
            Self::Drill(_) => None,
        }
    }

    /// The drill result, if this is one.
    pub const fn as_drill(&self) -> Option<&DrillParseResult> {
        match self {
            Self::Drill(result) => Some(result),
            Self::Gerber(_) => None,
        }
    }
}
