//! One analysis session, run end to end.
//!
//! Every file is parsed on its own first; the summary, design rules and issue
//! checks run only once all files have been parsed.

use serde::Serialize;

use crate::detect::{self, Detection, Peek};
use crate::error::AnalysisError;
use crate::excellon::{self, DrillParseResult};
use crate::file::{FileFormat, ParsedFile, RawFile};
use crate::gerber::{GerberParseResult, GerberParser};
use crate::issues::{analyze_issues, IssueReport, RuleSet};
use crate::layer::{self, FileDetails};
use crate::rules::{self, CopperRules, DesignRuleEstimate};
use crate::summary::{summarize, AnalysisSummary};

/// A file that could not be parsed; the session continues without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// File name.
    pub filename: String,
    /// Why parsing failed.
    pub reason: String,
}

/// Everything one session run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    /// Board-level summary.
    pub summary: AnalysisSummary,
    /// Design rules across copper layers.
    pub design_rules: CopperRules,
    /// Rule violations.
    pub issues: IssueReport,
    /// Files skipped because they failed to parse.
    pub failures: Vec<FileFailure>,
}

impl SessionReport {
    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Serialization`] if rendering fails.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| AnalysisError::Serialization(err.to_string()))
    }
}

/// The files of one analysis session.
#[derive(Debug, Clone)]
pub struct Session {
    files: Vec<RawFile>,
    parser: GerberParser,
}

impl Session {
    /// Creates a session over `files` with the default Gerber parser.
    pub fn new(files: Vec<RawFile>) -> Self {
        Self {
            files,
            parser: GerberParser::new(),
        }
    }

    /// Replaces the Gerber parser used for every layer.
    #[must_use]
    pub const fn with_parser(mut self, parser: GerberParser) -> Self {
        self.parser = parser;
        self
    }

    /// Parses one file according to its format.
    ///
    /// ODB++ files are not parsed and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the parser's error for empty or undecodable content.
    pub fn parse_file(&self, file: &RawFile) -> Result<Option<ParsedFile>, AnalysisError> {
        match file.file_format {
            FileFormat::Gerber => self
                .parser
                .parse(&file.content, Some(&file.file_type))
                .map(|result| Some(ParsedFile::Gerber(result))),
            FileFormat::Drill => {
                excellon::parse(&file.content).map(|result| Some(ParsedFile::Drill(result)))
            }
            FileFormat::Odbp => {
                log::debug!("{}: ODB++ content is tallied but not parsed", file.filename);
                Ok(None)
            }
        }
    }

    /// Parses every file, then builds the summary, design rules and issues.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidInput`] for a session without files.
    /// Individual parse failures are reported in [`SessionReport::failures`].
    pub fn run(&self, rule_set: &RuleSet) -> Result<SessionReport, AnalysisError> {
        if self.files.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "session contains no files".to_string(),
            ));
        }

        let mut failures = Vec::new();
        let parsed: Vec<Option<ParsedFile>> = self
            .files
            .iter()
            .map(|file| {
                self.parse_file(file).unwrap_or_else(|err| {
                    log::warn!("{}: {err}", file.filename);
                    failures.push(FileFailure {
                        filename: file.filename.clone(),
                        reason: err.to_string(),
                    });
                    None
                })
            })
            .collect();

        let entries = || self.files.iter().zip(parsed.iter().map(Option::as_ref));

        let summary = summarize(entries());
        let design_rules = rules::extract_copper_rules(&self.files);
        let issues = analyze_issues(entries(), rule_set);

        log::info!(
            "session analyzed: {} files, {} parsed, {} issues",
            summary.file_count,
            summary.parsed_files_count,
            issues.counts.total()
        );

        Ok(SessionReport {
            summary,
            design_rules,
            issues,
            failures,
        })
    }
}

/// Engine operations that can be requested by name from outside the crate.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// Classify a file or archive.
    DetectFormat {
        /// File name.
        filename: &'a str,
        /// Content available for sniffing.
        peek: Peek<'a>,
    },
    /// Parse one Gerber layer.
    ParseGerber {
        /// File content.
        data: &'a [u8],
        /// Layer tag carried into the result.
        file_type: Option<&'a str>,
    },
    /// Parse one Excellon drill file.
    ParseDrill {
        /// File content.
        data: &'a [u8],
    },
    /// Estimate design rules for one Gerber layer.
    ExtractDesignRules {
        /// File content.
        data: &'a [u8],
    },
    /// Collect command statistics and purpose for one file.
    InspectFile(&'a RawFile),
    /// Run a whole session.
    AnalyzeSession {
        /// Session files.
        files: &'a [RawFile],
        /// Rule thresholds.
        rules: &'a RuleSet,
    },
}

/// Result of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", content = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// From [`Operation::DetectFormat`].
    Detection(Detection),
    /// From [`Operation::ParseGerber`].
    Gerber(GerberParseResult),
    /// From [`Operation::ParseDrill`].
    Drill(DrillParseResult),
    /// From [`Operation::ExtractDesignRules`].
    DesignRules(DesignRuleEstimate),
    /// From [`Operation::InspectFile`].
    FileDetails(FileDetails),
    /// From [`Operation::AnalyzeSession`].
    Session(SessionReport),
}

impl Operation<'_> {
    /// Stable name of the operation.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DetectFormat { .. } => "detect_format",
            Self::ParseGerber { .. } => "parse_gerber",
            Self::ParseDrill { .. } => "parse_drill",
            Self::ExtractDesignRules { .. } => "extract_design_rules",
            Self::InspectFile(_) => "inspect_file",
            Self::AnalyzeSession { .. } => "analyze_session",
        }
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying stage.
    pub fn run(self) -> Result<Outcome, AnalysisError> {
        log::debug!("running {}", self.name());
        match self {
            Self::DetectFormat { filename, peek } => {
                detect::detect_format(filename, peek).map(Outcome::Detection)
            }
            Self::ParseGerber { data, file_type } => {
                GerberParser::new().parse(data, file_type).map(Outcome::Gerber)
            }
            Self::ParseDrill { data } => excellon::parse(data).map(Outcome::Drill),
            Self::ExtractDesignRules { data } => Ok(Outcome::DesignRules(rules::extract(data))),
            Self::InspectFile(file) => Ok(Outcome::FileDetails(layer::inspect_file(file))),
            Self::AnalyzeSession { files, rules: rule_set } => Session::new(files.to_vec())
                .run(rule_set)
                .map(Outcome::Session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COPPER: &[u8] =
        b"%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.1*%\n%ADD11C,0.15*%\n%ADD12C,0.5*%\nD10*\nX0Y0D02*\nX3000000Y2000000D01*\nM02*\n";
    const INNER: &[u8] = b"%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.2*%\nD10*\nX0Y0D02*\nX1000000Y1000000D01*\nM02*\n";
    const DRILL: &[u8] = b"M48\nMETRIC\nT1C0.3\n%\nT1\nX1.0Y1.0\nX2.0Y1.0\nM30\n";

    fn session_files() -> Vec<RawFile> {
        vec![
            RawFile::new("top.gbr", FileFormat::Gerber, "copper_top", COPPER.to_vec()),
            RawFile::new("elec1.gbr", FileFormat::Gerber, "inner_layer_1", INNER.to_vec()),
            RawFile::new("drill.exc", FileFormat::Drill, "drill", DRILL.to_vec()),
        ]
    }

    #[test]
    fn ut_ses_001_run_produces_full_report() {
        let session = Session::new(session_files()).with_parser(GerberParser::without_geometry());
        let report = session.run(&RuleSet::default());
        assert!(report.is_ok(), "expected Ok, got {:?}", report.as_ref().err());
        if let Ok(report) = report {
            assert_eq!(report.summary.layer_count, Some(2));
            assert_eq!(report.summary.total_vias, 2);
            assert_eq!(report.summary.total_pads, 4);
            assert_eq!(report.summary.board_width_mm, Some(30.0));
            assert_eq!(report.summary.board_height_mm, Some(20.0));
            assert!(report.failures.is_empty());
            assert_eq!(report.design_rules.layer_results.len(), 1);
            assert_eq!(report.issues.counts.warning, 2);
        }
    }

    #[test]
    fn ut_ses_002_failures_do_not_abort() {
        let mut files = session_files();
        files.push(RawFile::new("empty.gbr", FileFormat::Gerber, "silk_top", Vec::new()));
        let report = Session::new(files).run(&RuleSet::default());
        assert!(report.is_ok());
        if let Ok(report) = report {
            assert_eq!(report.failures.len(), 1);
            assert_eq!(
                report.failures.first().map(|f| f.filename.as_str()),
                Some("empty.gbr")
            );
            assert_eq!(report.summary.file_count, 4);
            assert_eq!(report.summary.parsed_files_count, 3);
        }
    }

    #[test]
    fn ut_ses_003_report_renders_as_json() {
        let report = Session::new(session_files()).run(&RuleSet::default());
        let json = report.and_then(|report| report.to_json());
        assert!(json.is_ok());
        if let Ok(json) = json {
            let value: Result<serde_json::Value, _> = serde_json::from_str(&json);
            assert!(value.is_ok());
            if let Ok(value) = value {
                assert!(value.get("summary").is_some());
                assert!(value.get("design_rules").is_some());
                assert!(value.get("issues").is_some());
                assert!(value.get("failures").is_some());
            }
        }
    }

    #[test]
    fn ut_ses_004_operations_dispatch_by_variant() {
        let outcome = Operation::ParseDrill { data: DRILL }.run();
        assert!(matches!(outcome, Ok(Outcome::Drill(_))));

        let detection = Operation::DetectFormat {
            filename: "top.gbr",
            peek: Peek::None,
        }
        .run();
        assert!(matches!(detection, Ok(Outcome::Detection(_))));

        let rules = Operation::ExtractDesignRules { data: COPPER }.run();
        assert!(
            matches!(rules, Ok(Outcome::DesignRules(_))),
            "expected design rules, got {rules:?}"
        );
        if let Ok(Outcome::DesignRules(estimate)) = rules {
            assert_eq!(estimate.trace_width_mm, Some(0.1));
        }

        assert_eq!(
            Operation::ParseGerber {
                data: COPPER,
                file_type: None
            }
            .name(),
            "parse_gerber"
        );
    }

    #[test]
    fn bc_ses_001_empty_session_is_invalid() {
        let report = Session::new(Vec::new()).run(&RuleSet::default());
        assert!(matches!(report, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn bc_ses_002_odb_files_are_tallied_only() {
        let files = vec![RawFile::new(
            "job.tgz",
            FileFormat::Odbp,
            "odbp_archive",
            vec![0x1f, 0x8b],
        )];
        let report = Session::new(files).run(&RuleSet::default());
        assert!(report.is_ok(), "expected Ok, got {:?}", report.as_ref().err());
        if let Ok(report) = report {
            assert_eq!(report.summary.file_format, FileFormat::Odbp);
            assert_eq!(report.summary.parsed_files_count, 0);
            assert!(report.failures.is_empty());
        }
    }

    #[test]
    fn bc_ses_003_undecodable_layer_does_not_abort_session() {
        let files = vec![
            RawFile::new(
                "top.gbr",
                FileFormat::Gerber,
                "copper_top",
                b"G0\nX100Y100D01*\n".to_vec(),
            ),
            RawFile::new("bottom.gbr", FileFormat::Gerber, "copper_bottom", COPPER.to_vec()),
        ];
        let report = Session::new(files).run(&RuleSet::default());
        assert!(report.is_ok(), "expected Ok, got {:?}", report.as_ref().err());
        if let Ok(report) = report {
            assert!(report.failures.is_empty());
            assert_eq!(report.summary.parsed_files_count, 2);
            assert_eq!(report.summary.layer_count, Some(2));
        }
    }
}
