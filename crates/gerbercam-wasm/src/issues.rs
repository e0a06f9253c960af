//! CAM rule checks over parsed Gerber layers.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::file::{FileFormat, ParsedFile, RawFile};

/// Manufacturing rule thresholds, all in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Minimum trace width.
    pub min_trace_width: f64,
    /// Minimum copper spacing.
    pub min_spacing: f64,
    /// Minimum annular ring.
    pub min_annular_ring: f64,
    /// Minimum finished drill size.
    pub min_drill_size: f64,
    /// Minimum solder mask clearance.
    pub min_solder_mask_clearance: f64,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            min_trace_width: 0.1,
            min_spacing: 0.1,
            min_annular_ring: 0.05,
            min_drill_size: 0.15,
            min_solder_mask_clearance: 0.05,
        }
    }
}

impl RuleSet {
    /// Parses a rule set from JSON; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidInput`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(json).map_err(|err| AnalysisError::InvalidInput(err.to_string()))
    }
}

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// Should be reviewed.
    Warning,
    /// Blocks manufacturing.
    Critical,
}

/// A rule violation found on one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Rule identifier such as `trace_width`.
    pub issue_type: String,
    /// How serious the issue is.
    pub severity: Severity,
    /// Layer tag the issue refers to.
    pub layer_name: Option<String>,
    /// Board position in mm, when known.
    pub location: Option<(f64, f64)>,
    /// What was found.
    pub description: String,
    /// What to do about it.
    pub recommendation: Option<String>,
}

/// Issue tallies by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    /// Critical issues.
    pub critical: usize,
    /// Warnings.
    pub warning: usize,
    /// Informational issues.
    pub info: usize,
}

impl IssueCounts {
    /// Tallies a list of issues.
    pub fn tally(issues: &[Issue]) -> Self {
        issues.iter().fold(Self::default(), |mut counts, issue| {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
            counts
        })
    }

    /// Total issues.
    pub const fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }
}

/// Issues in display order plus their tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueReport {
    /// Most severe first; equal severities keep detection order.
    pub issues: Vec<Issue>,
    /// Tallies by severity.
    pub counts: IssueCounts,
}

impl IssueReport {
    /// Sorts issues for display and tallies them.
    pub fn new(mut issues: Vec<Issue>) -> Self {
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        let counts = IssueCounts::tally(&issues);
        Self { issues, counts }
    }
}

/// Runs the rule checks over every parsed Gerber file.
///
/// The trace-width rule flags a layer whose width is below
/// `min_trace_width * 1000`; layer width (mm) against a threshold in
/// thousandths of a millimeter.
pub fn analyze_issues<'a>(
    entries: impl IntoIterator<Item = (&'a RawFile, Option<&'a ParsedFile>)>,
    rules: &RuleSet,
) -> IssueReport {
    let threshold = rules.min_trace_width * 1000.0;
    let mut issues = Vec::new();

    for (file, parsed) in entries {
        if file.file_format != FileFormat::Gerber {
            continue;
        }
        let Some(result) = parsed.and_then(ParsedFile::as_gerber) else {
            continue;
        };

        if let Some(width) = result.width_mm.filter(|width| *width > 0.0) {
            if width < threshold {
                issues.push(Issue {
                    issue_type: "trace_width".to_string(),
                    severity: Severity::Warning,
                    layer_name: Some(file.file_type.clone()),
                    location: None,
                    description: "Potential trace width issue detected".to_string(),
                    recommendation: Some(format!(
                        "Verify trace widths meet minimum requirement of {}mm",
                        rules.min_trace_width
                    )),
                });
            }
        }
    }

    IssueReport::new(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gerber;

    fn parsed_gerber(data: &[u8]) -> Option<ParsedFile> {
        gerber::GerberParser::without_geometry()
            .parse(data, None)
            .map(ParsedFile::Gerber)
            .ok()
    }

    #[test]
    fn ut_iss_001_default_rules() {
        let rules = RuleSet::default();
        assert!((rules.min_trace_width - 0.1).abs() < f64::EPSILON);
        assert!((rules.min_drill_size - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn ut_iss_002_partial_json_keeps_defaults() {
        let rules = RuleSet::from_json(r#"{"min_trace_width": 0.2}"#);
        assert!(rules.is_ok());
        if let Ok(rules) = rules {
            assert!((rules.min_trace_width - 0.2).abs() < f64::EPSILON);
            assert!((rules.min_spacing - 0.1).abs() < f64::EPSILON);
        }
        assert!(RuleSet::from_json("{").is_err());
    }

    #[test]
    fn ut_iss_003_narrow_layer_raises_trace_width_warning() {
        let file = RawFile::new("top.gbr", FileFormat::Gerber, "copper_top", Vec::new());
        let parsed = parsed_gerber(b"%MOMM*%\nX0Y0D02*\nX5000000Y2000000D01*\n");
        let report = analyze_issues([(&file, parsed.as_ref())], &RuleSet::default());
        assert_eq!(report.counts.warning, 1);
        assert_eq!(report.counts.total(), 1);
        let issue = report.issues.first();
        assert_eq!(issue.map(|i| i.issue_type.as_str()), Some("trace_width"));
        assert_eq!(issue.and_then(|i| i.layer_name.as_deref()), Some("copper_top"));
        assert_eq!(
            issue.and_then(|i| i.recommendation.as_deref()),
            Some("Verify trace widths meet minimum requirement of 0.1mm")
        );
    }

    #[test]
    fn ut_iss_004_wide_layer_passes() {
        let file = RawFile::new("top.gbr", FileFormat::Gerber, "copper_top", Vec::new());
        let parsed = parsed_gerber(b"%MOMM*%\nX0Y0D02*\nX20000000Y2000000D01*\n");
        let report = analyze_issues([(&file, parsed.as_ref())], &RuleSet::default());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn ut_iss_005_display_order_is_severity_then_insertion() {
        let issue = |kind: &str, severity| Issue {
            issue_type: kind.to_string(),
            severity,
            layer_name: None,
            location: None,
            description: String::new(),
            recommendation: None,
        };
        let report = IssueReport::new(vec![
            issue("a", Severity::Info),
            issue("b", Severity::Warning),
            issue("c", Severity::Critical),
            issue("d", Severity::Warning),
        ]);
        let order: Vec<&str> = report.issues.iter().map(|i| i.issue_type.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "d", "a"]);
        assert_eq!(
            report.counts,
            IssueCounts {
                critical: 1,
                warning: 2,
                info: 1
            }
        );
    }

    #[test]
    fn bc_iss_001_drill_and_unparsed_files_are_skipped() {
        let drill = RawFile::new("d.drl", FileFormat::Drill, "drill", Vec::new());
        let top = RawFile::new("top.gbr", FileFormat::Gerber, "copper_top", Vec::new());
        let report = analyze_issues([(&drill, None), (&top, None)], &RuleSet::default());
        assert!(report.issues.is_empty());
    }
}
