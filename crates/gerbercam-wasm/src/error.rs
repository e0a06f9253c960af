//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors surfaced by the detection, parsing and aggregation stages.
///
/// Estimators never use these for "could not determine": they return
/// `Option::None` fields instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A referenced file or session is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A format-specific decode failed.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// A required argument is missing or unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The detector could not classify the input.
    #[error("inconclusive: {0}")]
    Inconclusive(String),

    /// A result could not be rendered for the caller.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
