//! Excellon drill file parsing.

pub mod parser;
pub mod types;

pub use parser::parse;
pub use types::DrillParseResult;
