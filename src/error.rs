#![allow(missing_docs)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, YoozError>;

#[derive(Error, Debug)]
pub enum YoozError {
    #[error("Invalid pattern syntax in '{pattern}': {reason}")]
    InvalidPatternSyntax { pattern: String, reason: String },

    #[error("Replacement lists differ in length: {sources} source(s), {targets} target(s)")]
    ReplacementArity { sources: usize, targets: usize },

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}
