//! Error types for the coverage core.
//!
//! Parsing and detection fail with `CoverageError`; the binary wraps these
//! with `anyhow` context.

use std::path::PathBuf;
use thiserror::Error;

use crate::coverage::CoverageFormat;

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Unrecognized coverage format: {filename}. Supported: lcov, istanbul, cobertura, clover, jacoco")]
    UnrecognizedFormat { filename: String },

    #[error("Invalid {format} report: {detail}")]
    InvalidFormat {
        format: CoverageFormat,
        detail: String,
    },

    #[error("{format} report contains no coverage data")]
    EmptyCoverageData { format: CoverageFormat },

    #[error("Malformed {format} input: {message}")]
    MalformedInput {
        format: CoverageFormat,
        message: String,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoverageError {
    pub(crate) fn invalid(format: CoverageFormat, detail: impl Into<String>) -> Self {
        CoverageError::InvalidFormat {
            format,
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed(format: CoverageFormat, err: impl std::fmt::Display) -> Self {
        CoverageError::MalformedInput {
            format,
            message: err.to_string(),
        }
    }
}
