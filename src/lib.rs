//! covdelta - coverage report normalization and baseline comparison
//!
//! A library for reducing coverage reports to one model and diffing them:
//! - Format detection for LCOV, Istanbul, Cobertura, Clover and JaCoCo
//! - One parser per format, all producing `NormalizedCoverage`
//! - Baseline vs current comparison with a regression threshold
//! - A persisted JSON report for downstream tooling

pub mod config;
pub mod coverage;
pub mod error;
pub mod git;
pub mod report;

pub use coverage::{
    compare_coverage, detect_format, parse_coverage, parse_coverage_file, parse_format_hint,
    parser_for, ComparisonStatus, CoverageComparison, CoverageFormat, CoverageParser,
    CoverageSummary, FileComparison, FileCoverage, Metric, MetricComparison, MetricKind,
    NormalizedCoverage,
};
pub use error::CoverageError;
pub use report::{CommitIds, CoverageReport};
