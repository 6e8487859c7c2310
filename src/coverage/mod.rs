//! Coverage module
//!
//! Provides:
//! - The normalized coverage model shared by every format
//! - Format detection
//! - LCOV, Istanbul, Cobertura, Clover and JaCoCo parsing
//! - The parser registry

mod clover;
mod cobertura;
mod compare;
mod detect;
mod istanbul;
mod jacoco;
mod lcov;
mod registry;
mod xml;

pub use clover::*;
pub use cobertura::*;
pub use compare::*;
pub use detect::*;
pub use istanbul::*;
pub use jacoco::*;
pub use lcov::*;
pub use registry::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoverageError;

/// Round a percentage to two decimals.
pub(crate) fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Coverage formats understood by the parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageFormat {
    Lcov,
    Istanbul,
    Cobertura,
    Clover,
    Jacoco,
}

impl CoverageFormat {
    pub const ALL: [CoverageFormat; 5] = [
        CoverageFormat::Lcov,
        CoverageFormat::Istanbul,
        CoverageFormat::Cobertura,
        CoverageFormat::Clover,
        CoverageFormat::Jacoco,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageFormat::Lcov => "lcov",
            CoverageFormat::Istanbul => "istanbul",
            CoverageFormat::Cobertura => "cobertura",
            CoverageFormat::Clover => "clover",
            CoverageFormat::Jacoco => "jacoco",
        }
    }
}

impl fmt::Display for CoverageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverageFormat {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        CoverageFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .ok_or_else(|| CoverageError::UnrecognizedFormat {
                filename: format!("format name '{}'", s),
            })
    }
}

/// Parse a user-supplied format name, where `auto` means "detect from content".
pub fn parse_format_hint(name: &str) -> Result<Option<CoverageFormat>, CoverageError> {
    if name.trim().eq_ignore_ascii_case("auto") {
        Ok(None)
    } else {
        name.parse().map(Some)
    }
}

/// A covered/total pair with its percentage.
///
/// An empty denominator counts as fully covered, so `total == 0` always
/// yields `100.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub total: u64,
    pub covered: u64,
    pub percentage: f64,
}

impl Metric {
    pub fn new(covered: u64, total: u64) -> Self {
        let covered = covered.min(total);
        let percentage = if total == 0 {
            100.0
        } else {
            round_percent(covered as f64 / total as f64 * 100.0)
        };

        Self {
            total,
            covered,
            percentage,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0)
    }
}

impl Default for Metric {
    fn default() -> Self {
        Self::empty()
    }
}

/// The four metric kinds, in the order comparisons report them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Statements,
    Branches,
    Functions,
    Lines,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Statements,
        MetricKind::Branches,
        MetricKind::Functions,
        MetricKind::Lines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Statements => "statements",
            MetricKind::Branches => "branches",
            MetricKind::Functions => "functions",
            MetricKind::Lines => "lines",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate coverage for a whole report
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub statements: Metric,
    pub branches: Metric,
    pub functions: Metric,
    pub lines: Metric,
}

impl CoverageSummary {
    pub fn metric(&self, kind: MetricKind) -> &Metric {
        match kind {
            MetricKind::Statements => &self.statements,
            MetricKind::Branches => &self.branches,
            MetricKind::Functions => &self.functions,
            MetricKind::Lines => &self.lines,
        }
    }

    /// Sum covered/total per kind across files and recompute the percentages.
    pub fn from_files(files: &[FileCoverage]) -> Self {
        let mut totals = CoverageCounts::default();
        for file in files {
            totals.add_summary(&file.summary());
        }
        totals.into_summary()
    }
}

/// Coverage for a single file, path as reported by the tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub path: String,
    pub statements: Metric,
    pub branches: Metric,
    pub functions: Metric,
    pub lines: Metric,
}

impl FileCoverage {
    pub fn new(path: impl Into<String>, summary: CoverageSummary) -> Self {
        Self {
            path: path.into(),
            statements: summary.statements,
            branches: summary.branches,
            functions: summary.functions,
            lines: summary.lines,
        }
    }

    pub fn summary(&self) -> CoverageSummary {
        CoverageSummary {
            statements: self.statements,
            branches: self.branches,
            functions: self.functions,
            lines: self.lines,
        }
    }
}

/// Parser output: one report reduced to the common model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCoverage {
    pub format: CoverageFormat,
    pub summary: CoverageSummary,
    pub files: Vec<FileCoverage>,
}

/// Raw covered/total accumulator for one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counter {
    pub covered: u64,
    pub total: u64,
}

impl Counter {
    pub fn new(covered: u64, total: u64) -> Self {
        Self { covered, total }
    }

    pub fn hit(&mut self, covered: bool) {
        self.total = self.total.saturating_add(1);
        if covered {
            self.covered = self.covered.saturating_add(1);
        }
    }

    pub fn add(&mut self, other: Counter) {
        self.covered = self.covered.saturating_add(other.covered);
        self.total = self.total.saturating_add(other.total);
    }

    pub fn metric(&self) -> Metric {
        Metric::new(self.covered, self.total)
    }
}

/// Raw counters for all four kinds, summed before percentages are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CoverageCounts {
    pub statements: Counter,
    pub branches: Counter,
    pub functions: Counter,
    pub lines: Counter,
}

impl CoverageCounts {
    pub fn add(&mut self, other: &CoverageCounts) {
        self.statements.add(other.statements);
        self.branches.add(other.branches);
        self.functions.add(other.functions);
        self.lines.add(other.lines);
    }

    pub fn add_summary(&mut self, summary: &CoverageSummary) {
        let counter = |m: &Metric| Counter::new(m.covered, m.total);
        self.statements.add(counter(&summary.statements));
        self.branches.add(counter(&summary.branches));
        self.functions.add(counter(&summary.functions));
        self.lines.add(counter(&summary.lines));
    }

    pub fn into_summary(self) -> CoverageSummary {
        CoverageSummary {
            statements: self.statements.metric(),
            branches: self.branches.metric(),
            functions: self.functions.metric(),
            lines: self.lines.metric(),
        }
    }
}
