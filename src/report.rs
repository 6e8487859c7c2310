//! Persisted coverage report
//!
//! The JSON shape written here is read by other tooling; field names are
//! part of that contract.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::coverage::{
    compare_coverage, CoverageComparison, CoverageFormat, CoverageSummary, NormalizedCoverage,
};

/// One run's coverage, optionally compared against a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub timestamp: DateTime<Utc>,
    pub baseline_commit: Option<String>,
    pub current_commit: Option<String>,
    pub threshold: f64,
    pub format: CoverageFormat,
    pub current_summary: CoverageSummary,
    pub baseline_summary: Option<CoverageSummary>,
    pub comparison: Option<CoverageComparison>,
}

/// Commit identifiers stamped on a report
#[derive(Debug, Clone, Default)]
pub struct CommitIds {
    pub baseline: Option<String>,
    pub current: Option<String>,
}

impl CoverageReport {
    /// Build a report for `current`, comparing against `baseline` when one is available.
    pub fn build(
        current: &NormalizedCoverage,
        baseline: Option<&NormalizedCoverage>,
        threshold: f64,
        commits: CommitIds,
    ) -> Self {
        let comparison = baseline.map(|baseline| compare_coverage(current, baseline, threshold));

        Self {
            timestamp: Utc::now(),
            baseline_commit: commits.baseline,
            current_commit: commits.current,
            threshold,
            format: current.format,
            current_summary: current.summary,
            baseline_summary: baseline.map(|b| b.summary),
            comparison,
        }
    }

    pub fn is_regressed(&self) -> bool {
        self.comparison
            .as_ref()
            .map(|c| c.is_regressed())
            .unwrap_or(false)
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                debug!("Creating parent directories: {}", parent.display());
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Report written to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::parse_lcov_string;

    #[test]
    fn test_report_without_baseline() {
        let current = parse_lcov_string("SF:a.rs\nDA:1,1\nend_of_record\n").unwrap();
        let report = CoverageReport::build(&current, None, 1.0, CommitIds::default());

        assert_eq!(report.format, CoverageFormat::Lcov);
        assert!(report.comparison.is_none());
        assert!(report.baseline_summary.is_none());
        assert!(!report.is_regressed());
    }

    #[test]
    fn test_report_fields_are_stable() {
        let current = parse_lcov_string("SF:a.rs\nDA:1,1\nDA:2,0\nend_of_record\n").unwrap();
        let baseline = parse_lcov_string("SF:a.rs\nDA:1,1\nDA:2,1\nend_of_record\n").unwrap();
        let report = CoverageReport::build(
            &current,
            Some(&baseline),
            1.0,
            CommitIds {
                baseline: Some("abc123".to_string()),
                current: None,
            },
        );

        assert!(report.is_regressed());

        let value = serde_json::to_value(&report).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "baseline_commit",
                "baseline_summary",
                "comparison",
                "current_commit",
                "current_summary",
                "format",
                "threshold",
                "timestamp",
            ]
        );
        assert_eq!(value["current_commit"], serde_json::Value::Null);
        assert_eq!(value["format"], "lcov");
        assert_eq!(value["comparison"]["status"], "regressed");
        assert_eq!(value["comparison"]["metrics"][3]["metric"], "lines");
    }
}
