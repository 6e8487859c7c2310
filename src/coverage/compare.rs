//! Baseline vs current coverage comparison

use colored::Colorize;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{round_percent, Metric, MetricKind, NormalizedCoverage};

/// Files whose line coverage moved by this many points or less are noise.
pub const FILE_NOISE_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    Improved,
    Regressed,
    Unchanged,
}

impl ComparisonStatus {
    /// Classify a percentage-point delta against the tolerated regression.
    pub fn classify(delta: f64, threshold: f64) -> Self {
        if delta > 0.0 {
            ComparisonStatus::Improved
        } else if delta < -threshold {
            ComparisonStatus::Regressed
        } else {
            ComparisonStatus::Unchanged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonStatus::Improved => "improved",
            ComparisonStatus::Regressed => "regressed",
            ComparisonStatus::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: MetricKind,
    pub baseline: Metric,
    pub current: Metric,
    pub delta: f64,
    pub status: ComparisonStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileComparison {
    pub path: String,
    pub delta: f64,
    pub status: ComparisonStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageComparison {
    pub metrics: Vec<MetricComparison>,
    pub files: Vec<FileComparison>,
    pub status: ComparisonStatus,
    pub delta: f64,
}

impl CoverageComparison {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == kind)
    }

    pub fn is_regressed(&self) -> bool {
        self.status == ComparisonStatus::Regressed
    }

    pub fn print_summary(&self) {
        println!("Coverage comparison:");

        for m in &self.metrics {
            let indicator = match m.status {
                ComparisonStatus::Improved => "↑".green(),
                ComparisonStatus::Regressed => "↓".red(),
                ComparisonStatus::Unchanged => "→".dimmed(),
            };

            println!(
                "  {} {:<10} {:.2}% → {:.2}% ({})",
                indicator,
                m.metric.as_str(),
                m.baseline.percentage,
                m.current.percentage,
                format_delta(m.delta, m.status)
            );
        }

        if !self.files.is_empty() {
            println!("\nChanged files:");
            for file in &self.files {
                println!("  {} {}", format_delta(file.delta, file.status), file.path);
            }
        }

        let overall = match self.status {
            ComparisonStatus::Improved => self.status.as_str().green().bold(),
            ComparisonStatus::Regressed => self.status.as_str().red().bold(),
            ComparisonStatus::Unchanged => self.status.as_str().dimmed(),
        };
        println!("\nOverall: {} ({:+.2}%)", overall, self.delta);
    }
}

fn format_delta(delta: f64, status: ComparisonStatus) -> colored::ColoredString {
    let text = format!("{:+.2}%", delta);
    match status {
        ComparisonStatus::Improved => text.green(),
        ComparisonStatus::Regressed => text.red(),
        ComparisonStatus::Unchanged => text.dimmed(),
    }
}

fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        warn!("Threshold is NaN, using 0");
        return 0.0;
    }
    let clamped = threshold.clamp(0.0, 100.0);
    if clamped != threshold {
        warn!("Threshold {} out of range, using {}", threshold, clamped);
    }
    clamped
}

/// Compare current coverage against a baseline.
///
/// `threshold` is how many percentage points a metric may drop before it is
/// regressed. Any regressed metric makes the whole comparison regressed.
pub fn compare_coverage(
    current: &NormalizedCoverage,
    baseline: &NormalizedCoverage,
    threshold: f64,
) -> CoverageComparison {
    let threshold = clamp_threshold(threshold);

    let metrics: Vec<MetricComparison> = MetricKind::ALL
        .iter()
        .map(|&kind| {
            let baseline = *baseline.summary.metric(kind);
            let current = *current.summary.metric(kind);
            let delta = round_percent(current.percentage - baseline.percentage);

            MetricComparison {
                metric: kind,
                baseline,
                current,
                delta,
                status: ComparisonStatus::classify(delta, threshold),
            }
        })
        .collect();

    let mut baseline_files: HashMap<&str, &Metric> = HashMap::new();
    for file in &baseline.files {
        baseline_files.entry(file.path.as_str()).or_insert(&file.lines);
    }

    // Added and removed files have nothing to diff against
    let mut files: Vec<FileComparison> = Vec::new();
    for file in &current.files {
        let Some(before) = baseline_files.remove(file.path.as_str()) else {
            continue;
        };

        let delta = round_percent(file.lines.percentage - before.percentage);
        if delta.abs() > FILE_NOISE_FLOOR {
            files.push(FileComparison {
                path: file.path.clone(),
                delta,
                status: ComparisonStatus::classify(delta, threshold),
            });
        }
    }

    files.sort_by(|a, b| a.delta.total_cmp(&b.delta).then_with(|| a.path.cmp(&b.path)));

    let status = if metrics.iter().any(|m| m.status == ComparisonStatus::Regressed) {
        ComparisonStatus::Regressed
    } else if metrics.iter().any(|m| m.status == ComparisonStatus::Improved) {
        ComparisonStatus::Improved
    } else {
        ComparisonStatus::Unchanged
    };

    let delta = round_percent(metrics.iter().map(|m| m.delta).sum::<f64>() / metrics.len() as f64);

    CoverageComparison {
        metrics,
        files,
        status,
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CoverageFormat, CoverageSummary, FileCoverage};

    fn summary(statements: f64, branches: f64, functions: f64, lines: f64) -> CoverageSummary {
        // percentages over 10_000 so two decimals survive exactly
        let metric = |pct: f64| Metric::new((pct * 100.0).round() as u64, 10_000);
        CoverageSummary {
            statements: metric(statements),
            branches: metric(branches),
            functions: metric(functions),
            lines: metric(lines),
        }
    }

    fn coverage(summary: CoverageSummary, files: Vec<FileCoverage>) -> NormalizedCoverage {
        NormalizedCoverage {
            format: CoverageFormat::Lcov,
            summary,
            files,
        }
    }

    fn file(path: &str, covered: u64, total: u64) -> FileCoverage {
        FileCoverage::new(
            path,
            CoverageSummary {
                lines: Metric::new(covered, total),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_identical_snapshots_are_unchanged() {
        let snapshot = coverage(
            summary(81.5, 40.0, 90.0, 80.0),
            vec![file("a.rs", 3, 4), file("b.rs", 0, 0)],
        );

        for threshold in [0.0, 0.5, 5.0, 100.0] {
            let comparison = compare_coverage(&snapshot, &snapshot, threshold);
            assert_eq!(comparison.status, ComparisonStatus::Unchanged);
            assert_eq!(comparison.delta, 0.0);
            assert!(comparison.files.is_empty());
            assert!(comparison.metrics.iter().all(|m| m.delta == 0.0));
        }
    }

    #[test]
    fn test_metric_order_is_fixed() {
        let snapshot = coverage(summary(1.0, 2.0, 3.0, 4.0), vec![]);
        let comparison = compare_coverage(&snapshot, &snapshot, 1.0);
        let kinds: Vec<MetricKind> = comparison.metrics.iter().map(|m| m.metric).collect();
        assert_eq!(kinds, MetricKind::ALL.to_vec());
    }

    #[test]
    fn test_lines_drop_against_threshold() {
        let baseline = coverage(summary(90.0, 90.0, 90.0, 80.0), vec![]);
        let current = coverage(summary(90.0, 90.0, 90.0, 78.0), vec![]);

        let comparison = compare_coverage(&current, &baseline, 1.0);
        let lines = comparison.metric(MetricKind::Lines).unwrap();
        assert_eq!(lines.delta, -2.0);
        assert_eq!(lines.status, ComparisonStatus::Regressed);
        assert!(comparison.is_regressed());

        let comparison = compare_coverage(&current, &baseline, 3.0);
        let lines = comparison.metric(MetricKind::Lines).unwrap();
        assert_eq!(lines.status, ComparisonStatus::Unchanged);
        assert_eq!(comparison.status, ComparisonStatus::Unchanged);
    }

    #[test]
    fn test_drop_equal_to_threshold_is_tolerated() {
        let baseline = coverage(summary(50.0, 50.0, 50.0, 50.0), vec![]);
        let current = coverage(summary(49.0, 50.0, 50.0, 50.0), vec![]);

        let comparison = compare_coverage(&current, &baseline, 1.0);
        assert_eq!(
            comparison.metric(MetricKind::Statements).unwrap().status,
            ComparisonStatus::Unchanged
        );
    }

    #[test]
    fn test_regression_dominates_improvement() {
        let baseline = coverage(summary(50.0, 50.0, 50.0, 50.0), vec![]);
        let current = coverage(summary(60.0, 40.0, 50.0, 50.0), vec![]);

        let comparison = compare_coverage(&current, &baseline, 1.0);
        assert_eq!(comparison.status, ComparisonStatus::Regressed);
        assert_eq!(comparison.delta, 0.0);

        let current = coverage(summary(60.0, 49.5, 50.0, 50.0), vec![]);
        let comparison = compare_coverage(&current, &baseline, 1.0);
        assert_eq!(comparison.status, ComparisonStatus::Improved);
        assert_eq!(comparison.delta, 2.38);
    }

    #[test]
    fn test_threshold_monotonic() {
        let baseline = coverage(summary(70.0, 60.0, 80.0, 75.0), vec![]);
        let current = coverage(summary(68.5, 61.0, 77.0, 75.0), vec![]);

        let mut previous: Option<CoverageComparison> = None;
        for threshold in [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 10.0] {
            let comparison = compare_coverage(&current, &baseline, threshold);
            if let Some(before) = &previous {
                for (old, new) in before.metrics.iter().zip(&comparison.metrics) {
                    if old.status == ComparisonStatus::Unchanged {
                        assert_ne!(new.status, ComparisonStatus::Regressed);
                    }
                    if old.status == ComparisonStatus::Regressed {
                        assert_ne!(new.status, ComparisonStatus::Improved);
                    }
                }
            }
            previous = Some(comparison);
        }
    }

    #[test]
    fn test_threshold_is_clamped() {
        let baseline = coverage(summary(50.0, 50.0, 50.0, 50.0), vec![]);
        let current = coverage(summary(49.0, 50.0, 50.0, 50.0), vec![]);

        // negative behaves as 0
        assert!(compare_coverage(&current, &baseline, -5.0).is_regressed());
        assert!(compare_coverage(&current, &baseline, f64::NAN).is_regressed());
        assert!(!compare_coverage(&current, &baseline, 500.0).is_regressed());
    }

    #[test]
    fn test_file_noise_floor() {
        let baseline = coverage(
            summary(80.0, 80.0, 80.0, 80.0),
            vec![file("exact.rs", 800, 1000), file("above.rs", 8000, 10000)],
        );
        let current = coverage(
            summary(80.0, 80.0, 80.0, 80.0),
            vec![file("exact.rs", 801, 1000), file("above.rs", 8011, 10000)],
        );

        let comparison = compare_coverage(&current, &baseline, 1.0);
        assert_eq!(comparison.files.len(), 1);
        assert_eq!(comparison.files[0].path, "above.rs");
        assert_eq!(comparison.files[0].delta, 0.11);
        assert_eq!(comparison.files[0].status, ComparisonStatus::Improved);
    }

    #[test]
    fn test_files_sorted_most_regressed_first() {
        let baseline = coverage(
            summary(50.0, 50.0, 50.0, 50.0),
            vec![
                file("up.rs", 1, 2),
                file("down_a_lot.rs", 4, 4),
                file("down.rs", 3, 4),
                file("removed.rs", 1, 1),
            ],
        );
        let current = coverage(
            summary(50.0, 50.0, 50.0, 50.0),
            vec![
                file("added.rs", 0, 1),
                file("up.rs", 2, 2),
                file("down.rs", 2, 4),
                file("down_a_lot.rs", 1, 4),
            ],
        );

        let comparison = compare_coverage(&current, &baseline, 30.0);
        let paths: Vec<&str> = comparison.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["down_a_lot.rs", "down.rs", "up.rs"]);

        assert_eq!(comparison.files[0].delta, -75.0);
        assert_eq!(comparison.files[0].status, ComparisonStatus::Regressed);
        assert_eq!(comparison.files[1].delta, -25.0);
        assert_eq!(comparison.files[1].status, ComparisonStatus::Unchanged);
        assert_eq!(comparison.files[2].status, ComparisonStatus::Improved);
    }

    #[test]
    fn test_comparison_across_formats() {
        let baseline = NormalizedCoverage {
            format: CoverageFormat::Jacoco,
            summary: summary(50.0, 50.0, 50.0, 50.0),
            files: vec![],
        };
        let current = coverage(summary(55.0, 50.0, 50.0, 50.0), vec![]);

        let comparison = compare_coverage(&current, &baseline, 0.0);
        assert_eq!(comparison.status, ComparisonStatus::Improved);
        assert_eq!(comparison.delta, 1.25);
    }
}
