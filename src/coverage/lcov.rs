//! LCOV format parser

use log::debug;

use super::{
    Counter, CoverageCounts, CoverageFormat, CoverageSummary, FileCoverage, NormalizedCoverage,
};
use crate::error::CoverageError;

/// Counters for one `SF:` ... `end_of_record` block.
///
/// Explicit `LF`/`LH`, `FNF`/`FNH` and `BRF`/`BRH` totals win over counts
/// derived from the individual `DA`, `FN`/`FNDA` and `BRDA` records.
#[derive(Debug, Default)]
struct FileRecord {
    path: String,
    lines: Counter,
    functions_declared: u64,
    functions_hit: u64,
    branches: Counter,
    lines_found: Option<u64>,
    lines_hit: Option<u64>,
    functions_found: Option<u64>,
    functions_hit_total: Option<u64>,
    branches_found: Option<u64>,
    branches_hit: Option<u64>,
}

impl FileRecord {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn finish(self) -> FileCoverage {
        let lines = Counter::new(
            self.lines_hit.unwrap_or(self.lines.covered),
            self.lines_found.unwrap_or(self.lines.total),
        );
        let functions = Counter::new(
            self.functions_hit_total.unwrap_or(self.functions_hit),
            self.functions_found.unwrap_or(self.functions_declared),
        );
        let branches = Counter::new(
            self.branches_hit.unwrap_or(self.branches.covered),
            self.branches_found.unwrap_or(self.branches.total),
        );

        // LCOV has no separate statement concept
        let counts = CoverageCounts {
            statements: lines,
            branches,
            functions,
            lines,
        };

        FileCoverage::new(self.path, counts.into_summary())
    }
}

fn parse_count(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Parse LCOV content from a string
pub fn parse_lcov_string(content: &str) -> Result<NormalizedCoverage, CoverageError> {
    let mut files: Vec<FileCoverage> = Vec::new();
    let mut current: Option<FileRecord> = None;

    for line in content.lines() {
        let line = line.trim();

        if line == "end_of_record" {
            if let Some(record) = current.take() {
                files.push(record.finish());
            }
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };

        if tag == "SF" {
            // A new block without end_of_record closes the previous one
            if let Some(record) = current.take() {
                files.push(record.finish());
            }
            current = Some(FileRecord::new(value.trim()));
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        match tag {
            "DA" => {
                // DA:<line>,<hits>[,<checksum>]
                let mut fields = value.split(',');
                let hits = fields.nth(1).and_then(parse_count);
                if let Some(hits) = hits {
                    record.lines.hit(hits > 0);
                }
            }
            "LF" => record.lines_found = parse_count(value),
            "LH" => record.lines_hit = parse_count(value),
            "FN" => record.functions_declared += 1,
            "FNDA" => {
                // FNDA:<hits>,<name>
                let hits = value.split(',').next().and_then(parse_count);
                if hits.unwrap_or(0) > 0 {
                    record.functions_hit += 1;
                }
            }
            "FNF" => record.functions_found = parse_count(value),
            "FNH" => record.functions_hit_total = parse_count(value),
            "BRDA" => {
                // BRDA:<line>,<block>,<branch>,<taken>; "-" means never evaluated
                let taken = value.split(',').nth(3).and_then(parse_count);
                record.branches.hit(taken.unwrap_or(0) > 0);
            }
            "BRF" => record.branches_found = parse_count(value),
            "BRH" => record.branches_hit = parse_count(value),
            _ => {}
        }
    }

    if let Some(record) = current.take() {
        files.push(record.finish());
    }

    if files.is_empty() {
        return Err(CoverageError::EmptyCoverageData {
            format: CoverageFormat::Lcov,
        });
    }

    debug!("Parsed {} LCOV file records", files.len());

    Ok(NormalizedCoverage {
        format: CoverageFormat::Lcov,
        summary: CoverageSummary::from_files(&files),
        files,
    })
}
