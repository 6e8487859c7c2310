//! Istanbul / NYC JSON format parser (`coverage-final.json`)

use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::{
    Counter, CoverageCounts, CoverageFormat, CoverageSummary, FileCoverage, NormalizedCoverage,
};
use crate::error::CoverageError;

#[derive(Debug, Deserialize)]
struct Position {
    line: u64,
}

#[derive(Debug, Deserialize)]
struct Span {
    start: Position,
    end: Position,
}

/// One entry of the top-level map. Location maps and hit maps share keys.
#[derive(Debug, Deserialize)]
struct FileRecord {
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "statementMap", default)]
    statement_map: HashMap<String, Span>,
    #[serde(default)]
    s: HashMap<String, u64>,
    #[serde(rename = "fnMap", default)]
    fn_map: HashMap<String, Value>,
    #[serde(default)]
    f: HashMap<String, u64>,
    #[serde(default)]
    b: HashMap<String, Vec<u64>>,
}

/// Count location entries whose hit map value under the same key is positive.
fn covered_keys<'a>(
    keys: impl Iterator<Item = &'a String>,
    hits: &HashMap<String, u64>,
) -> Counter {
    let mut counter = Counter::default();
    for key in keys {
        counter.hit(hits.get(key).copied().unwrap_or(0) > 0);
    }
    counter
}

impl FileRecord {
    fn counts(&self) -> CoverageCounts {
        let statements = covered_keys(self.statement_map.keys(), &self.s);
        let functions = covered_keys(self.fn_map.keys(), &self.f);

        // Each group has as many outcomes as its hit array; a 2-way `if`
        // and an N-way `a || b || c` chain contribute 2 and N respectively.
        let mut branches = Counter::default();
        for outcomes in self.b.values() {
            for &hits in outcomes {
                branches.hit(hits > 0);
            }
        }

        CoverageCounts {
            statements,
            branches,
            functions,
            lines: self.line_counts(),
        }
    }

    /// Istanbul has no line map: rebuild it from the lines each statement spans.
    fn line_counts(&self) -> Counter {
        let mut all_lines = BTreeSet::new();
        let mut hit_lines = BTreeSet::new();

        for (id, span) in &self.statement_map {
            let hit = self.s.get(id).copied().unwrap_or(0) > 0;
            let last = span.end.line.max(span.start.line);
            for line in span.start.line..=last {
                all_lines.insert(line);
                if hit {
                    hit_lines.insert(line);
                }
            }
        }

        Counter::new(hit_lines.len() as u64, all_lines.len() as u64)
    }
}

/// Parse Istanbul JSON content from a string
pub fn parse_istanbul_string(content: &str) -> Result<NormalizedCoverage, CoverageError> {
    let format = CoverageFormat::Istanbul;

    let root: Value =
        serde_json::from_str(content).map_err(|e| CoverageError::malformed(format, e))?;

    let Value::Object(entries) = root else {
        return Err(CoverageError::invalid(
            format,
            "top-level value must be an object keyed by file path",
        ));
    };

    if entries.is_empty() {
        return Err(CoverageError::EmptyCoverageData { format });
    }

    let mut files = Vec::with_capacity(entries.len());

    for (key, value) in entries {
        let record: FileRecord = serde_json::from_value(value)
            .map_err(|e| CoverageError::malformed(format, format!("{}: {}", key, e)))?;

        let counts = record.counts();
        let path = record.path.unwrap_or(key);
        files.push(FileCoverage::new(path, counts.into_summary()));
    }

    debug!("Parsed {} Istanbul file records", files.len());

    Ok(NormalizedCoverage {
        format,
        summary: CoverageSummary::from_files(&files),
        files,
    })
}
