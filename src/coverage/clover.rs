//! Clover XML format parser

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::xml::{attr, attr_u64};
use super::{
    Counter, CoverageCounts, CoverageFormat, CoverageSummary, FileCoverage, NormalizedCoverage,
};
use crate::error::CoverageError;

/// Counts from a `metrics` element. Clover has no line metric, so lines
/// mirror statements.
fn metrics_counts(e: &BytesStart) -> CoverageCounts {
    let statements = metric_pair(e, b"coveredstatements", b"statements");
    CoverageCounts {
        statements,
        branches: metric_pair(e, b"coveredconditionals", b"conditionals"),
        functions: metric_pair(e, b"coveredmethods", b"methods"),
        lines: statements,
    }
}

fn metric_pair(e: &BytesStart, covered: &[u8], total: &[u8]) -> Counter {
    Counter::new(
        attr_u64(e, covered).unwrap_or(0),
        attr_u64(e, total).unwrap_or(0),
    )
}

struct FileState {
    path: String,
    metrics: Option<CoverageCounts>,
    raw: CoverageCounts,
}

impl FileState {
    fn new(e: &BytesStart) -> Self {
        let path = attr(e, b"path")
            .filter(|p| !p.is_empty())
            .or_else(|| attr(e, b"name"))
            .unwrap_or_default();

        Self {
            path,
            metrics: None,
            raw: CoverageCounts::default(),
        }
    }

    fn count_line(&mut self, e: &BytesStart) {
        match attr(e, b"type").as_deref() {
            Some("stmt") => {
                let hit = attr_u64(e, b"count").unwrap_or(0) > 0;
                self.raw.statements.hit(hit);
                self.raw.lines.hit(hit);
            }
            Some("method") => {
                let hit = attr_u64(e, b"count").unwrap_or(0) > 0;
                self.raw.functions.hit(hit);
            }
            Some("cond") => {
                // Each conditional is two outcomes: the true arm and the false arm
                let true_hit = attr_u64(e, b"truecount").unwrap_or(0) > 0;
                let false_hit = attr_u64(e, b"falsecount").unwrap_or(0) > 0;
                self.raw.branches.hit(true_hit);
                self.raw.branches.hit(false_hit);
                self.raw.lines.hit(true_hit || false_hit);
            }
            _ => {}
        }
    }

    fn finish(self) -> FileCoverage {
        let counts = self.metrics.unwrap_or(self.raw);
        FileCoverage::new(self.path, counts.into_summary())
    }
}

/// Parse Clover XML content from a string
pub fn parse_clover_string(content: &str) -> Result<NormalizedCoverage, CoverageError> {
    let format = CoverageFormat::Clover;
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut root_seen = false;
    let mut project_seen = false;
    let mut project_metrics: Option<CoverageCounts> = None;

    let mut files: Vec<FileCoverage> = Vec::new();
    let mut current_file: Option<FileState> = None;

    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| CoverageError::malformed(format, e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name().as_ref().to_vec();
                let parent = stack.last().map(|p| p.as_slice());

                if !root_seen {
                    root_seen = true;
                    if name != b"coverage" && name != b"project" {
                        return Err(CoverageError::invalid(
                            format,
                            format!(
                                "expected <coverage> or <project> root, found <{}>",
                                String::from_utf8_lossy(&name)
                            ),
                        ));
                    }
                }

                match name.as_slice() {
                    b"project"
                        if stack.is_empty()
                            || (stack.len() == 1 && parent == Some(&b"coverage"[..])) =>
                    {
                        project_seen = true;
                    }
                    b"metrics" => match parent {
                        Some(b"project") if project_seen => {
                            project_metrics = Some(metrics_counts(e));
                        }
                        Some(b"file") => {
                            if let Some(file) = current_file.as_mut() {
                                file.metrics = Some(metrics_counts(e));
                            }
                        }
                        // package and class metrics are rolled up elsewhere
                        _ => {}
                    },
                    b"file" => {
                        let file = FileState::new(e);
                        if is_empty {
                            files.push(file.finish());
                        } else {
                            current_file = Some(file);
                        }
                    }
                    b"line" if parent == Some(&b"file"[..]) => {
                        if let Some(file) = current_file.as_mut() {
                            file.count_line(e);
                        }
                    }
                    _ => {}
                }

                if !is_empty {
                    stack.push(name);
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"file" {
                    if let Some(file) = current_file.take() {
                        files.push(file.finish());
                    }
                }
                stack.pop();
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(CoverageError::malformed(
                        format,
                        format!(
                            "unexpected end of document inside <{}>",
                            String::from_utf8_lossy(open)
                        ),
                    ));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !project_seen {
        return Err(CoverageError::invalid(
            format,
            "no <project> element at the root or under <coverage>",
        ));
    }

    debug!("Parsed {} Clover files", files.len());

    let summary = match project_metrics {
        Some(counts) => counts.into_summary(),
        None => {
            debug!("No project-level metrics, summing file metrics");
            CoverageSummary::from_files(&files)
        }
    };

    Ok(NormalizedCoverage {
        format,
        summary,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<coverage generated="1700000000" clover="4.4.1">
  <project timestamp="1700000000" name="demo">
    <metrics statements="20" coveredstatements="15" conditionals="8" coveredconditionals="4" methods="5" coveredmethods="4" elements="33" coveredelements="23" files="2"/>
    <package name="app">
      <metrics statements="20" coveredstatements="15" conditionals="8" coveredconditionals="4" methods="5" coveredmethods="4"/>
      <file name="Cart.php" path="/src/app/Cart.php">
        <class name="Cart">
          <metrics statements="99" coveredstatements="1" methods="9" coveredmethods="0"/>
        </class>
        <metrics statements="12" coveredstatements="9" conditionals="4" coveredconditionals="2" methods="3" coveredmethods="3"/>
        <line num="3" type="method" name="add" count="5"/>
        <line num="4" type="stmt" count="5"/>
      </file>
      <file name="Price.php" path="/src/app/Price.php">
        <line num="2" type="method" name="total" count="2"/>
        <line num="3" type="stmt" count="2"/>
        <line num="4" type="cond" truecount="2" falsecount="0"/>
        <line num="5" type="stmt" count="0"/>
        <line num="6" type="method" name="unused" count="0"/>
      </file>
    </package>
  </project>
</coverage>"#;

    #[test]
    fn test_file_metrics_win_over_lines() {
        let data = parse_clover_string(SAMPLE).unwrap();

        assert_eq!(data.format, CoverageFormat::Clover);
        assert_eq!(data.files.len(), 2);

        let cart = &data.files[0];
        assert_eq!(cart.path, "/src/app/Cart.php");
        assert_eq!((cart.statements.covered, cart.statements.total), (9, 12));
        assert_eq!((cart.branches.covered, cart.branches.total), (2, 4));
        assert_eq!((cart.functions.covered, cart.functions.total), (3, 3));
        assert_eq!(cart.lines, cart.statements);
    }

    #[test]
    fn test_raw_lines_without_metrics() {
        let data = parse_clover_string(SAMPLE).unwrap();
        let price = &data.files[1];

        assert_eq!((price.statements.covered, price.statements.total), (1, 2));
        assert_eq!((price.functions.covered, price.functions.total), (1, 2));
        // one cond line: true arm hit, false arm not
        assert_eq!((price.branches.covered, price.branches.total), (1, 2));
        assert_eq!((price.lines.covered, price.lines.total), (2, 3));
    }

    #[test]
    fn test_project_metrics_win_for_summary() {
        let data = parse_clover_string(SAMPLE).unwrap();

        assert_eq!(data.summary.statements.total, 20);
        assert_eq!(data.summary.statements.percentage, 75.0);
        assert_eq!(data.summary.branches.percentage, 50.0);
        assert_eq!(data.summary.functions.percentage, 80.0);
    }

    #[test]
    fn test_bare_project_sums_files() {
        let xml = r#"<project name="bare">
  <file name="a.js">
    <metrics statements="4" coveredstatements="2" conditionals="0" coveredconditionals="0" methods="1" coveredmethods="1"/>
  </file>
  <file name="b.js">
    <metrics statements="6" coveredstatements="6" conditionals="2" coveredconditionals="1" methods="1" coveredmethods="0"/>
  </file>
</project>"#;

        let data = parse_clover_string(xml).unwrap();

        assert_eq!(data.files[0].path, "a.js");
        assert_eq!((data.summary.statements.covered, data.summary.statements.total), (8, 10));
        assert_eq!((data.summary.branches.covered, data.summary.branches.total), (1, 2));
        assert_eq!((data.summary.functions.covered, data.summary.functions.total), (1, 2));
    }

    #[test]
    fn test_missing_project() {
        let err = parse_clover_string(r#"<coverage clover="4"><other/></coverage>"#).unwrap_err();
        assert!(matches!(err, CoverageError::InvalidFormat { .. }));

        let err = parse_clover_string(r#"<report><project/></report>"#).unwrap_err();
        assert!(matches!(err, CoverageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<coverage clover="4"><project><metrics statements="2" coveredstatements="1"/>
<file name="a.php" path="/a.php"><line num="1" type="stmt" count="1"/>"#;
        let err = parse_clover_string(xml).unwrap_err();
        assert!(matches!(
            err,
            CoverageError::MalformedInput { ref message, .. } if message.contains("<file>")
        ));
    }
}
