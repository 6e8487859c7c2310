//! Cobertura XML format parser

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use super::xml::{attr, attr_f64, attr_u64};
use super::{
    Counter, CoverageCounts, CoverageFormat, CoverageSummary, FileCoverage, NormalizedCoverage,
};
use crate::error::CoverageError;

/// Aggregates carried by the root `coverage` element
#[derive(Debug, Default)]
struct RootTotals {
    lines_valid: Option<u64>,
    lines_covered: Option<u64>,
    branches_valid: Option<u64>,
    branches_covered: Option<u64>,
}

impl RootTotals {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            lines_valid: attr_u64(e, b"lines-valid"),
            lines_covered: attr_u64(e, b"lines-covered"),
            branches_valid: attr_u64(e, b"branches-valid"),
            branches_covered: attr_u64(e, b"branches-covered"),
        }
    }

    fn lines(&self) -> Option<Counter> {
        Some(Counter::new(self.lines_covered?, self.lines_valid?))
    }

    fn branches(&self) -> Option<Counter> {
        Some(Counter::new(self.branches_covered?, self.branches_valid?))
    }
}

/// Extract `(covered, total)` from a `condition-coverage` value like `"50% (1/2)"`.
fn parse_condition_coverage(value: &str) -> Option<(u64, u64)> {
    let start = value.find('(')?;
    let end = value[start..].find(')')? + start;
    let (covered, total) = value[start + 1..end].split_once('/')?;
    Some((covered.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// Classes reported against the same source file are merged into one entry.
#[derive(Default)]
struct FileTable {
    files: Vec<(String, CoverageCounts)>,
    index: HashMap<String, usize>,
}

impl FileTable {
    fn add(&mut self, path: String, counts: CoverageCounts) {
        match self.index.get(&path) {
            Some(&i) => self.files[i].1.add(&counts),
            None => {
                self.index.insert(path.clone(), self.files.len());
                self.files.push((path, counts));
            }
        }
    }

    fn into_files(self) -> Vec<FileCoverage> {
        self.files
            .into_iter()
            .map(|(path, counts)| FileCoverage::new(path, counts.into_summary()))
            .collect()
    }
}

fn class_path(e: &BytesStart) -> String {
    attr(e, b"filename")
        .filter(|f| !f.is_empty())
        .or_else(|| attr(e, b"name"))
        .unwrap_or_default()
}

fn count_line(e: &BytesStart, counts: &mut CoverageCounts) {
    let hit = attr_u64(e, b"hits").unwrap_or(0) > 0;
    counts.lines.hit(hit);
    counts.statements.hit(hit);

    if attr(e, b"branch").as_deref() == Some("true") {
        let conditions = attr(e, b"condition-coverage")
            .as_deref()
            .and_then(parse_condition_coverage);
        if let Some((covered, total)) = conditions {
            counts.branches.add(Counter::new(covered, total));
        }
    }
}

/// Parse Cobertura XML content from a string
pub fn parse_cobertura_string(content: &str) -> Result<NormalizedCoverage, CoverageError> {
    let format = CoverageFormat::Cobertura;
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut root: Option<RootTotals> = None;
    let mut table = FileTable::default();

    let mut current_class: Option<(String, CoverageCounts)> = None;
    let mut in_method = false;
    let mut open: Vec<Vec<u8>> = Vec::new();

    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| CoverageError::malformed(format, e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();

                if root.is_none() {
                    if name.as_ref() != b"coverage" {
                        return Err(CoverageError::invalid(
                            format,
                            format!(
                                "expected root element <coverage>, found <{}>",
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        ));
                    }
                    root = Some(RootTotals::from_element(e));
                } else {
                    match name.as_ref() {
                        b"class" => {
                            let entry = (class_path(e), CoverageCounts::default());
                            if is_empty {
                                table.add(entry.0, entry.1);
                            } else {
                                current_class = Some(entry);
                            }
                        }
                        b"method" => {
                            if let Some((_, counts)) = current_class.as_mut() {
                                // Only a rate is given per method, so covered means rate > 0
                                let rate = attr_f64(e, b"line-rate").unwrap_or(0.0);
                                counts.functions.hit(rate > 0.0);
                            }
                            if !is_empty {
                                in_method = true;
                            }
                        }
                        // Lines nested in a method repeat the class lines
                        b"line" if !in_method => {
                            if let Some((_, counts)) = current_class.as_mut() {
                                count_line(e, counts);
                            }
                        }
                        _ => {}
                    }
                }

                if !is_empty {
                    open.push(name.as_ref().to_vec());
                }
            }
            Event::End(ref e) => {
                match e.name().as_ref() {
                    b"method" => in_method = false,
                    b"class" => {
                        if let Some((path, counts)) = current_class.take() {
                            table.add(path, counts);
                        }
                    }
                    _ => {}
                }
                open.pop();
            }
            Event::Eof => {
                if let Some(name) = open.last() {
                    return Err(CoverageError::malformed(
                        format,
                        format!(
                            "unexpected end of document inside <{}>",
                            String::from_utf8_lossy(name)
                        ),
                    ));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    let Some(root) = root else {
        return Err(CoverageError::invalid(format, "missing <coverage> root element"));
    };

    let files = table.into_files();
    debug!("Parsed {} Cobertura source files", files.len());

    let aggregated = CoverageSummary::from_files(&files);
    let lines = match root.lines() {
        Some(counter) => counter.metric(),
        None => aggregated.lines,
    };
    let branches = match root.branches() {
        Some(counter) => counter.metric(),
        None => aggregated.branches,
    };

    let summary = CoverageSummary {
        statements: lines,
        branches,
        functions: aggregated.functions,
        lines,
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

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
<coverage line-rate="0.75" branch-rate="0.5" lines-covered="75" lines-valid="100" branches-covered="1" branches-valid="2" version="1.9">
    <sources><source>/work</source></sources>
    <packages>
        <package name="src" line-rate="0.75" branch-rate="0.5">
            <classes>
                <class name="main" filename="src/main.rs" line-rate="0.75" branch-rate="0.5">
                    <methods>
                        <method name="main" signature="()V" line-rate="1.0">
                            <lines><line number="1" hits="1"/></lines>
                        </method>
                        <method name="unused" signature="()V" line-rate="0.0">
                            <lines><line number="3" hits="0"/></lines>
                        </method>
                    </methods>
                    <lines>
                        <line number="1" hits="1"/>
                        <line number="2" hits="1" branch="true" condition-coverage="50% (1/2)">
                            <conditions><condition number="0" type="jump" coverage="50%"/></conditions>
                        </line>
                        <line number="3" hits="0"/>
                        <line number="4" hits="1"/>
                    </lines>
                </class>
            </classes>
        </package>
    </packages>
</coverage>"#;

    #[test]
    fn test_parse_cobertura() {
        let data = parse_cobertura_string(SAMPLE).unwrap();

        assert_eq!(data.format, CoverageFormat::Cobertura);
        assert_eq!(data.files.len(), 1);

        let file = &data.files[0];
        assert_eq!(file.path, "src/main.rs");
        assert_eq!((file.lines.covered, file.lines.total), (3, 4));
        assert_eq!(file.statements, file.lines);
        assert_eq!((file.functions.covered, file.functions.total), (1, 2));
        assert_eq!((file.branches.covered, file.branches.total), (1, 2));
    }

    #[test]
    fn test_root_totals_win_over_classes() {
        let data = parse_cobertura_string(SAMPLE).unwrap();

        assert_eq!(data.summary.lines.percentage, 75.0);
        assert_eq!(data.summary.lines.total, 100);
        assert_eq!(data.summary.statements.covered, 75);
        assert_eq!(data.summary.branches.percentage, 50.0);
        // no root function totals exist, so these come from the classes
        assert_eq!(data.summary.functions.total, 2);
    }

    #[test]
    fn test_aggregates_without_root_totals() {
        let xml = r#"<coverage line-rate="0.5" branch-rate="0">
    <packages><package name="p"><classes>
        <class name="A" filename="a.py"><lines>
            <line number="1" hits="2"/>
            <line number="2" hits="0" branch="true" condition-coverage="25% (1/4)"/>
        </lines></class>
        <class name="A.Inner" filename="a.py"><lines>
            <line number="9" hits="0"/>
        </lines></class>
        <class name="B" filename="b.py"/>
    </classes></package></packages>
</coverage>"#;

        let data = parse_cobertura_string(xml).unwrap();

        assert_eq!(data.files.len(), 2);
        assert_eq!(data.files[0].path, "a.py");
        assert_eq!((data.files[0].lines.covered, data.files[0].lines.total), (1, 3));
        assert_eq!(data.files[1].path, "b.py");
        assert_eq!(data.files[1].lines.percentage, 100.0);

        assert_eq!((data.summary.lines.covered, data.summary.lines.total), (1, 3));
        assert_eq!((data.summary.branches.covered, data.summary.branches.total), (1, 4));
    }

    #[test]
    fn test_condition_coverage() {
        assert_eq!(parse_condition_coverage("50% (1/2)"), Some((1, 2)));
        assert_eq!(parse_condition_coverage("100% (4/4)"), Some((4, 4)));
        assert_eq!(parse_condition_coverage("50%"), None);
        assert_eq!(parse_condition_coverage("(x/2)"), None);
    }

    #[test]
    fn test_missing_root() {
        let err = parse_cobertura_string(r#"<report name="x"/>"#).unwrap_err();
        assert!(matches!(err, CoverageError::InvalidFormat { .. }));

        let err = parse_cobertura_string("").unwrap_err();
        assert!(matches!(err, CoverageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_cobertura_string("<coverage><packages></coverage>").unwrap_err();
        assert!(matches!(err, CoverageError::MalformedInput { .. }));
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<coverage lines-valid="10" lines-covered="5"><packages><package name="app"><classes>
<class filename="a.py"><lines><line number="1" hits="1"/>"#;
        let err = parse_cobertura_string(xml).unwrap_err();
        assert!(matches!(
            err,
            CoverageError::MalformedInput { ref message, .. } if message.contains("<lines>")
        ));
    }
}
