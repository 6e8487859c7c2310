//! JaCoCo XML format parser
//!
//! JaCoCo counts bytecode instructions, not source statements. The
//! INSTRUCTION counter is reported as `statements` so JaCoCo reports line up
//! with the other formats; downstream thresholds are calibrated on this.

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::xml::{attr, attr_u64};
use super::{
    Counter, CoverageCounts, CoverageFormat, CoverageSummary, FileCoverage, NormalizedCoverage,
};
use crate::error::CoverageError;

/// `counter` elements of one report node, by the kinds we map
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    instruction: Option<Counter>,
    branch: Option<Counter>,
    line: Option<Counter>,
    method: Option<Counter>,
}

impl Counters {
    fn record(&mut self, e: &BytesStart) {
        let missed = attr_u64(e, b"missed").unwrap_or(0);
        let covered = attr_u64(e, b"covered").unwrap_or(0);
        let counter = Counter::new(covered, covered.saturating_add(missed));

        match attr(e, b"type").as_deref() {
            Some("INSTRUCTION") => self.instruction = Some(counter),
            Some("BRANCH") => self.branch = Some(counter),
            Some("LINE") => self.line = Some(counter),
            Some("METHOD") => self.method = Some(counter),
            // COMPLEXITY and CLASS have no normalized counterpart
            _ => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.instruction.is_none()
            && self.branch.is_none()
            && self.line.is_none()
            && self.method.is_none()
    }

    fn counts_or(&self, fallback: &CoverageCounts) -> CoverageCounts {
        CoverageCounts {
            statements: self.instruction.unwrap_or(fallback.statements),
            branches: self.branch.unwrap_or(fallback.branches),
            functions: self.method.unwrap_or(fallback.functions),
            lines: self.line.unwrap_or(fallback.lines),
        }
    }
}

struct SourceFileState {
    path: String,
    counters: Counters,
    raw: CoverageCounts,
}

impl SourceFileState {
    fn new(package: &str, e: &BytesStart) -> Self {
        let name = attr(e, b"name").unwrap_or_default();
        let path = if package.is_empty() {
            name
        } else {
            format!("{}/{}", package, name)
        };

        Self {
            path,
            counters: Counters::default(),
            raw: CoverageCounts::default(),
        }
    }

    /// `<line nr mi ci mb cb>`: missed/covered instructions and branches
    fn count_line(&mut self, e: &BytesStart) {
        let mi = attr_u64(e, b"mi").unwrap_or(0);
        let ci = attr_u64(e, b"ci").unwrap_or(0);
        let mb = attr_u64(e, b"mb").unwrap_or(0);
        let cb = attr_u64(e, b"cb").unwrap_or(0);

        self.raw.statements.add(Counter::new(ci, mi.saturating_add(ci)));
        self.raw.branches.add(Counter::new(cb, mb.saturating_add(cb)));
        self.raw.lines.hit(ci > 0);
    }

    fn finish(self) -> FileCoverage {
        let counts = if self.counters.is_empty() {
            self.raw
        } else {
            self.counters.counts_or(&CoverageCounts::default())
        };
        FileCoverage::new(self.path, counts.into_summary())
    }
}

/// Parse JaCoCo XML content from a string
pub fn parse_jacoco_string(content: &str) -> Result<NormalizedCoverage, CoverageError> {
    let format = CoverageFormat::Jacoco;
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut root_seen = false;
    let mut report_counters = Counters::default();

    let mut package = String::new();
    let mut files: Vec<FileCoverage> = Vec::new();
    let mut current_file: Option<SourceFileState> = None;

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
                    if name != b"report" {
                        return Err(CoverageError::invalid(
                            format,
                            format!(
                                "expected root element <report>, found <{}>",
                                String::from_utf8_lossy(&name)
                            ),
                        ));
                    }
                }

                match name.as_slice() {
                    b"package" => {
                        package = attr(e, b"name").unwrap_or_default();
                    }
                    b"sourcefile" => {
                        let file = SourceFileState::new(&package, e);
                        if is_empty {
                            files.push(file.finish());
                        } else {
                            current_file = Some(file);
                        }
                    }
                    b"counter" => match parent {
                        Some(b"report") => report_counters.record(e),
                        Some(b"sourcefile") => {
                            if let Some(file) = current_file.as_mut() {
                                file.counters.record(e);
                            }
                        }
                        // package, class and method counters are not needed
                        _ => {}
                    },
                    b"line" if parent == Some(&b"sourcefile"[..]) => {
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
                match e.name().as_ref() {
                    b"sourcefile" => {
                        if let Some(file) = current_file.take() {
                            files.push(file.finish());
                        }
                    }
                    b"package" => package.clear(),
                    _ => {}
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

    if !root_seen {
        return Err(CoverageError::invalid(format, "missing <report> root element"));
    }

    debug!("Parsed {} JaCoCo source files", files.len());

    let mut aggregated = CoverageCounts::default();
    for file in &files {
        aggregated.add_summary(&file.summary());
    }
    if report_counters.is_empty() {
        debug!("No report-level counters, aggregating source files");
    }
    let summary: CoverageSummary = report_counters.counts_or(&aggregated).into_summary();

    Ok(NormalizedCoverage {
        format,
        summary,
        files,
    })
}
