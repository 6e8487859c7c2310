//! Parser registry: format identifier to parser, plus the parse entry points

use log::{debug, info};
use std::fs;
use std::path::Path;

use super::{
    detect_format, parse_clover_string, parse_cobertura_string, parse_istanbul_string,
    parse_jacoco_string, parse_lcov_string, CoverageFormat, NormalizedCoverage,
};
use crate::error::CoverageError;

/// A parser for one coverage format
pub trait CoverageParser: Send + Sync {
    fn format(&self) -> CoverageFormat;

    fn parse(&self, content: &str) -> Result<NormalizedCoverage, CoverageError>;
}

pub struct LcovParser;
pub struct IstanbulParser;
pub struct CoberturaParser;
pub struct CloverParser;
pub struct JacocoParser;

impl CoverageParser for LcovParser {
    fn format(&self) -> CoverageFormat {
        CoverageFormat::Lcov
    }

    fn parse(&self, content: &str) -> Result<NormalizedCoverage, CoverageError> {
        parse_lcov_string(content)
    }
}

impl CoverageParser for IstanbulParser {
    fn format(&self) -> CoverageFormat {
        CoverageFormat::Istanbul
    }

    fn parse(&self, content: &str) -> Result<NormalizedCoverage, CoverageError> {
        parse_istanbul_string(content)
    }
}

impl CoverageParser for CoberturaParser {
    fn format(&self) -> CoverageFormat {
        CoverageFormat::Cobertura
    }

    fn parse(&self, content: &str) -> Result<NormalizedCoverage, CoverageError> {
        parse_cobertura_string(content)
    }
}

impl CoverageParser for CloverParser {
    fn format(&self) -> CoverageFormat {
        CoverageFormat::Clover
    }

    fn parse(&self, content: &str) -> Result<NormalizedCoverage, CoverageError> {
        parse_clover_string(content)
    }
}

impl CoverageParser for JacocoParser {
    fn format(&self) -> CoverageFormat {
        CoverageFormat::Jacoco
    }

    fn parse(&self, content: &str) -> Result<NormalizedCoverage, CoverageError> {
        parse_jacoco_string(content)
    }
}

/// Look up the parser for a format
pub fn parser_for(format: CoverageFormat) -> &'static dyn CoverageParser {
    match format {
        CoverageFormat::Lcov => &LcovParser,
        CoverageFormat::Istanbul => &IstanbulParser,
        CoverageFormat::Cobertura => &CoberturaParser,
        CoverageFormat::Clover => &CloverParser,
        CoverageFormat::Jacoco => &JacocoParser,
    }
}

/// Parse coverage content. `format: None` means auto-detect from the
/// content and `filename`.
pub fn parse_coverage(
    content: &str,
    filename: &str,
    format: Option<CoverageFormat>,
) -> Result<NormalizedCoverage, CoverageError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let format = match format {
        Some(format) => format,
        None => detect_format(content, filename)?,
    };

    debug!("Parsing {} as {}", filename, format);
    let coverage = parser_for(format).parse(content)?;
    info!(
        "{}: {} files, {:.2}% lines",
        filename,
        coverage.files.len(),
        coverage.summary.lines.percentage
    );

    Ok(coverage)
}

/// Read a coverage file fully into memory and parse it
pub fn parse_coverage_file(
    path: &Path,
    format: Option<CoverageFormat>,
) -> Result<NormalizedCoverage, CoverageError> {
    let content = fs::read_to_string(path).map_err(|source| CoverageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    parse_coverage(&content, &filename, format)
}
