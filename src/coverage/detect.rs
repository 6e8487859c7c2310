//! Coverage format detection from file name and content

use log::debug;
use serde_json::Value;
use std::path::Path;

use super::CoverageFormat;
use crate::error::CoverageError;

/// Pick the coverage format of `content`.
///
/// Rules run in priority order: file extension, Istanbul JSON shape, XML
/// root sniffing, then the generic LCOV record markers.
pub fn detect_format(content: &str, filename: &str) -> Result<CoverageFormat, CoverageError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let extension = Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());

    if let Some(ext) = extension.as_deref() {
        if ext == "info" || ext == "lcov" {
            debug!("{} detected as lcov by extension", filename);
            return Ok(CoverageFormat::Lcov);
        }

        if ext == "json" && looks_like_istanbul(content) {
            debug!("{} detected as istanbul", filename);
            return Ok(CoverageFormat::Istanbul);
        }
    }

    if let Some(format) = sniff_xml(content) {
        debug!("{} detected as {} from XML content", filename, format);
        return Ok(format);
    }

    if content.contains("SF:") && (content.contains("LF:") || content.contains("DA:")) {
        debug!("{} detected as lcov from record markers", filename);
        return Ok(CoverageFormat::Lcov);
    }

    Err(CoverageError::UnrecognizedFormat {
        filename: filename.to_string(),
    })
}

fn looks_like_istanbul(content: &str) -> bool {
    let Ok(Value::Object(files)) = serde_json::from_str::<Value>(content) else {
        return false;
    };

    match files.values().next() {
        Some(Value::Object(record)) => {
            record.contains_key("statementMap") || record.contains_key("s")
        }
        _ => false,
    }
}

fn sniff_xml(content: &str) -> Option<CoverageFormat> {
    if !content.starts_with("<?xml") && !content.trim().starts_with('<') {
        return None;
    }

    let has_coverage = content.contains("<coverage");

    if has_coverage && content.contains("line-rate") {
        Some(CoverageFormat::Cobertura)
    } else if (has_coverage && content.contains("clover")) || content.contains("<project") {
        Some(CoverageFormat::Clover)
    } else if content.contains("<report") && content.contains("<counter") {
        Some(CoverageFormat::Jacoco)
    } else {
        None
    }
}
