use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::coverage::{parse_format_hint, CoverageFormat};

pub const CONFIG_FILE: &str = "covdelta.toml";
pub const DEFAULT_REPORT_PATH: &str = "coverage-report.json";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compare: CompareConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    /// Coverage format name, or "auto" to detect it per file
    #[serde(default = "default_format")]
    pub format: String,
    /// Percentage points a metric may drop before it counts as regressed
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Exit non-zero when the comparison is regressed
    #[serde(default = "default_fail_on_regression")]
    pub fail_on_regression: bool,
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_format() -> String {
    "auto".to_string()
}

fn default_threshold() -> f64 {
    1.0
}

fn default_fail_on_regression() -> bool {
    true
}

fn default_output() -> String {
    DEFAULT_REPORT_PATH.to_string()
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            threshold: default_threshold(),
            fail_on_regression: default_fail_on_regression(),
            output: default_output(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.compare.threshold;
        if !(0.0..=100.0).contains(&threshold) {
            anyhow::bail!(
                "threshold must be between 0 and 100 percentage points, got {}",
                threshold
            );
        }

        parse_format_hint(&self.compare.format)?;

        Ok(())
    }

    pub fn format(&self) -> Result<Option<CoverageFormat>> {
        Ok(parse_format_hint(&self.compare.format)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[compare]
format = "cobertura"
threshold = 2.5
fail_on_regression = false
output = "out/report.json"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.compare.threshold, 2.5);
        assert!(!config.compare.fail_on_regression);
        assert_eq!(config.compare.output, "out/report.json");
        assert_eq!(config.format().unwrap(), Some(CoverageFormat::Cobertura));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.compare.threshold, 1.0);
        assert!(config.compare.fail_on_regression);
        assert_eq!(config.compare.output, DEFAULT_REPORT_PATH);
        assert_eq!(config.format().unwrap(), None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_toml("[compare]\nthreshold = 150.0\n").is_err());
        assert!(Config::from_toml("[compare]\nthreshold = -1.0\n").is_err());
        assert!(Config::from_toml("[compare]\nformat = \"gcov\"\n").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.compare.format, "auto");
    }
}
