//! Console configuration loaded from `logscope.toml`
//!
//! Every section is optional. Command-line flags override file values.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use logscope_store::{DEFAULT_BATCH_SIZE, Severity, SeverityMask};

use crate::ingest::InputFormat;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "logscope.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub scheduler: SchedulerConfig,
    pub filter: FilterConfig,
    pub display: DisplayConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Positions classified per idle tick
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Process names to show (empty = all)
    pub processes: Vec<String>,

    /// Severities to show; takes precedence over `min_severity`
    pub severities: Option<Vec<Severity>>,

    /// Show this severity and above
    pub min_severity: Option<Severity>,
}

impl FilterConfig {
    pub fn mask(&self) -> SeverityMask {
        match (&self.severities, self.min_severity) {
            (Some(list), _) => list.iter().copied().collect(),
            (None, Some(min)) => SeverityMask::at_least(min),
            (None, None) => SeverityMask::ALL,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Append process, file, function and line to each row
    pub extended: bool,

    /// Print per-process and per-severity counts on exit
    pub stats: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub format: InputFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Load from `path`, or from the default file if present
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.scheduler.batch_size == 0 {
            anyhow::bail!("scheduler.batch_size must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ConsoleConfig::parse("").unwrap();
        assert_eq!(config.scheduler.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.filter.processes.is_empty());
        assert_eq!(config.filter.mask(), SeverityMask::ALL);
        assert_eq!(config.input.format, InputFormat::Json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_full_config() {
        let config = ConsoleConfig::parse(
            r#"
            [scheduler]
            batch_size = 100

            [filter]
            processes = ["planner", "talker"]
            severities = ["info", "error"]

            [display]
            extended = true

            [input]
            format = "text"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.batch_size, 100);
        assert_eq!(config.filter.processes, vec!["planner", "talker"]);
        assert_eq!(
            config.filter.mask(),
            SeverityMask::NONE.with(Severity::Info).with(Severity::Error)
        );
        assert!(config.display.extended);
        assert_eq!(config.input.format, InputFormat::Text);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_min_severity() {
        let config = ConsoleConfig::parse("[filter]\nmin_severity = \"warning\"").unwrap();
        assert_eq!(config.filter.mask(), SeverityMask::at_least(Severity::Warn));
    }

    #[test]
    fn test_severity_spellings_match_directives() {
        let config =
            ConsoleConfig::parse("[filter]\nseverities = [\"crit\", \"ERRO\", \"debg\"]").unwrap();
        assert_eq!(
            config.filter.mask(),
            SeverityMask::NONE
                .with(Severity::Debug)
                .with(Severity::Error)
                .with(Severity::Fatal)
        );

        let config = ConsoleConfig::parse("[filter]\nmin_severity = \"erro\"").unwrap();
        assert_eq!(config.filter.mask(), SeverityMask::at_least(Severity::Error));

        assert!(ConsoleConfig::parse("[filter]\nmin_severity = \"loud\"").is_err());
    }

    #[test]
    fn test_rejects_zero_batch() {
        assert!(ConsoleConfig::parse("[scheduler]\nbatch_size = 0").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let missing = Path::new("/nonexistent/logscope.toml");
        assert!(ConsoleConfig::load(Some(missing)).is_err());
    }
}
