use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::filters::detector::{Encoding, NewlineType};
use crate::locale::LocaleId;
use crate::pipeline::registry::StepRegistry;

/// Application configuration module
/// This module handles the configuration of the pipeline: locales, encodings,
/// the ordered list of steps and the settings of each step.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source locale of the documents
    #[serde(default = "default_source_locale")]
    pub source_locale: String,

    /// Locale written by the writer step
    #[serde(default = "default_target_locale")]
    pub target_locale: String,

    /// Encoding assumed for documents without a byte order mark
    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Encoding of the output; the input encoding when absent
    #[serde(default)]
    pub output_encoding: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Check the nesting grammar of the events leaving the pipeline
    #[serde(default = "default_true")]
    pub validate_events: bool,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub leverage: LeverageConfig,

    #[serde(default)]
    pub splice: SpliceConfig,

    #[serde(default)]
    pub linebreak: LineBreakConfig,

    #[serde(default)]
    pub bom: BomConfig,
}

/// Steps of the pipeline, by registry key, in order
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { steps: default_steps() }
    }
}

/// Sentence segmentation settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Characters ending a sentence when followed by whitespace
    #[serde(default = "default_sentence_terminators")]
    pub terminators: String,

    /// Also segment existing targets
    #[serde(default = "default_true")]
    pub segment_targets: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            terminators: default_sentence_terminators(),
            segment_targets: true,
        }
    }
}

/// Translation memory leverage settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LeverageConfig {
    /// JSON file holding the translation memory entries
    #[serde(default)]
    pub tm_path: Option<PathBuf>,

    /// Minimum score (0-100) of a usable match
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Maximum number of results per query
    #[serde(default = "default_max_hits")]
    pub max_hits: usize,

    /// Write the best match into the target; otherwise only annotate
    #[serde(default = "default_true")]
    pub fill_target: bool,

    /// Copy the source into segments without a match
    #[serde(default)]
    pub copy_source_on_miss: bool,

    /// Times a query is retried after a retryable connector failure
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for LeverageConfig {
    fn default() -> Self {
        Self {
            tm_path: None,
            threshold: default_threshold(),
            max_hits: default_max_hits(),
            fill_target: true,
            copy_source_on_miss: false,
            retry_count: default_retry_count(),
        }
    }
}

/// Line splicing settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpliceConfig {
    /// Text ending a line continued on the next one
    #[serde(default = "default_splicer")]
    pub splicer: String,

    /// Turn splicers and line breaks into inline codes
    #[serde(default = "default_true")]
    pub create_placeholders: bool,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            splicer: default_splicer(),
            create_placeholders: true,
        }
    }
}

/// Line break conversion settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LineBreakConfig {
    /// "lf", "crlf" or "cr"
    #[serde(default = "default_line_break")]
    pub line_break: String,
}

impl Default for LineBreakConfig {
    fn default() -> Self {
        Self {
            line_break: default_line_break(),
        }
    }
}

/// Byte order mark conversion settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BomConfig {
    /// Remove the BOM; add one when false
    #[serde(default = "default_true")]
    pub remove: bool,

    /// Also remove UTF-16 and UTF-32 BOMs
    #[serde(default)]
    pub also_non_utf8: bool,
}

impl Default for BomConfig {
    fn default() -> Self {
        Self {
            remove: true,
            also_non_utf8: false,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_locale() -> String {
    "en".to_string()
}

fn default_target_locale() -> String {
    "fr".to_string()
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_steps() -> Vec<String> {
    vec!["raw-to-events".to_string(), "events-writer".to_string()]
}

fn default_sentence_terminators() -> String {
    ".!?".to_string()
}

fn default_threshold() -> u8 {
    75
}

fn default_max_hits() -> usize {
    5
}

fn default_retry_count() -> u32 {
    2
}

fn default_splicer() -> String {
    "\\".to_string()
}

fn default_line_break() -> String {
    "lf".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load a configuration file, creating it with default values if missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }
        log::warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("textskel")
            .join("config.json")
    }

    pub fn source_locale(&self) -> Result<LocaleId> {
        LocaleId::new(&self.source_locale).map_err(|e| anyhow!("Invalid source locale: {}", e))
    }

    pub fn target_locale(&self) -> Result<LocaleId> {
        LocaleId::new(&self.target_locale).map_err(|e| anyhow!("Invalid target locale: {}", e))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.source_locale()?;
        self.target_locale()?;

        for encoding in std::iter::once(&self.default_encoding).chain(self.output_encoding.iter()) {
            if Encoding::from_name(encoding).is_none() {
                return Err(anyhow!("Unsupported encoding: {}", encoding));
            }
        }

        if self.pipeline.steps.is_empty() {
            return Err(anyhow!("The pipeline needs at least one step"));
        }
        let registry = StepRegistry::new();
        if let Some(unknown) = self.pipeline.steps.iter().find(|s| !registry.contains(s)) {
            return Err(anyhow!("Unknown step: {}", unknown));
        }

        if self.leverage.threshold > 100 {
            return Err(anyhow!("Leverage threshold must be between 0 and 100"));
        }
        if NewlineType::from_name(&self.linebreak.line_break).is_none() {
            return Err(anyhow!("Unknown line break: {}", self.linebreak.line_break));
        }
        if self.splice.splicer.is_empty() {
            return Err(anyhow!("The line splicer must not be empty"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_locale: default_source_locale(),
            target_locale: default_target_locale(),
            default_encoding: default_encoding(),
            output_encoding: None,
            log_level: LogLevel::default(),
            validate_events: true,
            pipeline: PipelineConfig::default(),
            segmentation: SegmentationConfig::default(),
            leverage: LeverageConfig::default(),
            splice: SpliceConfig::default(),
            linebreak: LineBreakConfig::default(),
            bom: BomConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_shouldValidate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.steps, vec!["raw-to-events", "events-writer"]);
    }

    #[test]
    fn test_config_partialJson_shouldUseDefaults() {
        let config: Config = serde_json::from_str(r#"{"target_locale": "de", "leverage": {"threshold": 90}}"#).unwrap();

        assert_eq!(config.source_locale, "en");
        assert_eq!(config.target_locale, "de");
        assert_eq!(config.leverage.threshold, 90);
        assert!(config.leverage.fill_target);
        assert_eq!(config.splice.splicer, "\\");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_config_validate_unknownStep_shouldFail() {
        let mut config = Config::default();
        config.pipeline.steps.push("translate-with-magic".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_badLocaleOrLineBreak_shouldFail() {
        let mut config = Config::default();
        config.target_locale = "zz-top".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.linebreak.line_break = "nel".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_saveThenLoad_shouldKeepValues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.bom.remove = false;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(!loaded.bom.remove);
        assert_eq!(loaded.target_locale, "fr");
    }
}
