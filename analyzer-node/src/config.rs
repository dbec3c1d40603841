use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{AnalyzerError, Result};

/// Main configuration for the analyzer node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Input discovery settings
    pub input: InputConfig,
    /// Ensemble analysis settings
    pub analysis: AnalysisConfig,
    /// Fronthaul protocol rule settings
    pub protocol: ProtocolConfig,
    /// Persistence sink settings
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Input discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Folder scanned for input files when no path is given on the command line
    pub folder: PathBuf,
    /// File extensions treated as analyzable input
    pub extensions: Vec<String>,
}

/// Ensemble analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Expected fraction of outliers assumed by the density detectors (0.0 - 0.5)
    pub contamination_fraction: f64,
    /// Fraction of executed models that must agree before a finding is persisted
    pub persistence_agreement_threshold: f64,
    /// Confidence above which a record is offered to the explanation collaborator
    pub confidence_threshold: f64,
    /// Number of trees in the isolation ensemble
    pub ensemble_size: usize,
    /// DBSCAN neighborhood radius in standardized feature space
    pub neighborhood_radius: f64,
    /// Minimum points for a DBSCAN cluster
    pub min_cluster_size: usize,
}

/// Fronthaul protocol rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Payload sizes strictly above this limit are flagged as oversized
    pub oversized_message_threshold_bytes: u32,
    /// Width of the wrapping sequence-number counter in bits
    pub sequence_width_bits: u8,
}

/// Persistence sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Enable the JSON-lines sink
    pub enabled: bool,
    /// Output path for persisted findings
    pub output_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Output format: text or json
    pub format: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            analysis: AnalysisConfig::default(),
            protocol: ProtocolConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("data"),
            extensions: vec![
                "txt".to_string(),
                "log".to_string(),
                "pcap".to_string(),
                "cap".to_string(),
            ],
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            contamination_fraction: 0.10,
            persistence_agreement_threshold: 0.75, // 3-of-4 when four models run
            confidence_threshold: 0.7,
            ensemble_size: 100,
            neighborhood_radius: 0.5,
            min_cluster_size: 5,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            oversized_message_threshold_bytes: 9600, // typical fronthaul MTU constraint
            sequence_width_bits: 16,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_path: PathBuf::from("anomalies.jsonl"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw)
            .map_err(|e| AnalyzerError::Config(format!("failed to parse config: {e}")))
    }

    /// Apply `ANALYZER_*` environment variable overrides.
    ///
    /// Unparsable values are ignored with a warning so a bad override cannot
    /// take the node down at startup.
    pub fn apply_environment_overrides(&mut self) {
        if let Ok(value) = std::env::var("ANALYZER_INPUT_FOLDER") {
            self.input.folder = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("ANALYZER_CONTAMINATION") {
            match value.parse() {
                Ok(parsed) => self.analysis.contamination_fraction = parsed,
                Err(_) => warn!(%value, "Ignoring invalid ANALYZER_CONTAMINATION"),
            }
        }
        if let Ok(value) = std::env::var("ANALYZER_PERSIST_THRESHOLD") {
            match value.parse() {
                Ok(parsed) => self.analysis.persistence_agreement_threshold = parsed,
                Err(_) => warn!(%value, "Ignoring invalid ANALYZER_PERSIST_THRESHOLD"),
            }
        }
        if let Ok(value) = std::env::var("ANALYZER_OVERSIZED_THRESHOLD") {
            match value.parse() {
                Ok(parsed) => self.protocol.oversized_message_threshold_bytes = parsed,
                Err(_) => warn!(%value, "Ignoring invalid ANALYZER_OVERSIZED_THRESHOLD"),
            }
        }
        if let Ok(value) = std::env::var("ANALYZER_STORAGE_ENABLED") {
            match value.parse() {
                Ok(parsed) => self.storage.enabled = parsed,
                Err(_) => warn!(%value, "Ignoring invalid ANALYZER_STORAGE_ENABLED"),
            }
        }
        if let Ok(value) = std::env::var("ANALYZER_LOG_LEVEL") {
            self.logging.level = value;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.analysis.contamination_fraction)
            || self.analysis.contamination_fraction == 0.0
        {
            return Err(AnalyzerError::Config(format!(
                "contamination_fraction must be in (0.0, 0.5], got {}",
                self.analysis.contamination_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.analysis.persistence_agreement_threshold)
            || self.analysis.persistence_agreement_threshold == 0.0
        {
            return Err(AnalyzerError::Config(format!(
                "persistence_agreement_threshold must be in (0.0, 1.0], got {}",
                self.analysis.persistence_agreement_threshold
            )));
        }
        if self.analysis.ensemble_size == 0 {
            return Err(AnalyzerError::Config(
                "ensemble_size must be at least 1".to_string(),
            ));
        }
        if self.analysis.neighborhood_radius <= 0.0 {
            return Err(AnalyzerError::Config(
                "neighborhood_radius must be positive".to_string(),
            ));
        }
        if self.analysis.min_cluster_size < 2 {
            return Err(AnalyzerError::Config(
                "min_cluster_size must be at least 2".to_string(),
            ));
        }
        if self.protocol.oversized_message_threshold_bytes == 0 {
            return Err(AnalyzerError::Config(
                "oversized_message_threshold_bytes must be positive".to_string(),
            ));
        }
        if self.protocol.sequence_width_bits == 0 || self.protocol.sequence_width_bits > 16 {
            return Err(AnalyzerError::Config(format!(
                "sequence_width_bits must be in 1..=16, got {}",
                self.protocol.sequence_width_bits
            )));
        }
        if self.input.extensions.is_empty() {
            return Err(AnalyzerError::Config(
                "at least one input extension is required".to_string(),
            ));
        }
        Ok(())
    }
}
