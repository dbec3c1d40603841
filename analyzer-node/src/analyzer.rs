// Analysis Pipeline
//
// Batch-synchronous per file: extract -> normalize -> score -> aggregate.
// One file is fully processed before the next begins; the protocol scanner
// runs on decoded packets as a separate input path into the same report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{AnalyzerConfig, ProtocolConfig};
use crate::ensemble::{DetectorEnsemble, SkipReason};
use crate::features::{FeatureBatch, SourceKind};
use crate::normalize::standardize;
use crate::protocol::{FronthaulStats, ProtocolAnomaly, ProtocolScanner};
use crate::voting::{AnomalyRecord, BatchContext, VoteAggregator};

/// Everything the analyzer found in one file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source_file: String,
    pub source_kind: SourceKind,
    /// Samples that entered the scored batch
    pub total_samples: usize,
    /// Ensemble findings, ascending sample order
    pub records: Vec<AnomalyRecord>,
    /// Rule-based protocol findings (capture inputs only)
    pub protocol_anomalies: Vec<ProtocolAnomaly>,
    /// Fronthaul statistics from the protocol scan, when one ran
    pub fronthaul_stats: Option<FronthaulStats>,
    /// Models that produced output for this batch, in ensemble order
    pub executed_models: Vec<&'static str>,
    /// Models skipped for this batch, with reasons
    pub skipped_models: Vec<(&'static str, SkipReason)>,
}

impl FileReport {
    fn empty(source_file: &str, source_kind: SourceKind) -> Self {
        Self {
            source_file: source_file.to_string(),
            source_kind,
            total_samples: 0,
            records: Vec::new(),
            protocol_anomalies: Vec::new(),
            fronthaul_stats: None,
            executed_models: Vec::new(),
            skipped_models: Vec::new(),
        }
    }

    /// Findings that passed the persistence gate
    pub fn persisted_count(&self) -> usize {
        self.records.iter().filter(|r| r.persist).count()
    }

    /// Compact summary for the persistence sink
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            source_file: self.source_file.clone(),
            total_samples: self.total_samples,
            anomalies_detected: self.records.len(),
            anomalies_persisted: self.persisted_count(),
            protocol_anomalies: self.protocol_anomalies.len(),
            processed_at: Utc::now(),
        }
    }
}

/// Per-file processing record handed to the sink
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub source_file: String,
    pub total_samples: usize,
    pub anomalies_detected: usize,
    pub anomalies_persisted: usize,
    pub protocol_anomalies: usize,
    pub processed_at: DateTime<Utc>,
}

/// The ensemble scoring engine, built once per run
pub struct AnalysisEngine {
    ensemble: DetectorEnsemble,
    aggregator: VoteAggregator,
    protocol: ProtocolConfig,
}

impl AnalysisEngine {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            ensemble: DetectorEnsemble::from_config(&config.analysis),
            aggregator: VoteAggregator::new(config.analysis.persistence_agreement_threshold),
            protocol: config.protocol.clone(),
        }
    }

    /// Analyze the lines of one log file.
    pub fn analyze_lines<S: AsRef<str>>(&self, source_name: &str, lines: &[S]) -> FileReport {
        let batch = FeatureBatch::from_lines(lines);
        if batch.is_empty() {
            info!(file = source_name, "No informative lines, nothing to score");
            return FileReport::empty(source_name, SourceKind::LogText);
        }
        self.score_batch(source_name, &batch)
    }

    /// Analyze one packet-capture file.
    ///
    /// The ML batch on this path is the synthetic stand-in (the capture
    /// decoder collaborator owns structural features); decoded packet
    /// buffers, when available, feed the protocol rule scan.
    pub fn analyze_capture(
        &self,
        source_name: &str,
        file_size: u64,
        packets: &[Vec<u8>],
    ) -> FileReport {
        let batch = FeatureBatch::synthetic_capture(file_size);
        let mut report = if batch.is_empty() {
            info!(file = source_name, "Capture too small for a stand-in batch");
            FileReport::empty(source_name, SourceKind::PacketCapture)
        } else {
            self.score_batch(source_name, &batch)
        };

        if !packets.is_empty() {
            let mut scanner = ProtocolScanner::new(&self.protocol);
            report.protocol_anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));
            report.fronthaul_stats = Some(scanner.stats().clone());
        }

        report
    }

    /// Run the protocol rule scan alone over a decoded packet stream.
    pub fn scan_packets(&self, packets: &[Vec<u8>]) -> (Vec<ProtocolAnomaly>, FronthaulStats) {
        let mut scanner = ProtocolScanner::new(&self.protocol);
        let anomalies = scanner.scan(packets.iter().map(|p| p.as_slice()));
        let stats = scanner.stats().clone();
        (anomalies, stats)
    }

    fn score_batch(&self, source_name: &str, batch: &FeatureBatch) -> FileReport {
        let normalized = standardize(batch.records());
        let run = self.ensemble.run(&normalized);

        for model in &run.outputs {
            debug!(
                file = source_name,
                model = model.model_id,
                flagged = model.output.anomaly_count(),
                samples = run.sample_count,
                "Detector finished"
            );
        }

        let context = BatchContext {
            source_name,
            sample_indices: batch.sample_indices(),
        };
        let records = self.aggregator.aggregate(&run, &context);

        FileReport {
            source_file: source_name.to_string(),
            source_kind: batch.kind(),
            total_samples: run.sample_count,
            records,
            protocol_anomalies: Vec::new(),
            fronthaul_stats: None,
            executed_models: run.outputs.iter().map(|m| m.model_id).collect(),
            skipped_models: run.skipped,
        }
    }
}

/// Roll-up of one analysis run across files
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_processed: usize,
    pub total_samples: usize,
    pub anomalies_detected: usize,
    pub anomalies_persisted: usize,
    pub protocol_anomalies: usize,
}

/// Accumulates per-file reports into a session summary
pub struct AnalysisSession {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    files_processed: usize,
    total_samples: usize,
    anomalies_detected: usize,
    anomalies_persisted: usize,
    protocol_anomalies: usize,
}

impl AnalysisSession {
    pub fn new() -> Self {
        let session_id = Uuid::new_v4();
        info!(%session_id, "Starting analysis session");
        Self {
            session_id,
            started_at: Utc::now(),
            files_processed: 0,
            total_samples: 0,
            anomalies_detected: 0,
            anomalies_persisted: 0,
            protocol_anomalies: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record(&mut self, report: &FileReport) {
        self.files_processed += 1;
        self.total_samples += report.total_samples;
        self.anomalies_detected += report.records.len();
        self.anomalies_persisted += report.persisted_count();
        self.protocol_anomalies += report.protocol_anomalies.len();
    }

    pub fn finish(self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            files_processed: self.files_processed,
            total_samples: self.total_samples,
            anomalies_detected: self.anomalies_detected,
            anomalies_persisted: self.anomalies_persisted,
            protocol_anomalies: self.protocol_anomalies,
        }
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}
