//! Analyzer Node Library
//!
//! Ensemble anomaly scoring for L1 fronthaul logs and packet captures:
//! feature extraction, per-model outlier scoring, cross-model vote
//! aggregation, severity/category classification, and a rule-based
//! protocol detector for the eCPRI framing header.

pub mod analyzer;
pub mod classify;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod explain;
pub mod features;
pub mod normalize;
pub mod protocol;
pub mod storage;
pub mod voting;

// Re-export commonly used types
pub use analyzer::{AnalysisEngine, AnalysisSession, FileReport, FileSummary, SessionSummary};
pub use classify::{
    categorize_source, severity_for_confidence, severity_for_record, AnomalyCategory, Severity,
};
pub use config::AnalyzerConfig;
pub use ensemble::{
    DetectorEnsemble, DetectorOutput, EnsembleRun, OutlierDetector, SkipReason,
};
pub use error::{AnalyzerError, Result};
pub use explain::{explain_record, ExplanationProvider, FeatureContribution};
pub use features::{FeatureBatch, LineFeatures, SourceKind};
pub use normalize::standardize;
pub use protocol::{FronthaulStats, ProtocolAnomaly, ProtocolAnomalyKind, ProtocolScanner};
pub use storage::{persist_report, AnomalySink, JsonlSink, MemorySink};
pub use voting::{AnomalyRecord, BatchContext, ModelVote, VoteAggregator};
