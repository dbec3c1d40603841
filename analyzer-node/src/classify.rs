// Severity and category classification
//
// Explicit heuristics, not learned classifiers: severity tiers come from
// fixed confidence/agreement thresholds, categories from source-name
// substrings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tier of a finding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// Anomaly category derived from source-name context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyCategory {
    /// Distributed-unit to radio-unit link anomalies
    DuRuCommunication,
    /// Subscriber (UE) event patterns
    UeEventPattern,
    /// Timing and synchronization anomalies
    TimingSynchronization,
    /// Default bucket for everything else
    ProtocolViolation,
}

impl fmt::Display for AnomalyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DuRuCommunication => "DU-RU Communication",
            Self::UeEventPattern => "UE Event Pattern",
            Self::TimingSynchronization => "Timing Synchronization",
            Self::ProtocolViolation => "Protocol Violation",
        };
        write!(f, "{name}")
    }
}

/// Severity for a full anomaly record, from ensemble confidence and
/// model agreement.
pub fn severity_for_record(confidence: f64, agreement: usize) -> Severity {
    if confidence > 0.9 && agreement >= 3 {
        Severity::Critical
    } else if confidence > 0.7 && agreement >= 2 {
        Severity::High
    } else if confidence > 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Confidence-only severity, for classifying a single sample outside full
/// record context.
pub fn severity_for_confidence(confidence: f64) -> Severity {
    if confidence > 0.8 {
        Severity::Critical
    } else if confidence > 0.6 {
        Severity::High
    } else if confidence > 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Categorize a finding from its source name. Substring checks run in a
/// fixed order; the first match wins.
pub fn categorize_source(source_name: &str) -> AnomalyCategory {
    let lower = source_name.to_lowercase();
    if lower.contains("du") || lower.contains("ru") {
        AnomalyCategory::DuRuCommunication
    } else if lower.contains("ue") {
        AnomalyCategory::UeEventPattern
    } else if lower.contains("timing") || lower.contains("sync") {
        AnomalyCategory::TimingSynchronization
    } else {
        AnomalyCategory::ProtocolViolation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_severity_tiers() {
        assert_eq!(severity_for_record(0.95, 3), Severity::Critical);
        assert_eq!(severity_for_record(0.95, 2), Severity::High);
        assert_eq!(severity_for_record(0.75, 2), Severity::High);
        assert_eq!(severity_for_record(0.75, 1), Severity::Medium);
        assert_eq!(severity_for_record(0.55, 0), Severity::Medium);
        assert_eq!(severity_for_record(0.3, 4), Severity::Low);
    }

    #[test]
    fn test_confidence_only_tiers() {
        assert_eq!(severity_for_confidence(0.85), Severity::Critical);
        assert_eq!(severity_for_confidence(0.7), Severity::High);
        assert_eq!(severity_for_confidence(0.5), Severity::Medium);
        assert_eq!(severity_for_confidence(0.4), Severity::Low);
    }

    #[test]
    fn test_severity_is_monotonic() {
        let confidences = [0.0, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 1.0];
        let agreements = [0usize, 1, 2, 3, 4];

        for (ci, &c1) in confidences.iter().enumerate() {
            for &c2 in &confidences[ci..] {
                for (ai, &a1) in agreements.iter().enumerate() {
                    for &a2 in &agreements[ai..] {
                        assert!(
                            severity_for_record(c1, a1) <= severity_for_record(c2, a2),
                            "severity must not decrease from ({c1},{a1}) to ({c2},{a2})"
                        );
                    }
                }
            }
        }

        for (ci, &c1) in confidences.iter().enumerate() {
            for &c2 in &confidences[ci..] {
                assert!(severity_for_confidence(c1) <= severity_for_confidence(c2));
            }
        }
    }

    #[test]
    fn test_categorize_source() {
        assert_eq!(
            categorize_source("du_ru_link_trace.log"),
            AnomalyCategory::DuRuCommunication
        );
        assert_eq!(
            categorize_source("UE_attach_events.txt"),
            AnomalyCategory::UeEventPattern
        );
        assert_eq!(
            categorize_source("timing_drift.log"),
            AnomalyCategory::TimingSynchronization
        );
        assert_eq!(
            categorize_source("capture_001.pcap"),
            AnomalyCategory::ProtocolViolation
        );
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
    }
}
