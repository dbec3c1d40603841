// Vote Aggregation
//
// Combines per-model labels and scores into one anomaly record per flagged
// sample: an agreement count, a single clamped confidence value, and the
// persistence decision. The agreement denominator is always the number of
// models that actually produced output for this batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::{categorize_source, severity_for_record, AnomalyCategory, Severity};
use crate::ensemble::EnsembleRun;

/// One model's vote on one sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVote {
    /// Model identifier
    pub model_id: String,
    /// 1 = anomalous, 0 = normal
    pub prediction: u8,
    /// Non-negative vote strength (absolute model score)
    pub confidence: f64,
}

/// An aggregated anomaly finding, immutable once emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Position of the sample in its source file (line or packet index)
    pub sample_index: usize,
    /// Ensemble confidence, clamped to [0, 1]
    pub confidence: f64,
    /// Number of models that voted anomalous
    pub model_agreement: usize,
    /// Every executed model's vote, in deterministic order
    pub votes: BTreeMap<String, ModelVote>,
    /// Severity tier from confidence and agreement
    pub severity: Severity,
    /// Category from source-name context
    pub category: AnomalyCategory,
    /// Whether the finding passed the persistence gate
    pub persist: bool,
    /// When the record was created
    pub timestamp: DateTime<Utc>,
}

/// Source context for one aggregated batch
#[derive(Debug, Clone)]
pub struct BatchContext<'a> {
    /// Source file name, drives categorization
    pub source_name: &'a str,
    /// Maps batch rows back to original record positions
    pub sample_indices: &'a [usize],
}

/// Aggregates ensemble votes into anomaly records
#[derive(Debug, Clone)]
pub struct VoteAggregator {
    /// Fraction of executed models that must agree for persistence
    persistence_threshold: f64,
}

impl VoteAggregator {
    pub fn new(persistence_threshold: f64) -> Self {
        Self {
            persistence_threshold,
        }
    }

    /// Build one record per sample flagged by at least one model, in
    /// ascending sample order.
    pub fn aggregate(&self, run: &EnsembleRun, context: &BatchContext<'_>) -> Vec<AnomalyRecord> {
        let models_executed = run.models_executed();
        if models_executed == 0 {
            return Vec::new();
        }

        let mut flagged_rows = BTreeSet::new();
        for model in &run.outputs {
            for (row, &label) in model.output.labels.iter().enumerate() {
                if label {
                    flagged_rows.insert(row);
                }
            }
        }

        let category = categorize_source(context.source_name);

        flagged_rows
            .into_iter()
            .map(|row| {
                let mut votes = BTreeMap::new();
                let mut agreement = 0usize;
                let mut score_sum = 0.0;

                for model in &run.outputs {
                    let anomalous = model.output.labels[row];
                    let strength = model.output.scores[row].abs();

                    if anomalous {
                        agreement += 1;
                        score_sum += strength;
                    }

                    votes.insert(
                        model.model_id.to_string(),
                        ModelVote {
                            model_id: model.model_id.to_string(),
                            prediction: anomalous as u8,
                            confidence: strength,
                        },
                    );
                }

                let confidence = ((agreement as f64 / models_executed as f64)
                    * (score_sum / agreement.max(1) as f64))
                    .clamp(0.0, 1.0);

                let persist =
                    agreement as f64 / models_executed as f64 >= self.persistence_threshold;

                AnomalyRecord {
                    sample_index: context
                        .sample_indices
                        .get(row)
                        .copied()
                        .unwrap_or(row),
                    confidence,
                    model_agreement: agreement,
                    votes,
                    severity: severity_for_record(confidence, agreement),
                    category,
                    persist,
                    timestamp: Utc::now(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{DetectorOutput, ModelOutput};

    fn model(id: &'static str, labels: Vec<bool>, scores: Vec<f64>) -> ModelOutput {
        ModelOutput {
            model_id: id,
            output: DetectorOutput { labels, scores },
        }
    }

    fn run_of(outputs: Vec<ModelOutput>, sample_count: usize) -> EnsembleRun {
        EnsembleRun {
            sample_count,
            outputs,
            skipped: Vec::new(),
        }
    }

    fn context(indices: &[usize]) -> BatchContext<'_> {
        BatchContext {
            source_name: "capture.log",
            sample_indices: indices,
        }
    }

    #[test]
    fn test_unanimous_vote_persists() {
        let run = run_of(
            vec![
                model("a", vec![false, true], vec![0.3, -0.6]),
                model("b", vec![false, true], vec![0.2, -0.9]),
                model("c", vec![false, true], vec![0.1, -0.9]),
            ],
            2,
        );
        let indices = [0, 1];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.sample_index, 1);
        assert_eq!(record.model_agreement, 3);
        assert!(record.persist);
        // (3/3) * ((0.6 + 0.9 + 0.9) / 3) = 0.8
        assert!((record.confidence - 0.8).abs() < 1e-9);
        assert_eq!(record.votes.len(), 3);
        assert_eq!(record.votes["a"].prediction, 1);
    }

    #[test]
    fn test_single_vote_does_not_persist() {
        let run = run_of(
            vec![
                model("a", vec![true], vec![-0.5]),
                model("b", vec![false], vec![0.4]),
                model("c", vec![false], vec![0.1]),
            ],
            1,
        );
        let indices = [7];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.sample_index, 7);
        assert_eq!(record.model_agreement, 1);
        assert!(!record.persist);
        // Disagreeing models still appear in the vote map
        assert_eq!(record.votes.len(), 3);
        assert_eq!(record.votes["b"].prediction, 0);
    }

    #[test]
    fn test_three_of_four_passes_gate() {
        let run = run_of(
            vec![
                model("a", vec![true], vec![-0.9]),
                model("b", vec![true], vec![-0.8]),
                model("c", vec![true], vec![-0.7]),
                model("d", vec![false], vec![0.5]),
            ],
            1,
        );
        let indices = [0];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));
        assert!(records[0].persist);
        assert_eq!(records[0].model_agreement, 3);

        // 2-of-4 falls below the gate
        let run = run_of(
            vec![
                model("a", vec![true], vec![-0.9]),
                model("b", vec![true], vec![-0.8]),
                model("c", vec![false], vec![0.7]),
                model("d", vec![false], vec![0.5]),
            ],
            1,
        );
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));
        assert!(!records[0].persist);
    }

    #[test]
    fn test_reduced_denominator_after_model_failure() {
        // Two of two executed models agree: ratio 1.0 passes the gate even
        // though a third detector was skipped.
        let mut run = run_of(
            vec![
                model("a", vec![true], vec![-0.6]),
                model("b", vec![true], vec![-0.4]),
            ],
            1,
        );
        run.skipped.push((
            "c",
            crate::ensemble::SkipReason::TooFewSamples {
                required: 2,
                actual: 1,
            },
        ));

        let indices = [0];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));
        assert_eq!(records[0].model_agreement, 2);
        assert!(records[0].persist);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let run = run_of(
            vec![
                model("a", vec![true], vec![-9.0]),
                model("b", vec![true], vec![-8.0]),
                model("c", vec![true], vec![-7.0]),
            ],
            1,
        );
        let indices = [0];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));
        assert_eq!(records[0].confidence, 1.0);
    }

    #[test]
    fn test_no_models_no_records() {
        let run = run_of(vec![], 5);
        let indices = [0, 1, 2, 3, 4];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));
        assert!(records.is_empty());
    }

    #[test]
    fn test_records_in_ascending_sample_order() {
        let run = run_of(
            vec![model(
                "a",
                vec![true, false, true, true],
                vec![-0.1, 0.2, -0.3, -0.4],
            )],
            4,
        );
        let indices = [3, 5, 8, 13];
        let records = VoteAggregator::new(0.75).aggregate(&run, &context(&indices));

        let positions: Vec<usize> = records.iter().map(|r| r.sample_index).collect();
        assert_eq!(positions, vec![3, 8, 13]);
    }
}
