// Detector Ensemble
//
// A fixed, ordered set of unsupervised outlier detectors. Each detector
// consumes the normalized batch independently and either produces a binary
// label plus continuous score per sample, or is skipped with a reason.
// Skipped detectors drop out of the vote set and out of the agreement
// denominator; a detector failure is never fatal to the batch.

pub mod boundary;
pub mod clustering;
pub mod isolation;

pub use boundary::BoundaryMarginDetector;
pub use clustering::DensityClusteringDetector;
pub use isolation::IsolationForestDetector;

use ndarray::Array2;
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::config::AnalysisConfig;

/// Model identifiers, in fixed ensemble order
pub const MODEL_ISOLATION_FOREST: &str = "isolation_forest";
pub const MODEL_BOUNDARY_MARGIN: &str = "one_class_svm";
pub const MODEL_DENSITY_CLUSTERING: &str = "dbscan";

/// Why a detector produced no output for a batch
#[derive(Debug, Clone, Serialize)]
pub enum SkipReason {
    /// The batch is too small for this detector to fit
    TooFewSamples { required: usize, actual: usize },
    /// The input is degenerate (e.g. no feature spread at all)
    DegenerateInput(String),
    /// The underlying model failed to fit or predict
    ModelError(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewSamples { required, actual } => {
                write!(f, "too few samples: {actual} < {required}")
            }
            Self::DegenerateInput(detail) => write!(f, "degenerate input: {detail}"),
            Self::ModelError(detail) => write!(f, "model error: {detail}"),
        }
    }
}

/// Per-sample output of one detector over one batch
#[derive(Debug, Clone)]
pub struct DetectorOutput {
    /// One label per sample; `true` marks the sample anomalous
    pub labels: Vec<bool>,
    /// One continuous score per sample. Sign convention follows the
    /// detector (negative or below-offset means anomalous); the aggregator
    /// consumes absolute values.
    pub scores: Vec<f64>,
}

impl DetectorOutput {
    pub fn anomaly_count(&self) -> usize {
        self.labels.iter().filter(|&&flagged| flagged).count()
    }
}

/// An unsupervised outlier detector over a normalized batch
pub trait OutlierDetector {
    /// Stable model identifier used in votes and reports
    fn id(&self) -> &'static str;

    /// Fit on the batch and label every sample, or skip with a reason
    fn fit_predict(&self, batch: &Array2<f64>) -> Result<DetectorOutput, SkipReason>;
}

/// Output of one executed detector, tagged with its identifier
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub model_id: &'static str,
    pub output: DetectorOutput,
}

/// Result of running the whole ensemble over one batch
#[derive(Debug, Clone)]
pub struct EnsembleRun {
    /// Number of samples in the scored batch
    pub sample_count: usize,
    /// Outputs of the detectors that ran, in ensemble order
    pub outputs: Vec<ModelOutput>,
    /// Detectors that were skipped this batch, with reasons
    pub skipped: Vec<(&'static str, SkipReason)>,
}

impl EnsembleRun {
    /// Number of detectors that actually produced output; this is the
    /// denominator for agreement ratios.
    pub fn models_executed(&self) -> usize {
        self.outputs.len()
    }
}

/// The ordered detector ensemble
pub struct DetectorEnsemble {
    detectors: Vec<Box<dyn OutlierDetector>>,
}

impl DetectorEnsemble {
    /// Build the three core unsupervised detectors from configuration.
    ///
    /// The list order is fixed so vote ordering, and any "first matching
    /// model" selection downstream, is reproducible across runs.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(IsolationForestDetector::new(
                    config.contamination_fraction,
                    config.ensemble_size,
                )),
                Box::new(BoundaryMarginDetector::new(config.contamination_fraction)),
                Box::new(DensityClusteringDetector::new(
                    config.neighborhood_radius,
                    config.min_cluster_size,
                )),
            ],
        }
    }

    /// Append an extra detector, e.g. a supervised voter once labeled
    /// ground truth exists. Absent by default; when absent the agreement
    /// denominator shrinks accordingly.
    pub fn with_detector(mut self, detector: Box<dyn OutlierDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Run every detector over the batch, isolating failures.
    pub fn run(&self, batch: &Array2<f64>) -> EnsembleRun {
        let sample_count = batch.nrows();
        let mut outputs = Vec::new();
        let mut skipped = Vec::new();

        for detector in &self.detectors {
            match detector.fit_predict(batch) {
                Ok(output) => {
                    if output.labels.len() != sample_count || output.scores.len() != sample_count
                    {
                        warn!(
                            model = detector.id(),
                            expected = sample_count,
                            labels = output.labels.len(),
                            "Detector output length mismatch, dropping from vote set"
                        );
                        skipped.push((
                            detector.id(),
                            SkipReason::ModelError("output length mismatch".to_string()),
                        ));
                        continue;
                    }
                    outputs.push(ModelOutput {
                        model_id: detector.id(),
                        output,
                    });
                }
                Err(reason) => {
                    warn!(model = detector.id(), %reason, "Detector skipped for this batch");
                    skipped.push((detector.id(), reason));
                }
            }
        }

        EnsembleRun {
            sample_count,
            outputs,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct FixedDetector {
        id: &'static str,
        flagged: Vec<usize>,
    }

    impl OutlierDetector for FixedDetector {
        fn id(&self) -> &'static str {
            self.id
        }

        fn fit_predict(&self, batch: &Array2<f64>) -> Result<DetectorOutput, SkipReason> {
            let n = batch.nrows();
            let labels: Vec<bool> = (0..n).map(|i| self.flagged.contains(&i)).collect();
            let scores = labels
                .iter()
                .map(|&flagged| if flagged { -0.8 } else { 0.2 })
                .collect();
            Ok(DetectorOutput { labels, scores })
        }
    }

    struct FailingDetector;

    impl OutlierDetector for FailingDetector {
        fn id(&self) -> &'static str {
            "failing"
        }

        fn fit_predict(&self, _batch: &Array2<f64>) -> Result<DetectorOutput, SkipReason> {
            Err(SkipReason::ModelError("cannot fit".to_string()))
        }
    }

    fn stub_ensemble() -> DetectorEnsemble {
        DetectorEnsemble { detectors: vec![] }
            .with_detector(Box::new(FixedDetector {
                id: "a",
                flagged: vec![1],
            }))
            .with_detector(Box::new(FixedDetector {
                id: "b",
                flagged: vec![1, 2],
            }))
    }

    #[test]
    fn test_run_collects_outputs_in_order() {
        let batch = array![[0.0, 0.0], [5.0, 5.0], [1.0, 1.0]];
        let run = stub_ensemble().run(&batch);

        assert_eq!(run.sample_count, 3);
        assert_eq!(run.models_executed(), 2);
        assert_eq!(run.outputs[0].model_id, "a");
        assert_eq!(run.outputs[1].model_id, "b");
        assert_eq!(run.outputs[1].output.anomaly_count(), 2);
        assert!(run.skipped.is_empty());
    }

    #[test]
    fn test_failed_detector_shrinks_denominator() {
        let batch = array![[0.0], [1.0]];
        let run = stub_ensemble()
            .with_detector(Box::new(FailingDetector))
            .run(&batch);

        assert_eq!(run.models_executed(), 2);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].0, "failing");
        assert!(matches!(run.skipped[0].1, SkipReason::ModelError(_)));
    }

    #[test]
    fn test_core_ensemble_has_three_detectors() {
        let ensemble = DetectorEnsemble::from_config(&AnalysisConfig::default());
        let ids: Vec<&str> = ensemble.detectors.iter().map(|d| d.id()).collect();
        assert_eq!(
            ids,
            vec![
                MODEL_ISOLATION_FOREST,
                MODEL_BOUNDARY_MARGIN,
                MODEL_DENSITY_CLUSTERING
            ]
        );
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::TooFewSamples {
            required: 2,
            actual: 1,
        };
        assert_eq!(reason.to_string(), "too few samples: 1 < 2");
    }
}
