// Density-clustering detector (DBSCAN)
//
// Points that no cluster claims are outliers. DBSCAN has no native
// continuous score, so confidence is synthesized from the distance to the
// nearest cluster center: far-from-everything outliers score high,
// clustered points get a low non-zero score so "normal" is still
// quantifiable in the vote.

use linfa::traits::Transformer;
use linfa::ParamGuard;
use linfa_clustering::Dbscan;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::{DetectorOutput, OutlierDetector, SkipReason, MODEL_DENSITY_CLUSTERING};

/// Confidence floor for an outlier point
const OUTLIER_BASE_CONFIDENCE: f64 = 0.3;

/// Confidence cap for an outlier point
const OUTLIER_MAX_CONFIDENCE: f64 = 0.9;

/// Distance-to-confidence scale divisor
const DISTANCE_SCALE: f64 = 10.0;

/// Confidence when no cluster exists to measure distance against
const UNCLUSTERED_FALLBACK_CONFIDENCE: f64 = 0.6;

/// Low non-zero score assigned to clustered (normal) points
const NORMAL_POINT_SCORE: f64 = 0.1;

/// DBSCAN-backed density-clustering detector
pub struct DensityClusteringDetector {
    /// Neighborhood radius in standardized feature space
    neighborhood_radius: f64,
    /// Minimum points for a cluster
    min_cluster_size: usize,
}

impl DensityClusteringDetector {
    pub fn new(neighborhood_radius: f64, min_cluster_size: usize) -> Self {
        Self {
            neighborhood_radius,
            min_cluster_size,
        }
    }
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Mean position of every cluster found in the batch
fn cluster_centers(batch: &Array2<f64>, assignments: &Array1<Option<usize>>) -> Vec<Array1<f64>> {
    let cluster_count = assignments
        .iter()
        .flatten()
        .copied()
        .max()
        .map_or(0, |max| max + 1);

    let mut sums = vec![Array1::<f64>::zeros(batch.ncols()); cluster_count];
    let mut counts = vec![0usize; cluster_count];

    for (row, assignment) in assignments.iter().enumerate() {
        if let Some(cluster) = assignment {
            sums[*cluster] += &batch.index_axis(Axis(0), row);
            counts[*cluster] += 1;
        }
    }

    sums.into_iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(sum, count)| sum / count as f64)
        .collect()
}

impl OutlierDetector for DensityClusteringDetector {
    fn id(&self) -> &'static str {
        MODEL_DENSITY_CLUSTERING
    }

    fn fit_predict(&self, batch: &Array2<f64>) -> Result<DetectorOutput, SkipReason> {
        let n = batch.nrows();
        if n == 0 {
            return Err(SkipReason::TooFewSamples {
                required: 1,
                actual: 0,
            });
        }

        let params = Dbscan::params(self.min_cluster_size).tolerance(self.neighborhood_radius);
        let checked = params
            .check()
            .map_err(|e| SkipReason::ModelError(e.to_string()))?;
        let assignments: Array1<Option<usize>> = checked.transform(batch);

        let centers = cluster_centers(batch, &assignments);

        let mut labels = Vec::with_capacity(n);
        let mut scores = Vec::with_capacity(n);

        for (row, assignment) in assignments.iter().enumerate() {
            match assignment {
                Some(_) => {
                    labels.push(false);
                    scores.push(NORMAL_POINT_SCORE);
                }
                None => {
                    let confidence = centers
                        .iter()
                        .map(|center| distance(batch.row(row), center.view()))
                        .fold(f64::INFINITY, f64::min);
                    let confidence = if confidence.is_finite() {
                        (OUTLIER_BASE_CONFIDENCE + confidence / DISTANCE_SCALE)
                            .min(OUTLIER_MAX_CONFIDENCE)
                    } else {
                        UNCLUSTERED_FALLBACK_CONFIDENCE
                    };
                    labels.push(true);
                    // Negative for anomalies, matching the ensemble sign convention
                    scores.push(-confidence);
                }
            }
        }

        Ok(DetectorOutput { labels, scores })
    }
}
