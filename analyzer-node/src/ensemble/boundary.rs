// Boundary-margin detector
//
// One-class scoring over a radial-basis kernel: each sample is scored by
// its mean kernel similarity to the whole batch, the boundary is placed at
// the nu-quantile of scores, and the signed margin to that boundary is the
// decision score. The kernel width is automatic ("scale"): inversely
// proportional to dimensionality times total feature variance.

use ndarray::{Array2, ArrayView1};
use std::cmp::Ordering;

use super::{DetectorOutput, OutlierDetector, SkipReason, MODEL_BOUNDARY_MARGIN};

/// Variance floor guarding the automatic kernel width on constant batches
const KERNEL_VARIANCE_FLOOR: f64 = 1e-12;

/// Boundary-margin detector with an RBF kernel
pub struct BoundaryMarginDetector {
    /// Expected outlier fraction
    nu: f64,
}

impl BoundaryMarginDetector {
    pub fn new(nu: f64) -> Self {
        Self { nu }
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

impl OutlierDetector for BoundaryMarginDetector {
    fn id(&self) -> &'static str {
        MODEL_BOUNDARY_MARGIN
    }

    fn fit_predict(&self, batch: &Array2<f64>) -> Result<DetectorOutput, SkipReason> {
        let n = batch.nrows();
        if n < 2 {
            return Err(SkipReason::TooFewSamples {
                required: 2,
                actual: n,
            });
        }

        // gamma = 1 / (n_features * total variance), the "scale" heuristic
        let total = batch.len() as f64;
        let mean = batch.sum() / total;
        let variance = batch.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / total;
        let gamma = 1.0 / (batch.ncols() as f64 * variance.max(KERNEL_VARIANCE_FLOOR));

        let similarity: Vec<f64> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| (-gamma * squared_distance(batch.row(i), batch.row(j))).exp())
                    .sum::<f64>()
                    / n as f64
            })
            .collect();

        // Boundary at the nu-quantile; samples strictly below it are
        // outside the margin. Ties at the boundary stay normal.
        let mut sorted = similarity.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let flagged = ((self.nu * n as f64).floor() as usize).min(n - 1);
        let offset = sorted[flagged];

        let labels: Vec<bool> = similarity.iter().map(|&score| score < offset).collect();
        // Signed margin: negative = outside the boundary, anomalous
        let scores: Vec<f64> = similarity.iter().map(|&score| score - offset).collect();

        Ok(DetectorOutput { labels, scores })
    }
}
