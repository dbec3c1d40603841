// Batch Normalization
//
// Rescales each feature column of a batch to zero mean and unit variance.
// Scaling is computed per batch (per file); no scaler state survives
// between files.

use ndarray::{Array2, Axis};

/// Variance floor for constant columns. A column whose variance falls below
/// this is shifted to zero and left unscaled instead of dividing by zero.
const VARIANCE_FLOOR: f64 = 1e-12;

/// Standardize a batch matrix column-wise.
///
/// Population statistics are used (divide by N, not N-1), so a single-sample
/// batch degenerates to all-zero rows rather than erroring.
pub fn standardize(batch: &Array2<f64>) -> Array2<f64> {
    let samples = batch.nrows();
    if samples == 0 {
        return batch.clone();
    }

    let mut scaled = batch.clone();
    for mut column in scaled.axis_iter_mut(Axis(1)) {
        let mean = column.sum() / samples as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples as f64;

        if variance < VARIANCE_FLOOR {
            column.mapv_inplace(|v| v - mean);
        } else {
            let std_dev = variance.sqrt();
            column.mapv_inplace(|v| (v - mean) / std_dev);
        }
    }

    scaled
}
