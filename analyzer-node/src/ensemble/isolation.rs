// Isolation-forest style density-contamination detector
//
// Anomalous samples are easier to isolate with random axis-aligned splits,
// so they end up with shorter average path lengths across a forest of
// randomly grown trees. The bottom contamination-fraction of decision
// scores is labeled anomalous.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

use super::{DetectorOutput, OutlierDetector, SkipReason, MODEL_ISOLATION_FOREST};

/// Fixed seed so scoring is reproducible across runs
const DEFAULT_SEED: u64 = 42;

/// Subsample size per tree, capped at the batch size
const MAX_SUBSAMPLE: usize = 256;

/// Euler-Mascheroni constant, used in the average-path-length estimate
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Density-contamination detector over randomly grown isolation trees
pub struct IsolationForestDetector {
    contamination: f64,
    tree_count: usize,
    seed: u64,
}

impl IsolationForestDetector {
    pub fn new(contamination: f64, tree_count: usize) -> Self {
        Self {
            contamination,
            tree_count,
            seed: DEFAULT_SEED,
        }
    }

    #[cfg(test)]
    fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

struct IsolationTree {
    nodes: Vec<Node>,
    root: usize,
}

impl IsolationTree {
    fn grow(batch: &Array2<f64>, rows: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        let root = grow_node(batch, rows, 0, max_depth, rng, &mut nodes);
        Self { nodes, root }
    }

    /// Path length from the root to the leaf holding this sample, extended
    /// by the expected depth of an unbuilt subtree of the leaf's size.
    fn path_length(&self, batch: &Array2<f64>, row: usize) -> f64 {
        let mut node = self.root;
        let mut depth = 0.0;

        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if batch[[row, *feature]] < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow_node(
    batch: &Array2<f64>,
    rows: &mut [usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
    nodes: &mut Vec<Node>,
) -> usize {
    if depth >= max_depth || rows.len() <= 1 {
        nodes.push(Node::Leaf { size: rows.len() });
        return nodes.len() - 1;
    }

    // Only features with spread inside this node can split it
    let candidates: Vec<(usize, f64, f64)> = (0..batch.ncols())
        .filter_map(|feature| {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &row in rows.iter() {
                let value = batch[[row, feature]];
                lo = lo.min(value);
                hi = hi.max(value);
            }
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        nodes.push(Node::Leaf { size: rows.len() });
        return nodes.len() - 1;
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);

    let split_at = partition(batch, rows, feature, threshold);
    if split_at == 0 || split_at == rows.len() {
        nodes.push(Node::Leaf { size: rows.len() });
        return nodes.len() - 1;
    }

    let (left_rows, right_rows) = rows.split_at_mut(split_at);
    let left = grow_node(batch, left_rows, depth + 1, max_depth, rng, nodes);
    let right = grow_node(batch, right_rows, depth + 1, max_depth, rng, nodes);

    nodes.push(Node::Split {
        feature,
        threshold,
        left,
        right,
    });
    nodes.len() - 1
}

/// Partition rows so values below the threshold come first; returns the
/// boundary index.
fn partition(batch: &Array2<f64>, rows: &mut [usize], feature: usize, threshold: f64) -> usize {
    let mut boundary = 0;
    for i in 0..rows.len() {
        if batch[[rows[i], feature]] < threshold {
            rows.swap(i, boundary);
            boundary += 1;
        }
    }
    boundary
}

/// Expected path length of an unsuccessful BST search over `n` samples
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl OutlierDetector for IsolationForestDetector {
    fn id(&self) -> &'static str {
        MODEL_ISOLATION_FOREST
    }

    fn fit_predict(&self, batch: &Array2<f64>) -> Result<DetectorOutput, SkipReason> {
        let n = batch.nrows();
        if n < 2 {
            return Err(SkipReason::TooFewSamples {
                required: 2,
                actual: n,
            });
        }

        let subsample = MAX_SUBSAMPLE.min(n);
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<IsolationTree> = (0..self.tree_count)
            .map(|_| {
                let mut rows = sample(&mut rng, n, subsample).into_vec();
                IsolationTree::grow(batch, &mut rows, max_depth, &mut rng)
            })
            .collect();

        // Anomaly score in (0, 1]; higher means shorter paths, more isolated
        let normalizer = average_path_length(subsample);
        let raw: Vec<f64> = (0..n)
            .map(|row| {
                let mean_path = trees
                    .iter()
                    .map(|tree| tree.path_length(batch, row))
                    .sum::<f64>()
                    / self.tree_count as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect();

        // Offset at the contamination quantile; samples strictly above it
        // are anomalous. Ties at the offset stay normal.
        let mut sorted = raw.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let flagged = ((self.contamination * n as f64).floor() as usize).min(n - 1);
        let offset = sorted[n - 1 - flagged];

        let labels: Vec<bool> = raw.iter().map(|&score| score > offset).collect();
        // Decision score: higher = more normal, negative = anomalous
        let scores: Vec<f64> = raw.iter().map(|&score| offset - score).collect();

        Ok(DetectorOutput { labels, scores })
    }
}
