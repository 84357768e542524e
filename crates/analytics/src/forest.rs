//! Isolation forest for unsupervised anomaly scoring.
//!
//! Standard construction: each tree is grown on a random subsample with
//! uniform random splits; anomaly score is `2^(-E[h(x)] / c(n))` where
//! `h(x)` is the path length and `c(n)` the expected path length of an
//! unsuccessful BST search. Scores approach 1 for isolated points and fall
//! toward 0.5 for inliers. Seeded, so results are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_TREES: usize = 100;
const DEFAULT_SUBSAMPLE: usize = 256;
const DEFAULT_SEED: u64 = 42;

enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
}

impl IsolationForest {
    /// Fit with the default configuration (100 trees, subsample ≤ 256,
    /// fixed seed).
    pub fn fit(data: &[Vec<f64>]) -> Self {
        Self::fit_seeded(data, DEFAULT_TREES, DEFAULT_SUBSAMPLE, DEFAULT_SEED)
    }

    pub fn fit_seeded(data: &[Vec<f64>], n_trees: usize, subsample: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample_size = subsample.min(data.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let sample = sample_without_replacement(data.len(), sample_size, &mut rng);
                build_tree(data, &sample, 0, height_limit, &mut rng)
            })
            .collect();

        Self {
            trees,
            subsample: sample_size,
        }
    }

    /// Anomaly score in (0, 1) for one row.
    pub fn score(&self, row: &[f64]) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        2f64.powf(-mean_path / average_path_length(self.subsample))
    }

    /// Scores for every row of a matrix.
    pub fn scores(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|row| self.score(row)).collect()
    }
}

/// Indices of the rows flagged anomalous at the given contamination level:
/// the top `round(contamination * n)` scores.
pub fn flag_by_contamination(scores: &[f64], contamination: f64) -> Vec<usize> {
    let k = (contamination * scores.len() as f64).round() as usize;
    if k == 0 {
        return Vec::new();
    }

    let mut indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed.into_iter().map(|(i, _)| i).collect()
}

fn sample_without_replacement(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    // Partial Fisher-Yates over the index range.
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k.min(n) {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k.min(n));
    indices
}

fn build_tree(
    data: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if indices.len() <= 1 || depth >= height_limit {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Splittable features are those with spread inside this partition.
    let n_features = data[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &i in indices {
                min = min.min(data[i][f]);
                max = max.max(data[i][f]);
            }
            (max > min).then_some((f, min, max))
        })
        .collect();

    if splittable.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let split = rng.gen_range(min..max);

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.iter().copied().partition(|&i| data[i][feature] < split);

    Node::Internal {
        feature,
        split,
        left: Box::new(build_tree(data, &left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, &right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Internal {
            feature,
            split,
            left,
            right,
        } => {
            if row.get(*feature).copied().unwrap_or(0.0) < *split {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            // 2 * H(n-1) - 2 * (n-1) / n, with the harmonic number
            // approximated by ln + Euler-Mascheroni.
            2.0 * ((n - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A tight cluster with one far outlier.
    fn clustered_data() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![10.0 + f64::from(i % 5) * 0.1, 20.0 + f64::from(i % 7) * 0.1])
            .collect();
        data.push(vec![500.0, -300.0]);
        data
    }

    #[test]
    fn outlier_scores_highest() {
        let data = clustered_data();
        let forest = IsolationForest::fit(&data);
        let scores = forest.scores(&data);

        let outlier_score = scores[data.len() - 1];
        let max_inlier = scores[..data.len() - 1]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        assert!(
            outlier_score > max_inlier,
            "outlier {outlier_score} should exceed inliers (max {max_inlier})"
        );
    }

    #[test]
    fn scores_are_deterministic_for_a_seed() {
        let data = clustered_data();
        let a = IsolationForest::fit_seeded(&data, 50, 128, 7).scores(&data);
        let b = IsolationForest::fit_seeded(&data, 50, 128, 7).scores(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let data = clustered_data();
        let forest = IsolationForest::fit(&data);
        for score in forest.scores(&data) {
            assert!(score > 0.0 && score < 1.0);
        }
    }

    #[test]
    fn contamination_flags_expected_count() {
        let scores = vec![0.4, 0.9, 0.5, 0.45, 0.48, 0.52, 0.41, 0.44, 0.46, 0.47];
        let flagged = flag_by_contamination(&scores, 0.1);
        assert_eq!(flagged, vec![1]);

        let flagged = flag_by_contamination(&scores, 0.2);
        assert_eq!(flagged.len(), 2);
        assert!(flagged.contains(&1));
    }

    #[test]
    fn zero_contamination_flags_nothing() {
        assert!(flag_by_contamination(&[0.9, 0.8], 0.0).is_empty());
    }

    #[test]
    fn identical_rows_do_not_panic() {
        let data = vec![vec![1.0, 1.0]; 30];
        let forest = IsolationForest::fit(&data);
        let scores = forest.scores(&data);
        assert_eq!(scores.len(), 30);
    }
}
