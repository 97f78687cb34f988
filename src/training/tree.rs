//! Regression decision tree

use crate::error::{Result, SerplensError};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tree node: either a leaf carrying the mean target of its samples,
/// or a binary split on one feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// CART-style regression tree, variance-reduction splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    /// Maximum depth (unbounded when None)
    pub max_depth: Option<usize>,
    /// Minimum samples required to attempt a split
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    n_features: usize,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegressionTree {
    /// Create an unfitted tree with default growth parameters
    /// (unbounded depth, split at 2, leaves of 1).
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
        }
    }

    /// Cap the depth the tree may grow to
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Require at least `count` samples before attempting a split
    pub fn with_min_samples_split(mut self, count: usize) -> Self {
        self.min_samples_split = count;
        self
    }

    /// Require at least `count` samples on each side of a split
    pub fn with_min_samples_leaf(mut self, count: usize) -> Self {
        self.min_samples_leaf = count;
        self
    }

    /// Grow the tree on training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(SerplensError::EmptyDataset);
        }
        if x.nrows() != y.len() {
            return Err(SerplensError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        self.n_features = x.ncols();
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.grow(x, y, &rows, 0));
        Ok(())
    }

    fn grow(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize], depth: usize) -> TreeNode {
        let targets: Vec<f64> = rows.iter().map(|&i| y[i]).collect();

        let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
        if rows.len() < self.min_samples_split || depth_reached || is_pure(&targets) {
            return leaf(&targets);
        }

        let Some((feature, threshold)) = self.find_best_split(x, y, rows) else {
            return leaf(&targets);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&i| x[[i, feature]] <= threshold);

        if left_rows.len() < self.min_samples_leaf || right_rows.len() < self.min_samples_leaf {
            return leaf(&targets);
        }

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left: Box::new(self.grow(x, y, &left_rows, depth + 1)),
            right: Box::new(self.grow(x, y, &right_rows, depth + 1)),
            n_samples: rows.len(),
        }
    }

    /// Scan all features for the variance-minimizing split.
    /// Candidate thresholds are midpoints between consecutive distinct values.
    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Option<(usize, f64)> {
        let targets: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
        let parent_impurity = variance(&targets);

        let per_feature: Vec<Option<(usize, f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature| {
                let mut values: Vec<f64> = rows.iter().map(|&i| x[[i, feature]]).collect();
                values.sort_by(f64::total_cmp);
                values.dedup();

                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for pair in values.windows(2) {
                    let threshold = (pair[0] + pair[1]) / 2.0;

                    // Accumulate counts and moments in one pass per candidate
                    let mut left = SideMoments::default();
                    let mut right = SideMoments::default();
                    for &idx in rows {
                        if x[[idx, feature]] <= threshold {
                            left.add(y[idx]);
                        } else {
                            right.add(y[idx]);
                        }
                    }

                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let total = rows.len() as f64;
                    let weighted = (left.count as f64 * left.variance()
                        + right.count as f64 * right.variance())
                        / total;

                    let gain = parent_impurity - weighted;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = threshold;
                    }
                }

                (best_gain > 0.0).then_some((feature, best_threshold, best_gain))
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    /// Predict a target per input row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(SerplensError::ModelNotFitted)?;
        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| descend(root, &row.to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Depth of the fitted tree (0 when unfitted)
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

/// Running count/sum/sum-of-squares for one side of a candidate split
#[derive(Default)]
struct SideMoments {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl SideMoments {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sq_sum += value * value;
    }

    /// Var = E[X^2] - E[X]^2
    fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        self.sq_sum / n - (self.sum / n).powi(2)
    }
}

fn leaf(targets: &[f64]) -> TreeNode {
    TreeNode::Leaf {
        value: mean(targets),
        n_samples: targets.len(),
    }
}

fn descend(node: &TreeNode, sample: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
            if sample[*feature_idx] <= *threshold {
                descend(left, sample)
            } else {
                descend(right, sample)
            }
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn is_pure(values: &[f64]) -> bool {
    match values.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|v| (v - first).abs() < 1e-10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_linear_ramp() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 6.0, 9.0, 12.0, 15.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut tree = RegressionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 3, "depth = {}", tree.depth());
    }

    #[test]
    fn test_constant_target_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![7.0, 7.0, 7.0];

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.depth(), 1);

        let predictions = tree.predict(&array![[10.0]]).unwrap();
        assert!((predictions[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_samples_leaf_blocks_tiny_splits() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut tree = RegressionTree::new().with_min_samples_leaf(4);
        tree.fit(&x, &y).unwrap();
        // No legal split leaves 4 samples on each side, so the tree is a stump
        assert_eq!(tree.depth(), 1);
        let predictions = tree.predict(&x).unwrap();
        assert!((predictions[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_predict_without_fit_fails() {
        let tree = RegressionTree::new();
        let result = tree.predict(&array![[1.0]]);
        assert!(matches!(result, Err(SerplensError::ModelNotFitted)));
    }
}
