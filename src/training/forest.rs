//! Bootstrap-aggregated forest of regression trees

use crate::error::{Result, SerplensError};
use ndarray::{Array1, Array2, Axis};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::RegressionTree;
use super::Regressor;

/// Default ensemble size
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Random forest regressor: bagged regression trees, mean-aggregated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    /// Ensemble size
    pub n_estimators: usize,
    /// Depth cap per tree (unbounded when None)
    pub max_depth: Option<usize>,
    /// Fewest samples a node may split on
    pub min_samples_split: usize,
    /// Fewest samples a leaf may hold
    pub min_samples_leaf: usize,
    /// Draw each tree's sample with replacement
    pub bootstrap: bool,
    /// Base seed for per-tree sampling
    pub random_state: Option<u64>,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(DEFAULT_N_ESTIMATORS)
    }
}

impl RandomForestRegressor {
    /// Create an unfitted forest with default growth parameters
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: None,
        }
    }

    /// Cap the depth of every tree
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Require at least `count` samples before a tree attempts a split
    pub fn with_min_samples_split(mut self, count: usize) -> Self {
        self.min_samples_split = count;
        self
    }

    /// Require at least `count` samples on each side of a split
    pub fn with_min_samples_leaf(mut self, count: usize) -> Self {
        self.min_samples_leaf = count;
        self
    }

    /// Fix the base seed for bootstrap sampling
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(SerplensError::EmptyDataset);
        }
        if n_samples != y.len() {
            return Err(SerplensError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        // Each tree draws its own seed so parallel order cannot affect results
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Result<Vec<RegressionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_id| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_id as u64));

                let draws: Vec<usize> = if self.bootstrap {
                    (0..n_samples)
                        .map(|_| (rng.next_u64() as usize) % n_samples)
                        .collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_sample = x.select(Axis(0), &draws);
                let y_sample = y.select(Axis(0), &draws);

                let mut tree = RegressionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf);
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }

                tree.fit(&x_sample, &y_sample)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(SerplensError::ModelNotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<Array1<f64>>>>()?;

        // Mean over trees, accumulated in tree order to stay reproducible
        let mut aggregate = Array1::<f64>::zeros(x.nrows());
        for predictions in &per_tree {
            aggregate += predictions;
        }
        Ok(aggregate / self.trees.len() as f64)
    }
}
