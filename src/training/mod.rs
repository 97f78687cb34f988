//! Click-volume model training
//!
//! Fits one of three regression families (random forest, ordinary least
//! squares, multi-layer perceptron) to the (ctr, position, impressions)
//! feature triple against observed clicks, and scores mean squared error
//! on a held-out test partition.

pub mod forest;
pub mod linear;
pub mod metrics;
pub mod mlp;
pub mod tree;

pub use forest::{RandomForestRegressor, DEFAULT_N_ESTIMATORS};
pub use linear::LinearRegression;
pub use metrics::RegressionMetrics;
pub use mlp::{MLPConfig, MLPRegressor};
pub use tree::RegressionTree;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::Dataset;
use crate::error::{Result, SerplensError};

/// Seed for the train/test shuffle. Fixed so repeated runs on identical
/// input produce identical partitions.
pub const SPLIT_SEED: u64 = 42;

/// Fraction of rows held out for evaluation
pub const TEST_FRACTION: f64 = 0.2;

/// Minimum rows for a meaningful split
pub const MIN_TRAIN_ROWS: usize = 2;

/// Supported regression families. Unknown selectors are rejected at parse
/// time, before any data is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    LinearRegression,
    MLPRegressor,
}

impl ModelKind {
    /// All supported kinds, in menu order
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::LinearRegression,
        ModelKind::MLPRegressor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "RandomForest",
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::MLPRegressor => "MLPRegressor",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = SerplensError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RandomForest" => Ok(ModelKind::RandomForest),
            "LinearRegression" => Ok(ModelKind::LinearRegression),
            "MLPRegressor" => Ok(ModelKind::MLPRegressor),
            other => Err(SerplensError::InvalidModelKind(other.to_string())),
        }
    }
}

/// Capability shared by all model families
pub trait Regressor: Send + Sync {
    /// Fit to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per input row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// A fitted model, tagged by family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForestRegressor),
    LinearRegression(LinearRegression),
    MLPRegressor(MLPRegressor),
}

impl TrainedModel {
    /// Build an unfitted model for the given kind with the family defaults
    /// (100 trees / plain OLS / one hidden layer of 100 units, 1000 epochs).
    pub fn build(kind: ModelKind) -> Self {
        match kind {
            ModelKind::RandomForest => {
                TrainedModel::RandomForest(RandomForestRegressor::new(DEFAULT_N_ESTIMATORS))
            }
            ModelKind::LinearRegression => TrainedModel::LinearRegression(LinearRegression::new()),
            ModelKind::MLPRegressor => TrainedModel::MLPRegressor(MLPRegressor::default()),
        }
    }

    /// The family tag
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
            TrainedModel::MLPRegressor(_) => ModelKind::MLPRegressor,
        }
    }

    fn as_regressor_mut(&mut self) -> &mut dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::MLPRegressor(m) => m,
        }
    }

    fn as_regressor(&self) -> &dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::MLPRegressor(m) => m,
        }
    }

    /// Predict clicks for a feature matrix
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_regressor().predict(x)
    }
}

/// Deterministic shuffled split of `0..n_rows` into train/test index sets.
/// The test partition takes `ceil(n_rows * test_fraction)` rows from the
/// shuffled tail.
pub fn train_test_split(
    n_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if n_rows < MIN_TRAIN_ROWS {
        return Err(SerplensError::InsufficientData {
            rows: n_rows,
            min: MIN_TRAIN_ROWS,
        });
    }

    let test_size = (n_rows as f64 * test_fraction).ceil() as usize;
    let train_size = n_rows - test_size;
    if train_size == 0 || test_size == 0 {
        return Err(SerplensError::InsufficientData {
            rows: n_rows,
            min: MIN_TRAIN_ROWS,
        });
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices.split_off(train_size);
    Ok((indices, test_indices))
}

/// Train the selected model family on the dataset and score it on the
/// held-out partition. Returns the fitted model and its test-set MSE.
/// The input dataset is not mutated.
pub fn train(dataset: &Dataset, kind: ModelKind) -> Result<(TrainedModel, f64)> {
    let (model, metrics) = train_with_metrics(dataset, kind)?;
    Ok((model, metrics.mse))
}

/// Like [`train`], but returns the full evaluation metrics.
pub fn train_with_metrics(
    dataset: &Dataset,
    kind: ModelKind,
) -> Result<(TrainedModel, RegressionMetrics)> {
    let x = dataset.feature_matrix()?;
    let y = dataset.target()?;

    let (train_idx, test_idx) = train_test_split(dataset.len(), TEST_FRACTION, SPLIT_SEED)?;

    let x_train = x.select(Axis(0), &train_idx);
    let y_train = Array1::from_vec(train_idx.iter().map(|&i| y[i]).collect());
    let x_test = x.select(Axis(0), &test_idx);
    let y_test = Array1::from_vec(test_idx.iter().map(|&i| y[i]).collect());

    let mut model = TrainedModel::build(kind);
    model.as_regressor_mut().fit(&x_train, &y_train)?;

    let y_pred = model.predict(&x_test)?;
    let metrics = RegressionMetrics::compute(&y_test, &y_pred);

    info!(
        model = %kind,
        mse = metrics.mse,
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        "model trained"
    );

    Ok((model, metrics))
}
