//! Ordinary least squares regression

use crate::error::{Result, SerplensError};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::Regressor;

/// Lower-triangular Cholesky factor of a symmetric matrix, or None when the
/// matrix is not positive definite.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }

    let mut chol = Array2::<f64>::zeros((n, n));
    for row in 0..n {
        for col in 0..=row {
            let partial: f64 = (0..col).map(|k| chol[[row, k]] * chol[[col, k]]).sum();
            let value = a[[row, col]] - partial;
            if row == col {
                if value <= 0.0 {
                    return None;
                }
                chol[[row, col]] = value.sqrt();
            } else {
                chol[[row, col]] = value / chol[[col, col]];
            }
        }
    }
    Some(chol)
}

/// Solve (L L^T) x = b by forward then backward substitution
fn solve_cholesky_system(chol: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = chol.nrows();

    let mut forward = Array1::<f64>::zeros(n);
    for i in 0..n {
        let partial: f64 = (0..i).map(|j| chol[[i, j]] * forward[j]).sum();
        forward[i] = (b[i] - partial) / chol[[i, i]];
    }

    let mut solution = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let partial: f64 = (i + 1..n).map(|j| chol[[j, i]] * solution[j]).sum();
        solution[i] = (forward[i] - partial) / chol[[i, i]];
    }
    solution
}

/// Solve the symmetric positive-definite system Ax = b via Cholesky.
/// Retries once with a small diagonal ridge when A is near-singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    if let Some(chol) = cholesky_factor(a) {
        return Some(solve_cholesky_system(&chol, b));
    }

    // Not positive definite as given, nudge the diagonal and retry. The
    // floor keeps the nudge positive even for an all-zero matrix (a single
    // centered sample), where the solve then yields zero slopes.
    let ridge = (1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1e-12);
    let mut nudged = a.clone();
    for k in 0..n {
        nudged[[k, k]] += ridge;
    }
    cholesky_factor(&nudged).map(|chol| solve_cholesky_system(&chol, b))
}

/// Direct Gauss-Jordan solve with partial pivoting, the fallback when the
/// normal matrix stays indefinite after the ridge retry
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // Augmented system [A | b]
    let mut work = Array2::<f64>::zeros((n, n + 1));
    work.slice_mut(s![.., ..n]).assign(a);
    work.column_mut(n).assign(b);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r, &s| {
            work[[r, col]]
                .abs()
                .total_cmp(&work[[s, col]].abs())
        })?;
        if work[[pivot_row, col]].abs() < 1e-10 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                work.swap((col, j), (pivot_row, j));
            }
        }

        let pivot = work[[col, col]];
        work.row_mut(col).mapv_inplace(|v| v / pivot);

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            for j in 0..=n {
                work[[row, j]] -= factor * work[[col, j]];
            }
        }
    }

    Some(work.column(n).to_owned())
}

/// Solve least squares via the normal equations: (X^T X) w = X^T y.
/// Cholesky first, Gauss-Jordan as fallback.
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let gram = x.t().dot(x);
    let moment = x.t().dot(y);
    cholesky_solve(&gram, &moment).or_else(|| gauss_jordan_solve(&gram, &moment))
}

fn singular() -> SerplensError {
    SerplensError::ComputationError("normal equations are singular".to_string())
}

/// Ordinary least squares linear regression, no regularization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (one per feature)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Whether to fit an intercept term
    pub fit_intercept: bool,
    /// Whether the model is fitted
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new unfitted model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            is_fitted: false,
        }
    }

    /// Enable/disable the intercept term
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(SerplensError::EmptyDataset);
        }
        if n_samples != y.len() {
            return Err(SerplensError::ShapeError {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }

        let coefficients = if self.fit_intercept {
            // Center both sides so the solve only sees the slopes
            let x_mean = x.mean_axis(Axis(0)).unwrap();
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y.mapv(|v| v - y_mean);

            let slopes = solve_least_squares(&x_centered, &y_centered).ok_or_else(singular)?;
            self.intercept = Some(y_mean - slopes.dot(&x_mean));
            slopes
        } else {
            let slopes = solve_least_squares(x, y).ok_or_else(singular)?;
            self.intercept = Some(0.0);
            slopes
        };

        self.coefficients = Some(coefficients);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or(SerplensError::ModelNotFitted)?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }
}
