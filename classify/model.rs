use ndarray::{Array1, ArrayView2};
use thiserror::Error;

/// The logistic function `1 / (1 + e^-x)`, evaluated without overflow for large `|x|`.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Prediction data has {found} feature columns, but the model was trained on {expected}.")]
    MismatchedFeatureCount { found: usize, expected: usize },
    #[error("Prediction row {0} contains a missing or non-finite value.")]
    NonFiniteInput(usize),
}

/// A fitted binary logistic regression: `P(y = 1 | x) = sigmoid(w·x + b)`.
///
/// Only the estimator in `estimate` constructs this type, and nothing mutates
/// it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub(crate) fn new(coefficients: Array1<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// The linear score `w·x + b` for every row.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::MismatchedFeatureCount {
                found: x.ncols(),
                expected: self.n_features(),
            });
        }
        if let Some(row) = x
            .rows()
            .into_iter()
            .position(|r| r.iter().any(|v| !v.is_finite()))
        {
            return Err(ModelError::NonFiniteInput(row));
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Positive-class probability for every row, each in [0, 1].
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// 1.0 where the linear score is positive (probability above 0.5), else 0.0.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self
            .decision_function(x)?
            .mapv(|score| if score > 0.0 { 1.0 } else { 0.0 }))
    }
}
