//! # Prediction Pipeline
//!
//! A fitted mean-imputation stage followed by a fitted logistic classifier,
//! applied uniformly to new rows. The pipeline is built by `fit` and has no
//! mutating methods, so fitting happens exactly once per value.
//!
//! `SigmoidTransformer` exposes any probability model as a single-column
//! transform. It performs no computation of its own: the column it returns is
//! the wrapped model's positive-class probability, bit for bit.

use crate::config::ModelSettings;
use crate::estimate::{EstimationError, fit_logistic};
use crate::impute::{ImputeError, MeanImputer};
use crate::model::{LogisticModel, ModelError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PredictionError {
    #[error(transparent)]
    Impute(#[from] ImputeError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Anything that maps feature rows to positive-class probabilities.
pub trait ProbabilityModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PredictionError>;
}

impl ProbabilityModel for LogisticModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PredictionError> {
        Ok(LogisticModel::predict_proba(self, x)?)
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierPipeline {
    imputer: MeanImputer,
    classifier: LogisticModel,
}

impl ClassifierPipeline {
    /// Fits the imputer on `x`, then the classifier on the imputed `x` and `y`.
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        settings: &ModelSettings,
    ) -> Result<Self, EstimationError> {
        if x.nrows() == 0 {
            return Err(EstimationError::InsufficientTrainingData { found: 0 });
        }
        let imputer = MeanImputer::fit(x)?;
        let imputed = imputer.transform(x)?;
        let classifier = fit_logistic(imputed.view(), y, settings)?;
        Ok(Self {
            imputer,
            classifier,
        })
    }

    pub fn imputer(&self) -> &MeanImputer {
        &self.imputer
    }

    pub fn classifier(&self) -> &LogisticModel {
        &self.classifier
    }

    /// Thresholded labels (0.0 / 1.0) after imputation.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PredictionError> {
        let imputed = self.imputer.transform(x)?;
        Ok(self.classifier.predict(imputed.view())?)
    }
}

impl ProbabilityModel for ClassifierPipeline {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, PredictionError> {
        let imputed = self.imputer.transform(x)?;
        Ok(self.classifier.predict_proba(imputed.view())?)
    }
}

/// Presents a fitted probability model as a one-column transform.
pub struct SigmoidTransformer<'a, M: ProbabilityModel + ?Sized> {
    model: &'a M,
}

impl<'a, M: ProbabilityModel + ?Sized> SigmoidTransformer<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Nothing to learn; the wrapped model is already fitted.
    pub fn fit(self, _x: ArrayView2<f64>) -> Self {
        self
    }

    /// Shape `[n, 1]`: the wrapped model's positive-class probability per row.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, PredictionError> {
        Ok(self.model.predict_proba(x)?.insert_axis(Axis(1)))
    }
}
