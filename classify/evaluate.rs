//! Accuracy of the fitted pipeline on the leading rows of its own training data.
//!
//! The rows scored here were seen during fitting, so the figure is training
//! accuracy and says nothing about generalisation.

use crate::data::TrainingData;
use crate::pipeline::{ClassifierPipeline, PredictionError};
use ndarray::{ArrayView1, s};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum EvaluationError {
    #[error("Cannot compute accuracy over zero rows.")]
    EmptyEvaluationSet,
    #[error("{truth} true labels but {predicted} predicted labels.")]
    LengthMismatch { truth: usize, predicted: usize },
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Number of rows scored.
    pub rows: usize,
    /// Fraction of exact label matches, in [0, 1].
    pub accuracy: f64,
}

/// Fraction of positions where `y_true` and `y_pred` agree exactly.
pub fn accuracy(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64, EvaluationError> {
    if y_true.len() != y_pred.len() {
        return Err(EvaluationError::LengthMismatch {
            truth: y_true.len(),
            predicted: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(EvaluationError::EmptyEvaluationSet);
    }
    let hits = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(hits as f64 / y_true.len() as f64)
}

/// Scores the first `min(rows, n_samples)` training rows.
pub fn evaluate_head(
    pipeline: &ClassifierPipeline,
    data: &TrainingData,
    rows: usize,
) -> Result<Evaluation, EvaluationError> {
    let n = rows.min(data.n_samples());
    let x_head = data.features.slice(s![..n, ..]);
    let y_head = data.target.slice(s![..n]);
    let y_pred = pipeline.predict(x_head)?;
    let accuracy = accuracy(y_head, y_pred.view())?;
    log::info!("Training accuracy over the first {n} rows: {accuracy}");
    Ok(Evaluation { rows: n, accuracy })
}
