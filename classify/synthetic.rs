//! Synthetic-ID prediction batch and the per-ID result table.
//!
//! Every synthetic row carries the training-set feature means, so all IDs
//! receive the same prediction; the IDs only label the rows.

use crate::pipeline::{ClassifierPipeline, PredictionError, ProbabilityModel, SigmoidTransformer};
use ndarray::{Array1, Array2, ArrayView1};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write predictions: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticBatch {
    /// 1-based IDs, one per row of `features`.
    pub ids: Vec<usize>,
    pub features: Array2<f64>,
}

impl SyntheticBatch {
    /// `count` rows labelled `1..=count`, each equal to `means`.
    pub fn from_means(means: ArrayView1<f64>, count: usize) -> Self {
        let features = Array2::from_shape_fn((count, means.len()), |(_, j)| means[j]);
        Self {
            ids: (1..=count).collect(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One line of the result table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRow {
    pub person_id: usize,
    pub probability: f64,
    pub sigmoid_value: f64,
}

/// Scores the batch through the pipeline and, separately, through the
/// transformer wrapped around the pipeline's classifier.
pub fn predict_batch(
    pipeline: &ClassifierPipeline,
    batch: &SyntheticBatch,
) -> Result<Vec<PredictionRow>, PredictionError> {
    let probabilities: Array1<f64> = pipeline.predict_proba(batch.features.view())?;
    let transformer = SigmoidTransformer::new(pipeline.classifier());
    let sigmoid_values = transformer.transform(batch.features.view())?;

    Ok(batch
        .ids
        .iter()
        .zip(probabilities.iter())
        .zip(sigmoid_values.column(0).iter())
        .map(|((&person_id, &probability), &sigmoid_value)| PredictionRow {
            person_id,
            probability,
            sigmoid_value,
        })
        .collect())
}

/// Console rendering with a `Person_ID  Probability  Sigmoid_Value` header.
pub fn format_prediction_table(rows: &[PredictionRow]) -> String {
    let mut out = format!(
        "{:>9}  {:>11}  {:>13}\n",
        "Person_ID", "Probability", "Sigmoid_Value"
    );
    for row in rows {
        out.push_str(&format!(
            "{:>9}  {:>11.6}  {:>13.6}\n",
            row.person_id, row.probability, row.sigmoid_value
        ));
    }
    out
}

/// Writes the result table as TSV.
pub fn write_predictions(rows: &[PredictionRow], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    writer.write_record(["Person_ID", "Probability", "Sigmoid_Value"])?;
    for row in rows {
        writer.write_record([
            row.person_id.to_string(),
            row.probability.to_string(),
            row.sigmoid_value.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
