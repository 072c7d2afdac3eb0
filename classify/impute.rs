//! Column-mean imputation. Missing entries are represented as `NaN`.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ImputeError {
    #[error("Cannot fit an imputer on a matrix with no rows.")]
    NoRows,
    #[error("Feature column {0} has no observed values, so its mean is undefined.")]
    NoObservedValues(usize),
    #[error("Input has {found} feature columns, but the imputer was fitted on {expected}.")]
    MismatchedColumnCount { found: usize, expected: usize },
}

/// Replaces missing values with per-column means frozen at fit time.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    means: Array1<f64>,
}

impl MeanImputer {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self, ImputeError> {
        if x.nrows() == 0 {
            return Err(ImputeError::NoRows);
        }
        let mut means = Array1::zeros(x.ncols());
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let (sum, count) = column
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
            if count == 0 {
                return Err(ImputeError::NoObservedValues(j));
            }
            means[j] = sum / count as f64;
        }
        Ok(Self { means })
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ImputeError> {
        if x.ncols() != self.means.len() {
            return Err(ImputeError::MismatchedColumnCount {
                found: x.ncols(),
                expected: self.means.len(),
            });
        }
        let mut filled = x.to_owned();
        for (mut column, &mean) in filled.axis_iter_mut(Axis(1)).zip(self.means.iter()) {
            column.mapv_inplace(|v| if v.is_nan() { mean } else { v });
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_means_ignore_missing_entries() {
        let x = array![[1.0, 2.0], [f64::NAN, 4.0], [3.0, f64::NAN]];
        let imputer = MeanImputer::fit(x.view()).unwrap();
        assert_abs_diff_eq!(imputer.means()[0], 2.0);
        assert_abs_diff_eq!(imputer.means()[1], 3.0);
    }

    #[test]
    fn test_transform_fills_only_missing() {
        let train = array![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let imputer = MeanImputer::fit(train.view()).unwrap();

        let x = array![[f64::NAN, 1.0], [1.0, f64::NAN]];
        let filled = imputer.transform(x.view()).unwrap();
        assert_eq!(filled, array![[0.5, 1.0], [1.0, 0.5]]);
    }

    #[test]
    fn test_complete_input_passes_through_unchanged() {
        let train = array![[1.0, 0.0, 0.0], [0.0, 1.0, 1.0]];
        let imputer = MeanImputer::fit(train.view()).unwrap();
        assert_eq!(imputer.transform(train.view()).unwrap(), train);
    }

    #[test]
    fn test_errors() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert_eq!(MeanImputer::fit(empty.view()), Err(ImputeError::NoRows));

        let all_missing = array![[1.0, f64::NAN], [2.0, f64::NAN]];
        assert_eq!(
            MeanImputer::fit(all_missing.view()),
            Err(ImputeError::NoObservedValues(1))
        );

        let imputer = MeanImputer::fit(array![[1.0, 2.0]].view()).unwrap();
        assert_eq!(
            imputer.transform(array![[1.0, 2.0, 3.0]].view()),
            Err(ImputeError::MismatchedColumnCount {
                found: 3,
                expected: 2
            })
        );
    }
}
