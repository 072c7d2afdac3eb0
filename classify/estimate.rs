//! # Model Estimation
//!
//! Entry point for fitting the logistic classifier. Input checks live here,
//! then the work is handed to one of two solvers:
//!
//! - `Solver::Irls`: Newton steps through `irls::fit_irls`.
//! - `Solver::Bfgs`: quasi-Newton minimisation of the penalized negative
//!   log-likelihood with `wolfe_bfgs`.
//!
//! Both start from the zero vector and involve no randomness, so refitting the
//! same data with the same solver reproduces the coefficients exactly.

use crate::config::{ModelSettings, Solver};
use crate::impute::ImputeError;
use crate::irls::{self, IrlsStatus};
use crate::model::LogisticModel;
use ndarray::{Array1, ArrayView1, ArrayView2, Zip, s};
use thiserror::Error;
use wolfe_bfgs::{Bfgs, BfgsSolution};

/// Gradient-norm floor handed to BFGS; tighter targets stall in the line search.
const BFGS_MIN_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Insufficient training data: {found} complete rows remain, at least one is required.")]
    InsufficientTrainingData { found: usize },

    #[error(
        "The target contains only class {class}; logistic regression needs samples of both classes."
    )]
    SingleClassTarget { class: f64 },

    #[error("Feature matrix has {rows} rows but the target has {targets} labels.")]
    DimensionMismatch { rows: usize, targets: usize },

    #[error("Training features contain a missing or non-finite value at row {0}.")]
    NonFiniteFeatures(usize),

    #[error("Imputation stage failed: {0}")]
    ImputeError(#[from] ImputeError),

    #[error("A linear system solve failed. The penalized Hessian may be singular. Error: {0}")]
    LinearSystemSolveFailed(ndarray_linalg::error::LinalgError),

    #[error(
        "The IRLS loop did not converge within {max_iterations} iterations. Last penalized deviance change was {last_change:.6e}."
    )]
    DidNotConverge {
        max_iterations: usize,
        last_change: f64,
    },

    #[error("BFGS optimization failed to converge: {0}")]
    BfgsFailed(String),
}

/// Fits a binary logistic regression of `y` (0/1) on the columns of `x`.
pub fn fit_logistic(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    settings: &ModelSettings,
) -> Result<LogisticModel, EstimationError> {
    validate_training_inputs(x, y)?;

    let design = irls::design_with_intercept(x);
    let lambda = settings.ridge_lambda();
    log::info!(
        "Fitting logistic regression on {} rows and {} features with {:?} (lambda = {:.4e}).",
        x.nrows(),
        x.ncols(),
        settings.solver,
        lambda
    );

    let beta = match settings.solver {
        Solver::Irls => {
            let fit = irls::fit_irls(
                design.view(),
                y,
                lambda,
                settings.max_iterations,
                settings.tolerance,
            )?;
            log::info!(
                "IRLS converged in {} iterations, deviance {:.6} (penalized {:.6}).",
                fit.iterations,
                fit.deviance,
                fit.penalized_deviance
            );
            if fit.status == IrlsStatus::ConvergedNearSeparation {
                log::warn!("Fitted probabilities are numerically 0 or 1 for some rows.");
            }
            fit.beta
        }
        Solver::Bfgs => fit_bfgs(design.view(), y, lambda, settings)?,
    };

    let model = LogisticModel::new(beta.slice(s![1..]).to_owned(), beta[0]);
    log::info!(
        "Intercept: {:.6}, coefficients: {:?}",
        model.intercept(),
        model.coefficients().to_vec()
    );
    Ok(model)
}

fn validate_training_inputs(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<(), EstimationError> {
    if x.nrows() != y.len() {
        return Err(EstimationError::DimensionMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(EstimationError::InsufficientTrainingData { found: 0 });
    }
    if let Some(row) = x
        .rows()
        .into_iter()
        .position(|r| r.iter().any(|v| !v.is_finite()))
    {
        return Err(EstimationError::NonFiniteFeatures(row));
    }
    let first = y[0];
    if y.iter().all(|&v| v == first) {
        return Err(EstimationError::SingleClassTarget { class: first });
    }
    Ok(())
}

/// Half the penalized deviance and its gradient: `sum(softplus(eta) - y*eta) + lambda/2 * ||w||^2`.
fn penalized_nll_and_gradient(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    beta: &Array1<f64>,
    lambda: f64,
) -> (f64, Array1<f64>) {
    let eta = x.dot(beta);
    let nll = 0.5 * irls::calculate_deviance(y, &eta);
    let mut residual = eta.mapv(crate::model::sigmoid);
    Zip::from(&mut residual).and(y).for_each(|r, &yi| *r -= yi);
    let mut grad = x.t().dot(&residual);

    let slopes = beta.slice(s![1..]);
    let penalty = 0.5 * lambda * slopes.dot(&slopes);
    grad.slice_mut(s![1..]).scaled_add(lambda, &slopes);
    (nll + penalty, grad)
}

fn fit_bfgs(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambda: f64,
    settings: &ModelSettings,
) -> Result<Array1<f64>, EstimationError> {
    let initial = Array1::<f64>::zeros(x.ncols());
    let cost_and_grad =
        |beta: &Array1<f64>| -> (f64, Array1<f64>) { penalized_nll_and_gradient(x, y, beta, lambda) };

    let BfgsSolution {
        final_point,
        final_value,
        iterations,
        ..
    } = Bfgs::new(initial, cost_and_grad)
        .with_tolerance(settings.tolerance.max(BFGS_MIN_TOLERANCE))
        .with_max_iterations(settings.max_iterations)
        .run()
        .map_err(|e| EstimationError::BfgsFailed(format!("{e:?}")))?;

    log::info!(
        "BFGS optimization completed in {iterations} iterations with final value {final_value:.6}."
    );
    if !final_point.iter().all(|b| b.is_finite()) {
        return Err(EstimationError::BfgsFailed(
            "optimizer returned non-finite coefficients".to_string(),
        ));
    }
    Ok(final_point)
}
