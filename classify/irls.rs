//! Penalized iteratively reweighted least squares for the logit link.
//!
//! Each iteration solves `(X'WX + S) beta = X'Wz` where `S = lambda * diag(0, 1, ..., 1)`
//! leaves the intercept (column 0 of `X`) unpenalized. This is a Newton step on
//! the penalized deviance `D(beta) + lambda * ||w||^2`, guarded by step halving.

use crate::estimate::EstimationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip, s};
use ndarray_linalg::Solve;

/// The status of the IRLS convergence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrlsStatus {
    /// Penalized deviance change fell below tolerance.
    Converged,
    /// Converged, but the linear predictor grew large enough to suggest separation.
    ConvergedNearSeparation,
}

#[derive(Clone, Debug)]
pub struct IrlsResult {
    /// Coefficients in design order: intercept first.
    pub beta: Array1<f64>,
    pub deviance: f64,
    pub penalized_deviance: f64,
    pub iterations: usize,
    pub status: IrlsStatus,
}

const MIN_WEIGHT: f64 = 1e-10;
const PROB_EPS: f64 = 1e-15;
const MAX_STEP_HALVINGS: usize = 30;
const ETA_SEPARATION_THRESHOLD: f64 = 30.0;
/// Relative rounding slack when comparing penalized deviances near the optimum.
const DESCENT_SLACK: f64 = 1e-12;

/// Prepends a column of ones to `x`.
pub fn design_with_intercept(x: ArrayView2<f64>) -> Array2<f64> {
    let mut design = Array2::ones((x.nrows(), x.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(&x);
    design
}

/// Mean, working weights and working response for the current linear predictor.
pub fn update_glm_vectors(
    y: ArrayView1<f64>,
    eta: &Array1<f64>,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    let mu = eta.mapv(|e| crate::model::sigmoid(e).clamp(PROB_EPS, 1.0 - PROB_EPS));
    let weights = (&mu * (1.0 - &mu)).mapv(|v| v.max(MIN_WEIGHT));
    let z = eta + &((&y - &mu) / &weights);
    (mu, weights, z)
}

/// Binomial deviance, `-2` times the log-likelihood for 0/1 responses.
pub fn calculate_deviance(y: ArrayView1<f64>, eta: &Array1<f64>) -> f64 {
    // log(1 + e^eta) - y * eta, with the softplus evaluated stably.
    Zip::from(y).and(eta).fold(0.0, |acc, &yi, &ei| {
        let softplus = if ei > 0.0 {
            ei + (-ei).exp().ln_1p()
        } else {
            ei.exp().ln_1p()
        };
        acc + 2.0 * (softplus - yi * ei)
    })
}

fn penalty_term(beta: &Array1<f64>, lambda: f64) -> f64 {
    if lambda == 0.0 {
        return 0.0;
    }
    let slopes = beta.slice(s![1..]);
    lambda * slopes.dot(&slopes)
}

/// Fits `beta` for a design matrix whose first column is the intercept.
pub fn fit_irls(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambda: f64,
    max_iterations: usize,
    tolerance: f64,
) -> Result<IrlsResult, EstimationError> {
    let p = x.ncols();
    let mut penalty = Array2::<f64>::zeros((p, p));
    for j in 1..p {
        penalty[[j, j]] = lambda;
    }

    let mut beta = Array1::<f64>::zeros(p);
    let mut eta = x.dot(&beta);
    let mut deviance = calculate_deviance(y, &eta);
    let mut penalized_deviance = deviance + penalty_term(&beta, lambda);
    let mut last_change = f64::INFINITY;

    log::debug!(
        "IRLS start: {} rows, {} coefficients, lambda = {:.4e}, deviance = {:.6e}",
        x.nrows(),
        p,
        lambda,
        deviance
    );

    for iter in 1..=max_iterations {
        let (_, weights, z) = update_glm_vectors(y, &eta);

        // X'WX + S and X'Wz
        let xw = &x * &weights.view().insert_axis(Axis(1));
        let lhs = xw.t().dot(&x) + &penalty;
        let rhs = xw.t().dot(&z);
        let mut beta_trial = lhs
            .solve(&rhs)
            .map_err(EstimationError::LinearSystemSolveFailed)?;

        if !beta_trial.iter().all(|b| b.is_finite()) {
            log::error!("Non-finite beta values at iteration {iter}: {beta_trial:?}");
            return Err(EstimationError::DidNotConverge {
                max_iterations,
                last_change: f64::NAN,
            });
        }

        let mut eta_trial = x.dot(&beta_trial);
        let mut deviance_trial = calculate_deviance(y, &eta_trial);
        let mut penalized_trial = deviance_trial + penalty_term(&beta_trial, lambda);

        let ceiling = penalized_deviance + DESCENT_SLACK * (penalized_deviance.abs() + 0.1);
        let mut step_halving_count = 0;
        while !(penalized_trial.is_finite() && penalized_trial <= ceiling)
            && step_halving_count < MAX_STEP_HALVINGS
        {
            beta_trial = &beta + 0.5 * (&beta_trial - &beta);
            eta_trial = x.dot(&beta_trial);
            deviance_trial = calculate_deviance(y, &eta_trial);
            penalized_trial = deviance_trial + penalty_term(&beta_trial, lambda);
            step_halving_count += 1;
        }

        if !(penalized_trial.is_finite() && penalized_trial <= ceiling) {
            log::warn!("IRLS failed to find a descent step after {step_halving_count} halvings");
            return Err(EstimationError::DidNotConverge {
                max_iterations,
                last_change,
            });
        }
        if step_halving_count > 0 {
            log::debug!("Step halving successful after {step_halving_count} attempts");
        }

        last_change = penalized_deviance - penalized_trial;
        beta = beta_trial;
        eta = eta_trial;
        deviance = deviance_trial;
        penalized_deviance = penalized_trial;

        log::debug!(
            "[IRLS Iter #{iter}] penalized deviance = {:.10e}, change = {:.4e}",
            penalized_deviance,
            last_change
        );

        if last_change.abs() < tolerance * (penalized_deviance.abs() + 0.1) {
            let max_abs_eta = eta.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            let status = if max_abs_eta > ETA_SEPARATION_THRESHOLD {
                log::warn!(
                    "Linear predictor reached |eta| = {max_abs_eta:.1}; the classes may be (quasi-)separable."
                );
                IrlsStatus::ConvergedNearSeparation
            } else {
                IrlsStatus::Converged
            };
            return Ok(IrlsResult {
                beta,
                deviance,
                penalized_deviance,
                iterations: iter,
                status,
            });
        }
    }

    Err(EstimationError::DidNotConverge {
        max_iterations,
        last_change,
    })
}
