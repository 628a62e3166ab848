//! Transfer compositions reusing a frozen source GP to optimize a related target function.
//!
//! Both compositions fit a residual GP on `target_response - source_mean(target_input)`:
//!
//! * [ShapeTransfer] (STBO) adds the residual posterior mean to the source
//!   posterior mean, its variance is the residual variance only.
//! * [BiasCorrected] (BCBO) folds the source observations, corrected by the
//!   residual posterior mean, into the target dataset and uses a plain GP on
//!   the merged dataset.
//!
//! Both implement [`Posterior`](tlbo_gp::Posterior) so acquisition functions
//! and optimizers apply to them unchanged.
mod bcbo;
mod stbo;

pub use bcbo::*;
pub use stbo::*;

use crate::errors::{EgoError, Result};
use linfa::ParamGuard;
use log::info;
use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2};
use tlbo_gp::{GaussianProcess, GpError, GpParams, GpValidParams, NoiseVariance, TrainingData};

/// Build the frozen source GP from source observations `(x, y)` with kernel
/// bandwidth `theta`, constant prior mean and noise variance.
pub fn build_source(
    x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    y: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    theta: f64,
    prior_mean: f64,
    noise: NoiseVariance<f64>,
) -> Result<GaussianProcess<f64>> {
    let params = GpParams::new()
        .theta(theta)
        .prior_mean(prior_mean)
        .noise_variance(noise);
    let source = GaussianProcess::from_training_data(params.check()?, TrainingData::new(x, y)?)?;
    info!("Source model built: {}", source);
    Ok(source)
}

/// Residual GP fitted on `y - source_mean(x)` for every target observation `(x, y)`
pub(crate) fn fit_residual(
    source: &GaussianProcess<f64>,
    params: &GpValidParams<f64>,
    target: &TrainingData<f64>,
) -> Result<GaussianProcess<f64>> {
    let residuals = target
        .inputs()
        .rows()
        .into_iter()
        .zip(target.responses().iter())
        .map(|(x, &y)| -> Result<f64> { Ok(y - source.posterior_mean(&x)?) })
        .collect::<Result<Array1<f64>>>()?;
    let residual = GaussianProcess::from_training_data(
        params.clone(),
        TrainingData::new(&target.inputs(), &residuals)?,
    )?;
    Ok(residual)
}

/// Target observations checked against the source input dimension
pub(crate) fn target_data(
    source: &GaussianProcess<f64>,
    x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    y: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> Result<TrainingData<f64>> {
    if x.ncols() != source.dim() {
        return Err(EgoError::GpError(GpError::DimensionMismatch {
            expected: source.dim(),
            found: x.ncols(),
        }));
    }
    Ok(TrainingData::new(x, y)?)
}
