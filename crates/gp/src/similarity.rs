//! Distances between GP posterior means in the reproducing kernel Hilbert space
//! of their common kernel.
//!
//! A posterior mean deviates from its prior mean by `f(x) = sum_i alpha_i.k(x, x_i)`.
//! The difference of two such expansions stacks both sets of centers with the
//! coefficients of the subtracted GP negated, and its squared norm is
//! `c^t.K.c` over the stacked centers.

use crate::algorithm::GaussianProcess;
use crate::errors::{GpError, Result};
use crate::utils::check_dimension;

use linfa::Float;
use log::debug;
use ndarray::{concatenate, Axis};

/// RKHS norm of `target - source` posterior mean expansions.
///
/// Both GPs must share the same kernel (kind and bandwidth).
pub fn rkhs_distance<F: Float>(
    target: &GaussianProcess<F>,
    source: &GaussianProcess<F>,
) -> Result<F> {
    check_dimension(target.dim(), source.dim())?;
    if target.kernel() != source.kernel() {
        return Err(GpError::InvalidValueError(format!(
            "RKHS distance requires a common kernel, got {} and {}",
            target.kernel(),
            source.kernel()
        )));
    }
    let centers = concatenate(
        Axis(0),
        &[target.training_data().inputs(), source.training_data().inputs()],
    )?;
    let coeffs = concatenate(
        Axis(0),
        &[target.weights().view(), source.weights().mapv(|c| -c).view()],
    )?;
    let k = target.kernel().matrix(&centers);
    let norm2 = coeffs.dot(&k.dot(&coeffs));
    // cancellation may leave a tiny negative value
    Ok(norm2.max(F::zero()).sqrt())
}

/// Relative distance `|f_t - f_s| / |f_t|` of the source posterior mean to
/// the target one, zero when both expansions coincide.
pub fn similarity<F: Float>(
    target: &GaussianProcess<F>,
    source: &GaussianProcess<F>,
) -> Result<F> {
    let norm_target = target.rkhs_norm();
    if norm_target <= F::zero() {
        return Err(GpError::InvalidValueError(
            "Similarity is undefined for a target GP with a null RKHS norm".to_string(),
        ));
    }
    let distance = rkhs_distance(target, source)?;
    debug!(
        "RKHS norms: source={}, target={}, difference={}",
        source.rkhs_norm(),
        norm_target,
        distance
    );
    Ok(distance / norm_target)
}
