use crate::errors::{EgoError, Result};
use libm::erfc;
use ndarray::{Array1, ArrayBase, ArrayView2, Data, Ix1, Ix2, Zip};
use ndarray_stats::DeviationExt;

const SQRT_2PI: f64 = 2.5066282746310007;

/// Cumulative distribution function of Standard Normal at x
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Probability density function of Standard Normal at x
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

/// Check if new point is not too close to previous ones `x_data`
pub fn is_update_ok(
    x_data: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    x_new: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> bool {
    x_data
        .rows()
        .into_iter()
        .all(|row| row.l1_dist(x_new).map_or(true, |d| d >= 100. * f64::EPSILON))
}

/// Check `bounds` is a (dim, 2) matrix of `[lower, upper]` rows with lower <= upper
pub fn check_bounds(bounds: &ArrayView2<f64>, dim: usize) -> Result<()> {
    if bounds.dim() != (dim, 2) {
        return Err(EgoError::InvalidConfigError(format!(
            "Bounds should be a ({}, 2) matrix, got {:?}",
            dim,
            bounds.dim()
        )));
    }
    if bounds
        .rows()
        .into_iter()
        .any(|b| b[0].is_nan() || b[1].is_nan() || b[0] > b[1])
    {
        return Err(EgoError::InvalidConfigError(format!(
            "Lower bounds should be less than upper bounds, got {}",
            bounds
        )));
    }
    Ok(())
}

/// Project `x` onto the box given as a (dim, 2) matrix of `[lower, upper]` rows
pub fn clip_to_bounds(
    x: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    bounds: &ArrayView2<f64>,
) -> Array1<f64> {
    let mut clipped = x.to_owned();
    Zip::from(&mut clipped)
        .and(bounds.rows())
        .for_each(|v, b| *v = v.max(b[0]).min(b[1]));
    clipped
}
