use crate::errors::Result;
use crate::utils::check_bounds;
use ndarray::{Array, Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix1, Ix2, Zip};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use std::cmp::Ordering;

/// Draw `n` start points uniformly within `bounds`, a (dim, 2) matrix of `[lower, upper]` rows
pub fn random_start_points<R: Rng>(
    bounds: &ArrayView2<f64>,
    n: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    check_bounds(bounds, bounds.nrows())?;
    let unit = Array::random_using((n, bounds.nrows()), Uniform::new(0., 1.), rng);
    let lower = bounds.column(0);
    let range = &bounds.column(1) - &lower;
    Ok(unit * &range + &lower)
}

/// Determine start points as midpoints between pairs of training points `x`
/// which have no other training point (nor already selected midpoint) closer to
/// them than the pair itself. Distances are scaled by the `[xl, xu]` box range.
///
/// Pairs are considered from the closest to the farthest, at most `n_max` midpoints are returned.
pub fn midpoint_start_points(
    x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    xl: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    xu: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    n_max: Option<usize>,
) -> Array2<f64> {
    let n = x.nrows();
    let range = (xu - xl).mapv(|r| if r > 0. { r } else { 1. });
    let scaled_dist = |a: &ArrayView1<f64>, b: &ArrayView1<f64>| -> f64 {
        Zip::from(a)
            .and(b)
            .and(&range)
            .fold(0., |acc, &u, &v, &r| acc + ((u - v) / r).powi(2))
            .sqrt()
    };

    let mut pairs: Vec<(usize, usize, f64)> = (1..n)
        .flat_map(|i| (0..i).map(move |j| (i, j)))
        .map(|(i, j)| (i, j, scaled_dist(&x.row(i), &x.row(j))))
        .collect();
    pairs.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));

    let max = n_max.unwrap_or(usize::MAX);
    let mut midpoints: Vec<Array1<f64>> = Vec::new();
    for (i, j, dist) in pairs {
        if midpoints.len() >= max {
            break;
        }
        let mid = (&x.row(i) + &x.row(j)) / 2.;
        let half = dist / 2.;
        let crowded = (0..n)
            .filter(|&k| k != i && k != j)
            .any(|k| scaled_dist(&x.row(k), &mid.view()) < half)
            || midpoints
                .iter()
                .any(|m| scaled_dist(&m.view(), &mid.view()) < half);
        if !crowded {
            midpoints.push(mid);
        }
    }

    Array2::from_shape_fn((midpoints.len(), x.ncols()), |(i, j)| midpoints[i][j])
}
