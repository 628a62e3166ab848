use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};

/// Fails with [`GpError::DimensionMismatch`] when `found != expected`
pub(crate) fn check_dimension(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(GpError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Computes differences between x and each element of y
/// resulting in a 2d array of shape (nrows(y), ncols(x));
/// *Panics* if x and y have not the same number of components
pub fn differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.len() == y.ncols());
    x.to_owned() - y
}

/// Squared euclidean distance between x and each element of y, shape (nrows(y),)
/// *Panics* if x and y have not the same number of components
pub fn squared_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array1<F> {
    let d = differences(x, y);
    let mut dist = Array1::zeros(y.nrows());
    Zip::from(&mut dist)
        .and(d.rows())
        .for_each(|di, row| *di = row.fold(F::zero(), |acc, &v| acc + v * v));
    dist
}
