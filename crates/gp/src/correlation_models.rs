//! A module for the covariance kernels of the GP model.
//!
//! The squared exponential kernel is implemented:
//!
//! `k(x, x') = exp(-|x - x'|^2 / (2 * theta^2))`
//!
//! where `theta` is the kernel bandwidth (length scale). The Matern family
//! is recognized as a kernel tag but is not available yet: selecting it
//! fails with [`GpError::NotImplementedKernel`].

use crate::errors::{GpError, Result};
use crate::utils::{check_dimension, differences, squared_distances};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Kernel family tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub enum KernelKind {
    /// `exp(-|x - x'|^2 / (2 * theta^2))`
    #[default]
    SquaredExponential,
    /// Matern kernel (not implemented)
    Matern,
}

impl From<KernelKind> for String {
    fn from(item: KernelKind) -> String {
        match item {
            KernelKind::SquaredExponential => "SquaredExponential".to_string(),
            KernelKind::Matern => "Matern".to_string(),
        }
    }
}

impl TryFrom<String> for KernelKind {
    type Error = &'static str;
    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.as_str() {
            "SquaredExponential" => Ok(KernelKind::SquaredExponential),
            "Matern" => Ok(KernelKind::Matern),
            _ => Err("Bad string value for KernelKind, should be \'SquaredExponential\' or \'Matern\'"),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from(*self))
    }
}

/// Squared exponential kernel value between `x1` and `x2`.
///
/// Symmetric, bounded in (0, 1] and equal to 1 iff `x1 == x2`.
/// *Panics* if x1 and x2 have not the same number of components
pub fn squared_exponential<F: Float>(
    x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
    x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    theta: F,
) -> F {
    assert!(x1.len() == x2.len());
    let d2 = Zip::from(x1)
        .and(x2)
        .fold(F::zero(), |acc, &a, &b| acc + (a - b) * (a - b));
    F::exp(-d2 / (F::cast(2.) * theta * theta))
}

/// Gradient of `squared_exponential(., x2, theta)` at `x`:
/// `-(x - x2) / theta^2 * k(x, x2)`
pub fn squared_exponential_gradient<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    theta: F,
) -> Array1<F> {
    let k = squared_exponential(x, x2, theta);
    let factor = -k / (theta * theta);
    (x.to_owned() - x2).mapv(|v| v * factor)
}

/// A covariance kernel: a family tag and a positive bandwidth.
///
/// A kernel can only be built for an implemented family, hence every
/// evaluation method below computes the squared exponential kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct Kernel<F: Float> {
    kind: KernelKind,
    theta: F,
}

impl<F: Float> Kernel<F> {
    /// Constructor, fails if the kernel family is not implemented or
    /// if the bandwidth is not strictly positive.
    pub fn new(kind: KernelKind, theta: F) -> Result<Self> {
        if kind == KernelKind::Matern {
            return Err(GpError::NotImplementedKernel(kind.to_string()));
        }
        if theta <= F::zero() || !theta.is_finite() {
            return Err(GpError::InvalidValueError(format!(
                "Kernel bandwidth should be a positive finite value, got {}",
                theta
            )));
        }
        Ok(Kernel { kind, theta })
    }

    /// Kernel family
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Kernel bandwidth
    pub fn theta(&self) -> F {
        self.theta
    }

    /// `k(x1, x2)`
    pub fn value(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<F> {
        check_dimension(x1.len(), x2.len())?;
        Ok(squared_exponential(x1, x2, self.theta))
    }

    /// Gradient of `k(., x2)` at `x`
    pub fn gradient(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        check_dimension(x.len(), x2.len())?;
        Ok(squared_exponential_gradient(x, x2, self.theta))
    }

    /// Gram matrix (n, n) of the `xt` points
    pub fn matrix(&self, xt: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let n = xt.nrows();
        let mut k = Array2::<F>::eye(n);
        for i in 0..n {
            for j in 0..i {
                let kij = squared_exponential(&xt.row(i), &xt.row(j), self.theta);
                k[[i, j]] = kij;
                k[[j, i]] = kij;
            }
        }
        k
    }

    /// Cross covariance matrix (n1, n2) between `x1` and `x2` points
    pub fn cross_matrix(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        check_dimension(x2.ncols(), x1.ncols())?;
        let mut k = Array2::zeros((x1.nrows(), x2.nrows()));
        Zip::from(k.rows_mut())
            .and(x1.rows())
            .for_each(|mut krow, xi| krow.assign(&self.vector_unchecked(x2, &xi)));
        Ok(k)
    }

    /// Kernel vector (n,) of `k(xt_i, x)`
    pub fn vector(
        &self,
        xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        check_dimension(xt.ncols(), x.len())?;
        Ok(self.vector_unchecked(xt, x))
    }

    /// Jacobian (n, d) of the kernel vector wrt `x`: row i is the gradient of `k(., xt_i)` at `x`
    pub fn jacobian(
        &self,
        xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array2<F>> {
        check_dimension(xt.ncols(), x.len())?;
        let k = self.vector_unchecked(xt, x);
        let mut jac = differences(x, xt);
        let inv_theta2 = F::one() / (self.theta * self.theta);
        Zip::from(jac.rows_mut())
            .and(&k)
            .for_each(|mut row, &ki| row.mapv_inplace(|v| -v * ki * inv_theta2));
        Ok(jac)
    }

    fn vector_unchecked(
        &self,
        xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let two_theta2 = F::cast(2.) * self.theta * self.theta;
        squared_distances(x, xt).mapv(|d2| F::exp(-d2 / two_theta2))
    }
}

impl<F: Float> fmt::Display for Kernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(theta={})", self.kind, self.theta)
    }
}
