use crate::correlation_models::Kernel;
use crate::dataset::TrainingData;
use crate::errors::{GpError, Result};
use crate::parameters::{GpParams, GpValidParams, NoiseVariance};
use crate::utils::check_dimension;

use linfa::prelude::{DatasetBase, Fit, Float};
use linfa::ParamGuard;
use linfa_linalg::{cholesky::*, eigh::*, triangular::*};
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use statrs::distribution::{ContinuousCDF, Normal};

use log::debug;
use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

/// Posterior variances below this value are considered as zero
pub const VARIANCE_ZERO_THRESHOLD: f64 = 1e-13;
/// Smallest admissible pivot of the Cholesky factor of the Gram matrix
pub const MIN_CHOLESKY_PIVOT: f64 = 1e-7;
/// Default confidence level of [`GaussianProcess::confidence_interval`]
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Internal parameters computed from the training data
/// used later on in posterior computations
#[derive(Debug)]
pub(crate) struct GpInnerParams<F: Float> {
    /// Cholesky decomposition of the Gram matrix \[K\] (lower)
    r_chol: Array2<F>,
    /// Gaussian Process weights K^-1.(y - m)
    alpha: Array1<F>,
}

impl<F: Float> Clone for GpInnerParams<F> {
    fn clone(&self) -> Self {
        Self {
            r_chol: self.r_chol.to_owned(),
            alpha: self.alpha.to_owned(),
        }
    }
}

impl<F: Float> GpInnerParams<F> {
    /// Solve K.Z = B using the Cholesky factor
    fn solve(&self, rhs: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        let rho = self.r_chol.solve_triangular(rhs, UPLO::Lower)?;
        Ok(self.r_chol.t().solve_triangular(&rho, UPLO::Upper)?)
    }

    /// Solve L.z = b using the Cholesky factor
    fn solve_lower(&self, rhs: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Array1<F>> {
        let rhs = rhs.to_owned().insert_axis(Axis(1));
        let rho = self.r_chol.solve_triangular(&rhs, UPLO::Lower)?;
        Ok(rho.remove_axis(Axis(1)))
    }
}

/// A zero-mean Gaussian process (up to a constant prior mean `m`)
/// with a squared exponential covariance kernel.
///
/// Given observations `(X, y)`, the posterior at `x` is defined by:
///
/// * `mean(x) = m + k(x)^t.K^-1.(y - m)`
/// * `var(x) = sigma^2 * (k(x, x) - k(x)^t.K^-1.k(x))`
///
/// where `K` is the Gram matrix of the training inputs, `k(x)` the kernel
/// vector between `x` and the training inputs, and `sigma^2` the noise variance
/// either given or estimated by maximum likelihood `(y - m)^t.K^-1.(y - m) / n`.
///
/// The posterior interpolates the training data: at a training input the
/// variance is zero and the mean is the training response.
///
/// # Implementation
///
/// * `K` is never inverted: its Cholesky factor is computed once per training data
///   update and every `K^-1.v` product is obtained with two triangular solves.
/// * Variances below [`VARIANCE_ZERO_THRESHOLD`] are clamped to zero.
/// * The training data can only grow (see [`GaussianProcess::append`]).
///
/// # Example
///
/// ```
/// use tlbo_gp::GaussianProcess;
/// use linfa::prelude::*;
/// use ndarray::array;
///
/// let xt = array![[0.], [5.]];
/// let yt = array![1., 0.5];
/// let gp = GaussianProcess::<f64>::params()
///     .theta(1.0)
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fit error");
///
/// let mean = gp.posterior_mean(&array![0.]).expect("posterior mean");
/// assert!((mean - 1.0).abs() < 1e-10);
/// let var = gp.posterior_variance(&array![2.5]).expect("posterior variance");
/// assert!(var > 0.);
/// ```
pub struct GaussianProcess<F: Float> {
    /// Parameters used to build this model
    params: GpValidParams<F>,
    /// Covariance kernel
    kernel: Kernel<F>,
    /// Training dataset (input, output)
    data: TrainingData<F>,
    /// None while no observation is recorded
    inner_params: Option<GpInnerParams<F>>,
    /// Lazily estimated noise variance when unknown
    sigma2_mle: OnceLock<F>,
}

impl<F: Float> Clone for GaussianProcess<F> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            kernel: self.kernel,
            data: self.data.clone(),
            inner_params: self.inner_params.clone(),
            sigma2_mle: self.sigma2_mle.clone(),
        }
    }
}

impl<F: Float> fmt::Display for GaussianProcess<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let noise = match self.params.noise {
            NoiseVariance::Known(s2) => format!("{}", s2),
            NoiseVariance::Unknown => match self.sigma2_mle.get() {
                Some(s2) => format!("{} (mle)", s2),
                None => "mle".to_string(),
            },
        };
        write!(
            f,
            "GP(kernel={}, prior_mean={}, noise_variance={}, n_obs={})",
            self.kernel,
            self.params.prior_mean,
            noise,
            self.data.len()
        )
    }
}

impl<F: Float> fmt::Debug for GaussianProcess<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<F: Float> GaussianProcess<F> {
    /// Gp parameters contructor
    pub fn params() -> GpParams<F> {
        GpParams::new()
    }

    /// A GP without observation on inputs of dimension `dim`
    pub fn empty(params: GpParams<F>, dim: usize) -> Result<Self> {
        Self::from_training_data(params.check()?, TrainingData::empty(dim)?)
    }

    /// A GP conditioned on the given training data
    pub fn from_training_data(params: GpValidParams<F>, data: TrainingData<F>) -> Result<Self> {
        let kernel = params.build_kernel()?;
        let inner_params = factorize(&kernel, &data, params.prior_mean)?;
        Ok(GaussianProcess {
            params,
            kernel,
            data,
            inner_params,
            sigma2_mle: OnceLock::new(),
        })
    }

    /// Parameters used to build the model
    pub fn parameters(&self) -> &GpValidParams<F> {
        &self.params
    }

    /// Covariance kernel
    pub fn kernel(&self) -> &Kernel<F> {
        &self.kernel
    }

    /// Kernel bandwidth
    pub fn theta(&self) -> F {
        self.kernel.theta()
    }

    /// Training data
    pub fn training_data(&self) -> &TrainingData<F> {
        &self.data
    }

    /// Input dimension
    pub fn dim(&self) -> usize {
        self.data.dim()
    }

    /// Number of observations
    pub fn n_obs(&self) -> usize {
        self.data.len()
    }

    /// Largest observed response
    pub fn best_observed(&self) -> Result<F> {
        self.data.best().map(|(_, y)| y).ok_or(GpError::EmptyDataset)
    }

    /// Append one observation `(x, y)`.
    ///
    /// The model is left unchanged on failure (dimension mismatch or singular
    /// Gram matrix); on success the estimated noise variance is discarded.
    pub fn append(&mut self, x: &ArrayBase<impl Data<Elem = F>, Ix1>, y: F) -> Result<()> {
        let mut data = self.data.clone();
        data.push(x, y)?;
        let inner_params = factorize(&self.kernel, &data, self.params.prior_mean)?;
        self.data = data;
        self.inner_params = inner_params;
        self.sigma2_mle = OnceLock::new();
        Ok(())
    }

    /// Reassign the kernel bandwidth, the model is conditioned again on the training data.
    pub fn set_theta(&mut self, theta: F) -> Result<()> {
        let kernel = Kernel::new(self.kernel.kind(), theta)?;
        let inner_params = factorize(&kernel, &self.data, self.params.prior_mean)?;
        self.params.theta = theta;
        self.kernel = kernel;
        self.inner_params = inner_params;
        self.sigma2_mle = OnceLock::new();
        Ok(())
    }

    fn inner(&self) -> Result<&GpInnerParams<F>> {
        self.inner_params.as_ref().ok_or(GpError::EmptyDataset)
    }

    fn check_point(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<&GpInnerParams<F>> {
        let inner = self.inner()?;
        check_dimension(self.dim(), x.len())?;
        Ok(inner)
    }

    /// Maximum likelihood estimation of the noise variance `(y - m)^t.K^-1.(y - m) / n`.
    ///
    /// Computed once and cached until the training data changes.
    pub fn mle_noise_variance(&self) -> Result<F> {
        let inner = self.inner()?;
        Ok(*self.sigma2_mle.get_or_init(|| {
            let yc = self.data.responses().mapv(|v| v - self.params.prior_mean);
            let sigma2 = yc.dot(&inner.alpha) / F::cast(self.data.len());
            debug!("GP noise variance MLE = {}", sigma2);
            sigma2
        }))
    }

    /// Noise variance `sigma^2` used to scale the posterior variance
    pub fn noise_variance(&self) -> Result<F> {
        match self.params.noise {
            NoiseVariance::Known(s2) => Ok(s2),
            NoiseVariance::Unknown => self.mle_noise_variance(),
        }
    }

    /// Posterior mean at `x`
    pub fn posterior_mean(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        let inner = self.check_point(x)?;
        let k = self.kernel.vector(&self.data.inputs(), x)?;
        Ok(self.params.prior_mean + k.dot(&inner.alpha))
    }

    /// Posterior variance at `x`, clamped to zero below [`VARIANCE_ZERO_THRESHOLD`]
    pub fn posterior_variance(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<F> {
        let inner = self.check_point(x)?;
        let k = self.kernel.vector(&self.data.inputs(), x)?;
        let rho = inner.solve_lower(&k)?;
        // k(x, x) = 1
        let s2 = F::one() - rho.dot(&rho);
        let var = self.noise_variance()? * s2;
        if var < F::cast(VARIANCE_ZERO_THRESHOLD) {
            Ok(F::zero())
        } else {
            Ok(var)
        }
    }

    /// Gradient of the posterior mean at `x`: `J(x)^t.K^-1.(y - m)`
    /// where `J(x)` is the (n, d) jacobian of the kernel vector
    pub fn posterior_mean_gradient(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        let inner = self.check_point(x)?;
        let jac = self.kernel.jacobian(&self.data.inputs(), x)?;
        Ok(jac.t().dot(&inner.alpha))
    }

    /// Gradient of the posterior variance at `x`: `-2 * sigma^2 * J(x)^t.K^-1.k(x)`
    pub fn posterior_variance_gradient(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        let inner = self.check_point(x)?;
        let xt = self.data.inputs();
        let (k, jac) = (self.kernel.vector(&xt, x)?, self.kernel.jacobian(&xt, x)?);
        let inv_kk = inner.solve(&k.insert_axis(Axis(1)))?.remove_axis(Axis(1));
        let factor = F::cast(-2.) * self.noise_variance()?;
        Ok(jac.t().dot(&inv_kk).mapv(|v| v * factor))
    }

    /// Weights `K^-1.(y - m)` of the posterior mean expansion
    /// `mean(x) = m + sum_i alpha_i.k(x, x_i)` over the training inputs.
    ///
    /// Empty without observation.
    pub fn weights(&self) -> Array1<F> {
        self.inner_params
            .as_ref()
            .map_or_else(|| Array1::zeros(0), |inner| inner.alpha.to_owned())
    }

    /// RKHS norm `sqrt(alpha^t.K.alpha)` of the posterior mean deviation from the prior mean.
    ///
    /// `alpha^t.K.alpha` is computed as `|L^t.alpha|^2` with `L` the Cholesky factor of `K`.
    /// Zero without observation.
    pub fn rkhs_norm(&self) -> F {
        self.inner_params.as_ref().map_or(F::zero(), |inner| {
            let v = inner.r_chol.t().dot(&inner.alpha);
            v.dot(&v).sqrt()
        })
    }

    /// Posterior means and variances at n given `x` points of nx components specified as a (n, nx) matrix.
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        let mut means = Array1::zeros(x.nrows());
        let mut vars = Array1::zeros(x.nrows());
        for (i, xi) in x.rows().into_iter().enumerate() {
            means[i] = self.posterior_mean(&xi)?;
            vars[i] = self.posterior_variance(&xi)?;
        }
        Ok((means, vars))
    }

    /// Two-sided confidence interval `mean(x) -/+ z * sqrt(var(x))` at the given
    /// `confidence` level in (0, 1) where `z` is the `1 - (1 - confidence) / 2`
    /// quantile of the standard normal distribution.
    pub fn confidence_interval(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        confidence: F,
    ) -> Result<(F, F)> {
        let level = confidence
            .to_f64()
            .filter(|c| *c > 0. && *c < 1.)
            .ok_or_else(|| {
                GpError::InvalidValueError(format!(
                    "Confidence level should be in (0, 1), got {}",
                    confidence
                ))
            })?;
        let normal =
            Normal::new(0., 1.).map_err(|err| GpError::InvalidValueError(err.to_string()))?;
        let z = F::cast(normal.inverse_cdf(1. - (1. - level) / 2.));
        let mean = self.posterior_mean(x)?;
        let std = self.posterior_variance(x)?.sqrt();
        Ok((mean - z * std, mean + z * std))
    }

    /// Posterior covariance matrix (m, m) at the given (m, nx) `x` points.
    ///
    /// Without observation, this is the prior covariance which requires a known noise variance.
    pub fn posterior_covariance(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        check_dimension(self.dim(), x.ncols())?;
        let kxx = self.kernel.matrix(x);
        let cov = match self.inner_params.as_ref() {
            Some(inner) => {
                let kxt = self.kernel.cross_matrix(&self.data.inputs(), x)?;
                let rho = inner.r_chol.solve_triangular(&kxt, UPLO::Lower)?;
                kxx - rho.t().dot(&rho)
            }
            None => kxx,
        };
        let sigma2 = match self.params.noise {
            NoiseVariance::Known(s2) => s2,
            NoiseVariance::Unknown => self.mle_noise_variance()?,
        };
        Ok(cov.mapv(|v| v * sigma2))
    }

    /// Sample `n_traj` trajectories of the gaussian process at the given (m, nx) `x` points.
    /// Returns a (m, n_traj) matrix, one trajectory per column.
    ///
    /// The posterior covariance is decomposed with eigenvalues, which are
    /// floored to zero below 1e-9 to handle ill-conditioned covariances.
    pub fn sample<R: Rng>(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_traj: usize,
        rng: &mut R,
    ) -> Result<Array2<F>> {
        let cov = self.posterior_covariance(x)?;
        let mean = if self.inner_params.is_some() {
            self.predict_valvar(x)?.0
        } else {
            Array1::from_elem(x.nrows(), self.params.prior_mean)
        };
        let (v, w) = cov.eigh_into()?;
        let v = v.mapv(|e| {
            // We lower bound the float value at 1e-9
            if e < F::cast(1e-9) {
                return F::zero();
            }
            e.sqrt()
        });
        let c = w.dot(&Array2::from_diag(&v));
        let ary = Array::random_using((x.nrows(), n_traj), StandardNormal, rng).mapv(F::cast::<f64>);
        Ok(mean.insert_axis(Axis(1)) + c.dot(&ary))
    }
}

/// Factorize the Gram matrix of the training inputs and compute GP weights.
/// Returns None when no observation is recorded.
fn factorize<F: Float>(
    kernel: &Kernel<F>,
    data: &TrainingData<F>,
    prior_mean: F,
) -> Result<Option<GpInnerParams<F>>> {
    if data.is_empty() {
        return Ok(None);
    }
    let now = Instant::now();
    let k = kernel.matrix(&data.inputs());
    let r_chol = k.cholesky().map_err(|err| {
        GpError::SingularCovariance(format!(
            "Cholesky decomposition of the {}x{} Gram matrix failed ({}), \
             deduplicate or jitter training inputs",
            data.len(),
            data.len(),
            err
        ))
    })?;
    let min_pivot = r_chol.diag().fold(F::infinity(), |acc, &v| acc.min(v));
    if min_pivot.is_nan() || min_pivot < F::cast(MIN_CHOLESKY_PIVOT) {
        return Err(GpError::SingularCovariance(format!(
            "Gram matrix pivot {} is too small, deduplicate or jitter training inputs",
            min_pivot
        )));
    }
    let inner = GpInnerParams {
        r_chol,
        alpha: Array1::zeros(data.len()),
    };
    let yc = data
        .responses()
        .mapv(|v| v - prior_mean)
        .insert_axis(Axis(1));
    let alpha = inner.solve(&yc)?.remove_axis(Axis(1));
    debug!(
        "GP factorization of {} observations elapsed time: {:?}",
        data.len(),
        now.elapsed()
    );
    Ok(Some(GpInnerParams { alpha, ..inner }))
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError>
    for GpValidParams<F>
{
    type Object = GaussianProcess<F>;

    /// Condition the GP on the dataset, an empty dataset gives a GP without observation
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let data = TrainingData::new(dataset.records(), dataset.targets())?;
        GaussianProcess::from_training_data(self.clone(), data)
    }
}
