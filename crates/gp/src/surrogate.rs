use crate::algorithm::GaussianProcess;
use crate::errors::Result;
use linfa::Float;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// A posterior over a scalar function of `dim()` inputs: what acquisition
/// functions and their optimizer need to know about a surrogate.
///
/// Implemented by [`GaussianProcess`] and by compositions of gaussian processes.
pub trait Posterior<F: Float>: Sync {
    /// Input dimension
    fn dim(&self) -> usize;

    /// Posterior mean at `x`
    fn mean(&self, x: &ArrayView1<F>) -> Result<F>;

    /// Posterior variance at `x`, nonnegative
    fn variance(&self, x: &ArrayView1<F>) -> Result<F>;

    /// Gradient of the posterior mean at `x`
    fn mean_gradient(&self, x: &ArrayView1<F>) -> Result<Array1<F>>;

    /// Gradient of the posterior variance at `x`
    fn variance_gradient(&self, x: &ArrayView1<F>) -> Result<Array1<F>>;

    /// Best (largest) observed response, the incumbent of the optimization
    fn best_observed(&self) -> Result<F>;

    /// Observed inputs (n, dim)
    fn training_inputs(&self) -> ArrayView2<'_, F>;

    /// Posterior mean and variance at `x`
    fn valvar(&self, x: &ArrayView1<F>) -> Result<(F, F)> {
        Ok((self.mean(x)?, self.variance(x)?))
    }
}

impl<F: Float> Posterior<F> for GaussianProcess<F> {
    fn dim(&self) -> usize {
        GaussianProcess::dim(self)
    }

    fn mean(&self, x: &ArrayView1<F>) -> Result<F> {
        self.posterior_mean(x)
    }

    fn variance(&self, x: &ArrayView1<F>) -> Result<F> {
        self.posterior_variance(x)
    }

    fn mean_gradient(&self, x: &ArrayView1<F>) -> Result<Array1<F>> {
        self.posterior_mean_gradient(x)
    }

    fn variance_gradient(&self, x: &ArrayView1<F>) -> Result<Array1<F>> {
        self.posterior_variance_gradient(x)
    }

    fn best_observed(&self) -> Result<F> {
        GaussianProcess::best_observed(self)
    }

    fn training_inputs(&self) -> ArrayView2<'_, F> {
        self.training_data().inputs()
    }
}

impl std::fmt::Debug for dyn Posterior<f64> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Posterior(dim={})", self.dim())
    }
}
