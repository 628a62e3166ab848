use crate::correlation_models::{Kernel, KernelKind};
use crate::errors::{GpError, Result};
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Noise (process) variance `sigma^2` scaling the posterior variance
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum NoiseVariance<F: Float> {
    /// Known nonnegative value
    Known(F),
    /// Estimated by maximum likelihood `y^t.K^-1.y / n`
    #[default]
    Unknown,
}

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct GpValidParams<F: Float> {
    /// Kernel family
    pub(crate) kernel: KernelKind,
    /// Kernel bandwidth
    pub(crate) theta: F,
    /// Noise variance, given or estimated
    pub(crate) noise: NoiseVariance<F>,
    /// Constant prior mean
    pub(crate) prior_mean: F,
}

impl<F: Float> Default for GpValidParams<F> {
    fn default() -> GpValidParams<F> {
        GpValidParams {
            kernel: KernelKind::default(),
            theta: F::cast(GpValidParams::<F>::DEFAULT_THETA),
            noise: NoiseVariance::Unknown,
            prior_mean: F::zero(),
        }
    }
}

impl<F: Float> GpValidParams<F> {
    /// Default kernel bandwidth
    pub const DEFAULT_THETA: f64 = 1.0;

    /// Get kernel family
    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    /// Get kernel bandwidth
    pub fn theta(&self) -> F {
        self.theta
    }

    /// Get noise variance setting
    pub fn noise(&self) -> NoiseVariance<F> {
        self.noise
    }

    /// Get constant prior mean
    pub fn prior_mean(&self) -> F {
        self.prior_mean
    }

    pub(crate) fn build_kernel(&self) -> Result<Kernel<F>> {
        Kernel::new(self.kernel, self.theta)
    }
}

#[derive(Clone, Debug, Default)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP algorithm](crate::GaussianProcess).
pub struct GpParams<F: Float>(GpValidParams<F>);

impl<F: Float> GpParams<F> {
    /// A constructor for GP parameters with default values
    pub fn new() -> GpParams<F> {
        Self(GpValidParams::default())
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GpValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set kernel family.
    pub fn kernel(mut self, kernel: KernelKind) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set kernel bandwidth, should be strictly positive.
    pub fn theta(mut self, theta: F) -> Self {
        self.0.theta = theta;
        self
    }

    /// Set noise variance.
    ///
    /// When [`NoiseVariance::Unknown`], it is estimated by maximum likelihood
    /// from the training data.
    pub fn noise_variance(mut self, noise: NoiseVariance<F>) -> Self {
        self.0.noise = noise;
        self
    }

    /// Set the constant prior mean, the GP models the responses minus this value.
    pub fn prior_mean(mut self, prior_mean: F) -> Self {
        self.0.prior_mean = prior_mean;
        self
    }
}

impl<F: Float> From<GpValidParams<F>> for GpParams<F> {
    fn from(valid: GpValidParams<F>) -> Self {
        GpParams(valid)
    }
}

impl<F: Float> ParamGuard for GpParams<F> {
    type Checked = GpValidParams<F>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.build_kernel()?;
        if let NoiseVariance::Known(s2) = self.0.noise {
            if s2 < F::zero() || !s2.is_finite() {
                return Err(GpError::InvalidValueError(format!(
                    "Noise variance should be a nonnegative finite value, got {}",
                    s2
                )));
            }
        }
        if !self.0.prior_mean.is_finite() {
            return Err(GpError::InvalidValueError(
                "Prior mean should be finite".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
