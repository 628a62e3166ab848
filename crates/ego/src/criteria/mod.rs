//! Acquisition functions scoring candidate points from a posterior
mod ei;
mod mc_gradient;
mod ucb;

pub use ei::{EiGradient, ExpectedImprovement, EI};
pub use mc_gradient::{mc_ei_gradient, DEFAULT_MC_SAMPLES};
pub use ucb::{UpperConfidenceBound, DEFAULT_UCB_GAMMA, UCB};

use crate::errors::Result;
use ndarray::{Array1, ArrayView1};
use rand_xoshiro::Xoshiro256Plus;
use tlbo_gp::Posterior;

/// A trait for acquisition functions which maximum location will
/// determine the next most promising point to evaluate.
///
/// Acquisition functions only rely on the [`Posterior`] interface, hence they
/// apply unchanged to a plain GP or to a transfer composition.
pub trait AcquisitionFunction: Sync {
    /// Name of the acquisition function
    fn name(&self) -> &'static str;

    /// Exploration parameter used when none is specified
    fn default_exploration(&self) -> f64 {
        0.0
    }

    /// Acquisition value at given point `x` with regards to given `posterior`
    /// and `exploration` parameter
    fn value(
        &self,
        x: &ArrayView1<f64>,
        posterior: &dyn Posterior<f64>,
        exploration: f64,
    ) -> Result<f64>;

    /// Derivatives wrt x components of the acquisition value,
    /// `rng` is used by stochastic estimators
    fn grad(
        &self,
        x: &ArrayView1<f64>,
        posterior: &dyn Posterior<f64>,
        exploration: f64,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Array1<f64>>;
}

impl std::fmt::Debug for dyn AcquisitionFunction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}
