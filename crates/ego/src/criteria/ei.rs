use crate::criteria::{mc_ei_gradient, AcquisitionFunction, DEFAULT_MC_SAMPLES};
use crate::errors::Result;
use crate::utils::{norm_cdf, norm_pdf};
use ndarray::{Array1, ArrayView1};
use rand_xoshiro::Xoshiro256Plus;
use tlbo_gp::{Posterior, VARIANCE_ZERO_THRESHOLD};

use serde::{Deserialize, Serialize};

/// Method used to compute the gradient of the Expected Improvement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EiGradient {
    /// Reparameterization Monte Carlo estimation with `n_samples` standard normal draws
    MonteCarlo {
        /// Number of draws
        n_samples: usize,
    },
    /// Closed form `Phi(Z).grad_mean + phi(Z).grad_var / (2.sigma)`
    Analytic,
}

impl Default for EiGradient {
    fn default() -> Self {
        EiGradient::MonteCarlo {
            n_samples: DEFAULT_MC_SAMPLES,
        }
    }
}

/// A structure for Expected Improvement implementation
///
/// `EI(x) = (mean(x) - y_max + xi).Phi(Z) + sigma(x).phi(Z)`
/// with `Z = (mean(x) - y_max + xi) / sigma(x)` where `y_max` is the best observed response
/// and `xi` the exploration parameter. EI is zero where the posterior variance vanishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedImprovement {
    /// Gradient computation method
    pub gradient: EiGradient,
}

impl ExpectedImprovement {
    /// EI with the given gradient computation method
    pub fn new(gradient: EiGradient) -> Self {
        ExpectedImprovement { gradient }
    }
}

impl AcquisitionFunction for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "EI"
    }

    /// Compute EI at given `x` point using the `posterior` and the best observed response.
    fn value(
        &self,
        x: &ArrayView1<f64>,
        posterior: &dyn Posterior<f64>,
        exploration: f64,
    ) -> Result<f64> {
        let (mean, var) = posterior.valvar(x)?;
        if var <= VARIANCE_ZERO_THRESHOLD {
            return Ok(0.0);
        }
        let sigma = var.sqrt();
        let improvement = mean - posterior.best_observed()? + exploration;
        let z = improvement / sigma;
        Ok((improvement * norm_cdf(z) + sigma * norm_pdf(z)).max(0.0))
    }

    /// Computes derivatives of EI wrt to x components at given `x` point.
    fn grad(
        &self,
        x: &ArrayView1<f64>,
        posterior: &dyn Posterior<f64>,
        exploration: f64,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Array1<f64>> {
        match self.gradient {
            EiGradient::MonteCarlo { n_samples } => {
                mc_ei_gradient(x, posterior, exploration, n_samples, rng)
            }
            EiGradient::Analytic => {
                let var = posterior.variance(x)?;
                if var <= VARIANCE_ZERO_THRESHOLD {
                    return Ok(Array1::zeros(x.len()));
                }
                let sigma = var.sqrt();
                let z = (posterior.mean(x)? - posterior.best_observed()? + exploration) / sigma;
                let dmean = posterior.mean_gradient(x)?;
                let dvar = posterior.variance_gradient(x)?;
                Ok(dmean * norm_cdf(z) + dvar * (norm_pdf(z) / (2. * sigma)))
            }
        }
    }
}

/// Expected Improvement with Monte Carlo gradient estimation
pub const EI: ExpectedImprovement = ExpectedImprovement {
    gradient: EiGradient::MonteCarlo {
        n_samples: DEFAULT_MC_SAMPLES,
    },
};
