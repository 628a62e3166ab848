use crate::criteria::AcquisitionFunction;
use crate::errors::Result;
use ndarray::{Array1, ArrayView1};
use rand_xoshiro::Xoshiro256Plus;
use tlbo_gp::Posterior;

use serde::{Deserialize, Serialize};

/// Default exploration weight of the Upper Confidence Bound
pub const DEFAULT_UCB_GAMMA: f64 = 0.9;

/// Upper Confidence Bound `UCB(x) = mean(x) + gamma.var(x)`
///
/// The exploration parameter `gamma` weights the posterior variance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpperConfidenceBound;

impl AcquisitionFunction for UpperConfidenceBound {
    fn name(&self) -> &'static str {
        "UCB"
    }

    fn default_exploration(&self) -> f64 {
        DEFAULT_UCB_GAMMA
    }

    fn value(
        &self,
        x: &ArrayView1<f64>,
        posterior: &dyn Posterior<f64>,
        exploration: f64,
    ) -> Result<f64> {
        let (mean, var) = posterior.valvar(x)?;
        Ok(mean + exploration * var)
    }

    fn grad(
        &self,
        x: &ArrayView1<f64>,
        posterior: &dyn Posterior<f64>,
        exploration: f64,
        _rng: &mut Xoshiro256Plus,
    ) -> Result<Array1<f64>> {
        let dmean = posterior.mean_gradient(x)?;
        let dvar = posterior.variance_gradient(x)?;
        Ok(dmean + dvar * exploration)
    }
}

/// Upper Confidence Bound
pub const UCB: UpperConfidenceBound = UpperConfidenceBound;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::{Dataset, Fit};
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use tlbo_gp::GaussianProcess;

    fn gp() -> GaussianProcess<f64> {
        GaussianProcess::<f64>::params()
            .theta(0.8)
            .fit(&Dataset::new(
                array![[0.], [1.], [2.5], [4.]],
                array![0.3, -0.2, 0.8, 0.1],
            ))
            .expect("GP fit error")
    }

    #[test]
    fn test_ucb_value() {
        let gp = gp();
        let x = array![1.7];
        let (mean, var) = gp.valvar(&x.view()).unwrap();
        assert_abs_diff_eq!(UCB.value(&x.view(), &gp, 2.).unwrap(), mean + 2. * var);
        assert_abs_diff_eq!(UCB.value(&x.view(), &gp, 0.).unwrap(), mean);
        // at a training point the bound is the observation
        assert_abs_diff_eq!(
            UCB.value(&array![2.5].view(), &gp, 0.9).unwrap(),
            0.8,
            epsilon = 1e-6
        );
        assert_eq!(UCB.default_exploration(), 0.9);
    }

    #[test]
    fn test_ucb_gradients() {
        let gp = gp();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let e = 1e-5;
        for x0 in [-0.5, 0.6, 1.7, 3.3, 5.] {
            let grad = UCB.grad(&array![x0].view(), &gp, 0.9, &mut rng).unwrap();
            let fdiff = (UCB.value(&array![x0 + e].view(), &gp, 0.9).unwrap()
                - UCB.value(&array![x0 - e].view(), &gp, 0.9).unwrap())
                / (2. * e);
            assert_abs_diff_eq!(grad[0], fdiff, epsilon = 1e-6);
        }
    }
}
