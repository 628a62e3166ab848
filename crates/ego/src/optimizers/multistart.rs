use crate::criteria::AcquisitionFunction;
use crate::errors::{EgoError, Result};
use crate::optimizers::{AdamParams, AdamState};
use crate::utils::{check_bounds, clip_to_bounds};
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use std::time::Duration;
use tlbo_gp::Posterior;
use web_time::Instant;

use serde::{Deserialize, Serialize};

/// How supplied bounds constrain the Adam iterates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundsHandling {
    /// Bounds are ignored, iterates may leave the box
    Unbounded,
    /// Only the final candidate is projected onto the box, before its evaluation
    #[default]
    ClipFinal,
    /// Every iterate is projected onto the box
    ClipEachStep,
}

/// Record of one Adam ascent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTrace {
    /// Start point
    pub start: Array1<f64>,
    /// Points where the acquisition gradient was queried, in order
    pub path: Vec<Array1<f64>>,
    /// Final candidate
    pub x_opt: Array1<f64>,
    /// Exact acquisition value at `x_opt`
    pub value: f64,
}

/// Multistart optimizer configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiStartConfig {
    /// Adam hyperparameters used from every start point
    pub(crate) adam: AdamParams,
    /// Optional (dim, 2) matrix of `[lower, upper]` rows
    pub(crate) bounds: Option<Array2<f64>>,
    /// How `bounds` apply to iterates
    pub(crate) bounds_handling: BoundsHandling,
    /// Acquisition exploration parameter, the criterion default when not set
    pub(crate) exploration: Option<f64>,
    /// A random generator seed used to get reproductible results.
    pub(crate) seed: Option<u64>,
    /// Wall-clock budget of a whole multistart optimization
    pub(crate) max_duration: Option<Duration>,
}

impl MultiStartConfig {
    /// Sets Adam hyperparameters
    pub fn adam(mut self, adam: AdamParams) -> Self {
        self.adam = adam;
        self
    }

    /// Sets the Adam step size
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.adam = self.adam.learning_rate(learning_rate);
        self
    }

    /// Sets the number of Adam iterations from each start point
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.adam = self.adam.n_steps(n_steps);
        self
    }

    /// Sets bounds as a (dim, 2) matrix of `[lower, upper]` rows
    pub fn bounds(mut self, bounds: &ArrayView2<f64>) -> Self {
        self.bounds = Some(bounds.to_owned());
        self
    }

    /// Sets how bounds constrain iterates
    pub fn bounds_handling(mut self, bounds_handling: BoundsHandling) -> Self {
        self.bounds_handling = bounds_handling;
        self
    }

    /// Sets the exploration parameter (`xi` for EI, `gamma` for UCB)
    pub fn exploration(mut self, exploration: f64) -> Self {
        self.exploration = Some(exploration);
        self
    }

    /// Allow to specify a seed for random number generator to allow
    /// reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets a wall-clock budget, Adam runs still going when it expires stop
    /// at the point reached
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    fn check(&self, dim: usize) -> Result<()> {
        self.adam.check()?;
        if let Some(bounds) = self.bounds.as_ref() {
            check_bounds(&bounds.view(), dim)?;
        }
        if let Some(xi) = self.exploration {
            if !xi.is_finite() {
                return Err(EgoError::InvalidConfigError(format!(
                    "Exploration parameter should be finite, got {}",
                    xi
                )));
            }
        }
        Ok(())
    }
}

/// Adam ascent of an acquisition function run from several start points in parallel.
///
/// The optimizer borrows the posterior and the criterion, nothing is mutated
/// during an optimization.
///
/// ```
/// use linfa::prelude::{Dataset, Fit};
/// use ndarray::array;
/// use tlbo_ego::criteria::EI;
/// use tlbo_ego::optimizers::MultiStartOptimizer;
/// use tlbo_gp::GaussianProcess;
///
/// let gp = GaussianProcess::<f64>::params()
///     .theta(1.)
///     .fit(&Dataset::new(array![[0.], [5.]], array![1., 0.5]))
///     .expect("GP fitted");
/// let (x_next, ei) = MultiStartOptimizer::new(&gp, &EI)
///     .configure(|config| config.bounds(&array![[0., 5.]].view()).seed(42))
///     .find_best_next_point(None)
///     .expect("next point found");
/// assert!((0. ..=5.).contains(&x_next[0]));
/// assert!(ei >= 0.);
/// ```
pub struct MultiStartOptimizer<'a> {
    posterior: &'a dyn Posterior<f64>,
    criterion: &'a dyn AcquisitionFunction,
    config: MultiStartConfig,
}

impl<'a> MultiStartOptimizer<'a> {
    /// Optimizer of `criterion` over `posterior` with default configuration
    pub fn new(posterior: &'a dyn Posterior<f64>, criterion: &'a dyn AcquisitionFunction) -> Self {
        MultiStartOptimizer {
            posterior,
            criterion,
            config: MultiStartConfig::default(),
        }
    }

    /// Sets the configuration through a builder closure
    pub fn configure<F: FnOnce(MultiStartConfig) -> MultiStartConfig>(mut self, init: F) -> Self {
        self.config = init(self.config);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &MultiStartConfig {
        &self.config
    }

    fn exploration(&self) -> f64 {
        self.config
            .exploration
            .unwrap_or_else(|| self.criterion.default_exploration())
    }

    /// Adam ascent from `start`, returns the final point and its acquisition value
    pub fn optimize(
        &self,
        start: &ArrayView1<f64>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<(Array1<f64>, f64)> {
        self.config.check(self.posterior.dim())?;
        let trace = self.ascend(start, None, rng)?;
        Ok((trace.x_opt, trace.value))
    }

    /// Ascents from every start point (rows of `start_points`, the training
    /// inputs when `None`), returned in start point order
    pub fn optimize_traces(
        &self,
        start_points: Option<&ArrayView2<f64>>,
    ) -> Result<Vec<OptimizationTrace>> {
        let dim = self.posterior.dim();
        self.config.check(dim)?;
        let starts = start_points
            .map(|s| s.to_owned())
            .unwrap_or_else(|| self.posterior.training_inputs().to_owned());
        if starts.nrows() == 0 {
            return Err(EgoError::InvalidValue("No start point given".to_string()));
        }
        if starts.ncols() != dim {
            return Err(EgoError::InvalidConfigError(format!(
                "Start points should have {} columns, got {}",
                dim,
                starts.ncols()
            )));
        }

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let seeds: Vec<u64> = (0..starts.nrows()).map(|_| rng.gen()).collect();
        let deadline = self.config.max_duration.map(|d| Instant::now() + d);

        (0..starts.nrows())
            .into_par_iter()
            .map(|i| {
                let mut sub_rng = Xoshiro256Plus::seed_from_u64(seeds[i]);
                self.ascend(&starts.row(i), deadline, &mut sub_rng)
            })
            .collect()
    }

    /// Best point found by Adam ascents from every start point (rows of
    /// `start_points`, the training inputs when `None`) with its acquisition value.
    ///
    /// Ties are broken by start point order.
    pub fn find_best_next_point(
        &self,
        start_points: Option<&ArrayView2<f64>>,
    ) -> Result<(Array1<f64>, f64)> {
        let traces = self.optimize_traces(start_points)?;
        let mut best: Option<OptimizationTrace> = None;
        for trace in traces {
            let better = match best.as_ref() {
                None => true,
                Some(b) => nan_as_lowest(trace.value) > nan_as_lowest(b.value),
            };
            if better {
                best = Some(trace);
            }
        }
        let best = best.ok_or_else(|| EgoError::InvalidValue("No start point given".to_string()))?;
        debug!(
            "Multistart {} optimum = {} at {}",
            self.criterion.name(),
            best.value,
            best.x_opt
        );
        Ok((best.x_opt, best.value))
    }

    fn ascend(
        &self,
        start: &ArrayView1<f64>,
        deadline: Option<Instant>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<OptimizationTrace> {
        let xi = self.exploration();
        let adam = &self.config.adam;
        let bounds = match self.config.bounds_handling {
            BoundsHandling::Unbounded => None,
            _ => self.config.bounds.as_ref().map(|b| b.view()),
        };

        let mut x = start.to_owned();
        let mut path = Vec::with_capacity(adam.n_steps);
        let mut state = AdamState::new(x.len());
        for step in 0..adam.n_steps {
            if deadline.map_or(false, |d| Instant::now() >= d) {
                warn!(
                    "Time budget exhausted, Adam ascent from {} stopped after {} steps",
                    start, step
                );
                break;
            }
            let grad = self.criterion.grad(&x.view(), self.posterior, xi, rng)?;
            path.push(x.clone());
            x = &x + &state.step(adam, &grad);
            if self.config.bounds_handling == BoundsHandling::ClipEachStep {
                if let Some(b) = bounds.as_ref() {
                    x = clip_to_bounds(&x, b);
                }
            }
        }
        if adam.n_steps > 0 && self.config.bounds_handling == BoundsHandling::ClipFinal {
            if let Some(b) = bounds.as_ref() {
                let clipped = clip_to_bounds(&x, b);
                if clipped != x {
                    warn!("Candidate {} clipped to {}", x, clipped);
                    x = clipped;
                }
            }
        }

        let value = self.criterion.value(&x.view(), self.posterior, xi)?;
        debug!(
            "Adam ascent from {} -> {} ({} = {})",
            start,
            x,
            self.criterion.name(),
            value
        );
        Ok(OptimizationTrace {
            start: start.to_owned(),
            path,
            x_opt: x,
            value,
        })
    }
}

fn nan_as_lowest(v: f64) -> f64 {
    if v.is_nan() {
        f64::NEG_INFINITY
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{EiGradient, ExpectedImprovement, EI, UCB};
    use approx::assert_abs_diff_eq;
    use linfa::prelude::{Dataset, Fit};
    use ndarray::{array, Array};
    use tlbo_gp::GaussianProcess;

    fn bump_gp() -> GaussianProcess<f64> {
        let xt = array![[-2.], [-1.], [0.], [1.5], [3.]];
        let yt = xt.mapv(|v: f64| (-v * v / 2.).exp()).column(0).to_owned();
        GaussianProcess::<f64>::params()
            .theta(1.)
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error")
    }

    #[test]
    fn test_ascent_improves_ei() {
        let _ = env_logger::builder().is_test(true).try_init();
        let gp = bump_gp();
        let ei = ExpectedImprovement::new(EiGradient::Analytic);
        let starts = array![[-0.3], [0.4], [0.9], [2.], [2.6]];
        let traces = MultiStartOptimizer::new(&gp, &ei)
            .configure(|c| c.learning_rate(0.05).n_steps(100).seed(0))
            .optimize_traces(Some(&starts.view()))
            .unwrap();
        assert_eq!(traces.len(), starts.nrows());
        for (trace, start) in traces.iter().zip(starts.rows()) {
            assert_eq!(trace.start, start);
            assert_eq!(trace.path.len(), 100);
            let ei_start = ei.value(&start, &gp, 0.).unwrap();
            assert!(
                trace.value >= ei_start,
                "EI decreased from {} at {} to {} at {}",
                ei_start,
                start,
                trace.value,
                trace.x_opt
            );
        }
    }

    #[test]
    fn test_mc_gradient_ascent_improves_ei() {
        let gp = bump_gp();
        let start = array![[0.7]];
        let ei_start = EI.value(&start.row(0), &gp, 0.).unwrap();
        let (x_opt, value) = MultiStartOptimizer::new(&gp, &EI)
            .configure(|c| c.learning_rate(0.05).n_steps(100).seed(42))
            .find_best_next_point(Some(&start.view()))
            .unwrap();
        assert!(value >= ei_start, "EI({}) = {} < {}", x_opt, value, ei_start);
    }

    #[test]
    fn test_no_step_returns_start() {
        let gp = bump_gp();
        let starts = array![[0.4], [2.2]];
        let traces = MultiStartOptimizer::new(&gp, &EI)
            .configure(|c| c.n_steps(0).bounds(&array![[0., 1.]].view()))
            .optimize_traces(Some(&starts.view()))
            .unwrap();
        for (trace, start) in traces.iter().zip(starts.rows()) {
            assert_eq!(trace.x_opt, start);
            assert!(trace.path.is_empty());
            assert_eq!(trace.value, EI.value(&start, &gp, 0.).unwrap());
        }
    }

    #[test]
    fn test_default_start_points_are_training_inputs() {
        let gp = bump_gp();
        let traces = MultiStartOptimizer::new(&gp, &EI)
            .configure(|c| c.n_steps(0))
            .optimize_traces(None)
            .unwrap();
        let starts: Vec<_> = traces.iter().map(|t| t.start.clone()).collect();
        let expected: Vec<_> = gp
            .training_data()
            .inputs()
            .rows()
            .into_iter()
            .map(|r| r.to_owned())
            .collect();
        assert_eq!(starts, expected);
    }

    #[test]
    fn test_ties_keep_first_start() {
        let gp = bump_gp();
        // EI vanishes at every training input
        let starts = gp.training_data().inputs().to_owned();
        let (x, value) = MultiStartOptimizer::new(&gp, &EI)
            .configure(|c| c.n_steps(0))
            .find_best_next_point(Some(&starts.view()))
            .unwrap();
        assert_eq!(value, 0.);
        assert_eq!(x, starts.row(0));
    }

    #[test]
    fn test_bounds_handling() {
        let gp = bump_gp();
        let ei = ExpectedImprovement::new(EiGradient::Analytic);
        let bounds = array![[-0.5, 0.2]];
        let starts = array![[0.1]];
        for handling in [BoundsHandling::ClipFinal, BoundsHandling::ClipEachStep] {
            let traces = MultiStartOptimizer::new(&gp, &ei)
                .configure(|c| {
                    c.learning_rate(0.3)
                        .n_steps(30)
                        .bounds(&bounds.view())
                        .bounds_handling(handling)
                })
                .optimize_traces(Some(&starts.view()))
                .unwrap();
            let x = traces[0].x_opt[0];
            assert!((-0.5..=0.2).contains(&x), "{:?}: {} out of bounds", handling, x);
            if handling == BoundsHandling::ClipEachStep {
                for p in traces[0].path.iter() {
                    assert!((-0.5..=0.2).contains(&p[0]));
                }
            }
        }
        assert!(MultiStartOptimizer::new(&gp, &ei)
            .configure(|c| c.bounds(&array![[0., 1.], [0., 1.]].view()))
            .optimize_traces(Some(&starts.view()))
            .is_err());
    }

    #[test]
    fn test_seeded_optimization_is_reproducible() {
        let gp = bump_gp();
        let starts = Array::linspace(-2., 3., 6).insert_axis(ndarray::Axis(1));
        let run = || {
            MultiStartOptimizer::new(&gp, &EI)
                .configure(|c| c.learning_rate(0.1).n_steps(20).seed(7))
                .optimize_traces(Some(&starts.view()))
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_ucb_uses_its_default_exploration() {
        let gp = bump_gp();
        let start = array![[2.2]];
        let optimizer = MultiStartOptimizer::new(&gp, &UCB).configure(|c| c.n_steps(0));
        let (_, value) = optimizer.find_best_next_point(Some(&start.view())).unwrap();
        let (mean, var) = gp.valvar(&start.row(0)).unwrap();
        assert_abs_diff_eq!(value, mean + 0.9 * var, epsilon = 1e-12);
    }

    #[test]
    fn test_time_budget() {
        let gp = bump_gp();
        let starts = array![[0.4], [2.2]];
        let traces = MultiStartOptimizer::new(&gp, &EI)
            .configure(|c| c.n_steps(1000).max_duration(Duration::ZERO).seed(0))
            .optimize_traces(Some(&starts.view()))
            .unwrap();
        for (trace, start) in traces.iter().zip(starts.rows()) {
            assert!(trace.path.is_empty());
            assert_eq!(trace.x_opt, start);
            assert!(trace.value >= 0.);
        }
    }

    #[test]
    fn test_invalid_start_points() {
        let gp = bump_gp();
        let optimizer = MultiStartOptimizer::new(&gp, &EI);
        assert!(optimizer
            .optimize_traces(Some(&Array2::<f64>::zeros((0, 1)).view()))
            .is_err());
        assert!(optimizer
            .optimize_traces(Some(&array![[0., 1.]].view()))
            .is_err());
    }
}
