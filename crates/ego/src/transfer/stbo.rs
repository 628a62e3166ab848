use crate::errors::Result;
use crate::transfer::{fit_residual, target_data};
use linfa::ParamGuard;
use log::info;
use ndarray::{Array1, ArrayBase, ArrayView1, ArrayView2, Data, Ix1, Ix2};
use std::fmt;
use tlbo_gp::{GaussianProcess, GpError, GpParams, GpValidParams, Posterior, TrainingData};

/// Shape Transfer BO composition
///
/// `mean(x) = source.mean(x) + residual.mean(x)` and `var(x) = residual.var(x)`:
/// the source acts as a noiseless prior mean shift. The source GP is borrowed
/// and never mutated, the residual GP is owned.
#[derive(Clone)]
pub struct ShapeTransfer<'a> {
    source: &'a GaussianProcess<f64>,
    params: GpValidParams<f64>,
    target: TrainingData<f64>,
    residual: GaussianProcess<f64>,
}

impl<'a> ShapeTransfer<'a> {
    /// STBO over the `source` GP for target observations `(x, y)`,
    /// the residual GP is built with `params`.
    pub fn new(
        source: &'a GaussianProcess<f64>,
        params: GpParams<f64>,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        y: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<Self> {
        let params = params.check()?;
        let target = target_data(source, x, y)?;
        let residual = fit_residual(source, &params, &target)?;
        info!(
            "STBO built with {} target observations over {}",
            target.len(),
            source
        );
        Ok(ShapeTransfer {
            source,
            params,
            target,
            residual,
        })
    }

    /// Recompute residual observations from the current target observations
    /// and fit the residual GP on them from scratch.
    pub fn build_residual(&mut self) -> Result<()> {
        self.residual = fit_residual(self.source, &self.params, &self.target)?;
        Ok(())
    }

    /// Append one target observation and rebuild the residual GP.
    ///
    /// The composition is left unchanged on failure.
    pub fn append(&mut self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>, y: f64) -> Result<()> {
        let mut target = self.target.clone();
        target.push(x, y)?;
        self.residual = fit_residual(self.source, &self.params, &target)?;
        self.target = target;
        Ok(())
    }

    /// Frozen source GP
    pub fn source(&self) -> &GaussianProcess<f64> {
        self.source
    }

    /// Residual GP
    pub fn residual(&self) -> &GaussianProcess<f64> {
        &self.residual
    }

    /// Target observations
    pub fn target(&self) -> &TrainingData<f64> {
        &self.target
    }
}

impl fmt::Display for ShapeTransfer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "STBO(source={}, residual={})", self.source, self.residual)
    }
}

impl Posterior<f64> for ShapeTransfer<'_> {
    fn dim(&self) -> usize {
        self.target.dim()
    }

    fn mean(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<f64> {
        Ok(self.source.posterior_mean(x)? + self.residual.posterior_mean(x)?)
    }

    fn variance(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<f64> {
        self.residual.posterior_variance(x)
    }

    fn mean_gradient(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<Array1<f64>> {
        Ok(self.source.posterior_mean_gradient(x)? + self.residual.posterior_mean_gradient(x)?)
    }

    fn variance_gradient(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<Array1<f64>> {
        self.residual.posterior_variance_gradient(x)
    }

    fn best_observed(&self) -> tlbo_gp::Result<f64> {
        self.target
            .best()
            .map(|(_, y)| y)
            .ok_or(GpError::EmptyDataset)
    }

    fn training_inputs(&self) -> ArrayView2<'_, f64> {
        self.target.inputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{AcquisitionFunction, EI};
    use crate::optimizers::MultiStartOptimizer;
    use crate::transfer::build_source;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use tlbo_gp::NoiseVariance;

    fn source() -> GaussianProcess<f64> {
        let xs = Array::linspace(0., 10., 11).insert_axis(ndarray::Axis(1));
        let ys = xs.column(0).mapv(|v: f64| (-(v - 4.) * (v - 4.) / 8.).exp());
        build_source(&xs, &ys, 1., 0., NoiseVariance::Unknown).unwrap()
    }

    #[test]
    fn test_identity_when_target_matches_source_mean() {
        let source = source();
        let xt = array![[1.3], [4.6], [7.2]];
        let yt: Array1<f64> = xt
            .rows()
            .into_iter()
            .map(|x| source.posterior_mean(&x).unwrap())
            .collect();
        let stbo = ShapeTransfer::new(&source, GpParams::new().theta(1.), &xt, &yt).unwrap();
        for x in Array::linspace(-2., 12., 50).iter() {
            let x = array![*x];
            assert_abs_diff_eq!(
                stbo.mean(&x.view()).unwrap(),
                source.posterior_mean(&x).unwrap(),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_composition() {
        let source = source();
        let xt = array![[1.], [3.5], [8.]];
        let yt = array![0.5, 1.2, -0.3];
        let stbo = ShapeTransfer::new(&source, GpParams::new().theta(1.), &xt, &yt).unwrap();
        // interpolation of the target observations
        for (x, y) in xt.rows().into_iter().zip(yt.iter()) {
            assert_abs_diff_eq!(stbo.mean(&x).unwrap(), *y, epsilon = 1e-8);
            assert_abs_diff_eq!(stbo.variance(&x).unwrap(), 0.);
        }
        let x = array![5.3];
        assert_eq!(
            stbo.variance(&x.view()).unwrap(),
            stbo.residual().posterior_variance(&x).unwrap()
        );
        assert_abs_diff_eq!(
            stbo.mean_gradient(&x.view()).unwrap(),
            source.posterior_mean_gradient(&x).unwrap()
                + stbo.residual().posterior_mean_gradient(&x).unwrap(),
            epsilon = 1e-12
        );
        assert_eq!(stbo.best_observed().unwrap(), 1.2);
        assert_eq!(stbo.training_inputs(), xt);
    }

    #[test]
    fn test_build_residual_is_idempotent() {
        let source = source();
        let xt = array![[2.], [6.]];
        let yt = array![0.1, 0.9];
        let mut stbo = ShapeTransfer::new(&source, GpParams::new().theta(1.), &xt, &yt).unwrap();
        let x = array![4.4];
        let before = stbo.valvar(&x.view()).unwrap();
        stbo.build_residual().unwrap();
        stbo.build_residual().unwrap();
        assert_eq!(stbo.valvar(&x.view()).unwrap(), before);
        assert_eq!(stbo.residual().n_obs(), 2);
    }

    #[test]
    fn test_append_and_optimize() {
        let _ = env_logger::builder().is_test(true).try_init();
        let source = source();
        let mut stbo = ShapeTransfer::new(
            &source,
            GpParams::new().theta(1.),
            &array![[2.], [6.]],
            &array![0.3, 0.6],
        )
        .unwrap();
        stbo.append(&array![4.], 1.1).unwrap();
        assert_eq!(stbo.target().len(), 3);
        assert_abs_diff_eq!(stbo.mean(&array![4.].view()).unwrap(), 1.1, epsilon = 1e-8);
        assert!(stbo.append(&array![4., 1.], 1.).is_err());
        assert_eq!(stbo.target().len(), 3);

        let (x, ei) = MultiStartOptimizer::new(&stbo, &EI)
            .configure(|c| c.bounds(&array![[0., 10.]].view()).seed(42))
            .find_best_next_point(None)
            .unwrap();
        assert!((0. ..=10.).contains(&x[0]));
        assert_abs_diff_eq!(ei, EI.value(&x.view(), &stbo, 0.).unwrap());
    }

    #[test]
    fn test_dimension_mismatch() {
        let source = source();
        assert!(ShapeTransfer::new(
            &source,
            GpParams::new(),
            &array![[1., 2.]],
            &array![0.]
        )
        .is_err());
    }
}
