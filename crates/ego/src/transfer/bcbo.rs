use crate::errors::Result;
use crate::transfer::{fit_residual, target_data};
use crate::utils::is_update_ok;
use linfa::ParamGuard;
use log::{debug, info};
use ndarray::{Array1, ArrayBase, ArrayView1, ArrayView2, Data, Ix1, Ix2};
use std::fmt;
use tlbo_gp::{GaussianProcess, GpError, GpParams, GpValidParams, Posterior, TrainingData};

/// Bias Corrected BO composition
///
/// The residual GP is fitted on the target observations, then every source
/// observation `(x_s, y_s)` whose input is not already observed is merged into
/// the target dataset as `(x_s, y_s + residual.mean(x_s))`. The posterior is a
/// plain GP on the merged dataset.
///
/// A source observation too close to a merged input (the merged Gram matrix
/// would be singular) is left out of the merge.
///
/// The merge is a one-shot copy, the source GP is only read.
#[derive(Clone)]
pub struct BiasCorrected<'a> {
    source: &'a GaussianProcess<f64>,
    params: GpValidParams<f64>,
    observations: TrainingData<f64>,
    residual: GaussianProcess<f64>,
    merged: GaussianProcess<f64>,
}

impl<'a> BiasCorrected<'a> {
    /// BCBO over the `source` GP for target observations `(x, y)`,
    /// residual and merged GPs are built with `params`.
    pub fn new(
        source: &'a GaussianProcess<f64>,
        params: GpParams<f64>,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        y: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> Result<Self> {
        let params = params.check()?;
        let observations = target_data(source, x, y)?;
        let (residual, merged) = merge(source, &params, &observations)?;
        Ok(BiasCorrected {
            source,
            params,
            observations,
            residual,
            merged,
        })
    }

    /// Recompute the residual GP from the target observations and merge the
    /// bias-corrected source observations again from scratch.
    pub fn build_residual(&mut self) -> Result<()> {
        let (residual, merged) = merge(self.source, &self.params, &self.observations)?;
        self.residual = residual;
        self.merged = merged;
        Ok(())
    }

    /// Append one target observation, residual and merge are rebuilt.
    ///
    /// The composition is left unchanged on failure.
    pub fn append(&mut self, x: &ArrayBase<impl Data<Elem = f64>, Ix1>, y: f64) -> Result<()> {
        let mut observations = self.observations.clone();
        observations.push(x, y)?;
        let (residual, merged) = merge(self.source, &self.params, &observations)?;
        self.observations = observations;
        self.residual = residual;
        self.merged = merged;
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

    /// GP on the merged dataset
    pub fn merged(&self) -> &GaussianProcess<f64> {
        &self.merged
    }

    /// Target dataset: target observations followed by bias-corrected source observations
    pub fn target(&self) -> &TrainingData<f64> {
        self.merged.training_data()
    }

    /// Target observations only
    pub fn observations(&self) -> &TrainingData<f64> {
        &self.observations
    }
}

fn merge(
    source: &GaussianProcess<f64>,
    params: &GpValidParams<f64>,
    observations: &TrainingData<f64>,
) -> Result<(GaussianProcess<f64>, GaussianProcess<f64>)> {
    let residual = fit_residual(source, params, observations)?;
    let mut merged = GaussianProcess::from_training_data(params.clone(), observations.clone())?;
    let source_data = source.training_data();
    let mut skipped = 0;
    for (x, &y) in source_data
        .inputs()
        .rows()
        .into_iter()
        .zip(source_data.responses().iter())
    {
        if !is_update_ok(&merged.training_data().inputs(), &x) {
            skipped += 1;
            continue;
        }
        match merged.append(&x, y + residual.posterior_mean(&x)?) {
            Ok(()) => {}
            // too close to a merged input for the Gram matrix to be factorized
            Err(GpError::SingularCovariance(msg)) => {
                debug!("BCBO source observation at {} not merged: {}", x, msg);
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!(
        "BCBO merged {} bias-corrected source observations into {} target observations ({} skipped)",
        merged.n_obs() - observations.len(),
        observations.len(),
        skipped
    );
    Ok((residual, merged))
}

impl fmt::Display for BiasCorrected<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BCBO(merged={}, residual={})", self.merged, self.residual)
    }
}

impl Posterior<f64> for BiasCorrected<'_> {
    fn dim(&self) -> usize {
        self.merged.dim()
    }

    fn mean(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<f64> {
        self.merged.posterior_mean(x)
    }

    fn variance(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<f64> {
        self.merged.posterior_variance(x)
    }

    fn mean_gradient(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<Array1<f64>> {
        self.merged.posterior_mean_gradient(x)
    }

    fn variance_gradient(&self, x: &ArrayView1<f64>) -> tlbo_gp::Result<Array1<f64>> {
        self.merged.posterior_variance_gradient(x)
    }

    fn best_observed(&self) -> tlbo_gp::Result<f64> {
        self.merged.best_observed()
    }

    fn training_inputs(&self) -> ArrayView2<'_, f64> {
        self.merged.training_data().inputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{AcquisitionFunction, EI};
    use crate::optimizers::MultiStartOptimizer;
    use crate::transfer::build_source;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use tlbo_gp::NoiseVariance;

    fn source() -> GaussianProcess<f64> {
        build_source(
            &array![[0.], [2.], [4.], [6.], [8.]],
            &array![0.1, 0.6, 1.0, 0.4, 0.0],
            1.,
            0.,
            NoiseVariance::Unknown,
        )
        .unwrap()
    }

    #[test]
    fn test_merge_count() {
        let _ = env_logger::builder().is_test(true).try_init();
        let source = source();
        // 4. is a source input
        let xt = array![[1.], [4.], [7.]];
        let yt = array![0.5, 1.3, 0.2];
        let bcbo = BiasCorrected::new(&source, GpParams::new().theta(1.), &xt, &yt).unwrap();
        assert_eq!(bcbo.observations().len(), 3);
        assert_eq!(bcbo.target().len(), 3 + 4);
        // target observations first, unchanged
        assert_eq!(bcbo.target().inputs().slice(ndarray::s![..3, ..]), xt);
        assert_eq!(bcbo.target().responses().slice(ndarray::s![..3]), yt);
    }

    #[test]
    fn test_merge_skips_near_duplicate_source_inputs() {
        let source = source();
        for delta in [1e-12, 1e-10, 1e-9, 1e-8] {
            let xt = array![[1.], [4. + delta]];
            let bcbo =
                BiasCorrected::new(&source, GpParams::new().theta(1.), &xt, &array![0.5, 1.3])
                    .unwrap();
            // source input 4. is left out
            assert_eq!(bcbo.target().len(), 2 + 4);
            assert!(bcbo
                .target()
                .inputs()
                .rows()
                .into_iter()
                .all(|x| x[0] != 4.));
        }

        let mut bcbo = BiasCorrected::new(
            &source,
            GpParams::new().theta(1.),
            &array![[3.], [7.]],
            &array![0.9, 0.1],
        )
        .unwrap();
        bcbo.append(&array![4. + 1e-9], 1.3).unwrap();
        assert_eq!(bcbo.observations().len(), 3);
        assert_eq!(bcbo.target().len(), 3 + 4);
        assert_abs_diff_eq!(bcbo.mean(&array![4. + 1e-9].view()).unwrap(), 1.3, epsilon = 1e-6);
    }

    #[test]
    fn test_bias_correction() {
        let source = source();
        let xt = array![[1.], [5.]];
        let yt = array![0.8, 1.2];
        let bcbo = BiasCorrected::new(&source, GpParams::new().theta(1.), &xt, &yt).unwrap();
        let target = bcbo.target();
        let inputs = target.inputs();
        for i in 2..target.len() {
            let x = inputs.row(i);
            let (j, _) = source
                .training_data()
                .inputs()
                .rows()
                .into_iter()
                .enumerate()
                .find(|(_, xs)| *xs == x)
                .unwrap();
            let expected = source.training_data().responses()[j]
                + bcbo.residual().posterior_mean(&x).unwrap();
            assert_abs_diff_eq!(target.responses()[i], expected, epsilon = 1e-12);
            // the merged GP interpolates the corrected source observations
            assert_abs_diff_eq!(bcbo.mean(&x).unwrap(), expected, epsilon = 1e-6);
        }
        assert_eq!(bcbo.best_observed().unwrap(), bcbo.merged().best_observed().unwrap());
    }

    #[test]
    fn test_build_residual_is_idempotent() {
        let source = source();
        let mut bcbo = BiasCorrected::new(
            &source,
            GpParams::new().theta(1.),
            &array![[3.]],
            &array![0.9],
        )
        .unwrap();
        let n = bcbo.target().len();
        let x = array![5.5];
        let before = bcbo.valvar(&x.view()).unwrap();
        bcbo.build_residual().unwrap();
        bcbo.build_residual().unwrap();
        assert_eq!(bcbo.target().len(), n);
        assert_eq!(bcbo.valvar(&x.view()).unwrap(), before);
    }

    #[test]
    fn test_append_and_optimize() {
        let source = source();
        let mut bcbo = BiasCorrected::new(
            &source,
            GpParams::new().theta(1.),
            &array![[3.], [7.]],
            &array![0.9, 0.1],
        )
        .unwrap();
        assert_eq!(bcbo.target().len(), 7);
        // appending on a source input drops its corrected copy
        bcbo.append(&array![2.], 0.7).unwrap();
        assert_eq!(bcbo.observations().len(), 3);
        assert_eq!(bcbo.target().len(), 7);

        let (x, ei) = MultiStartOptimizer::new(&bcbo, &EI)
            .configure(|c| c.bounds(&array![[0., 8.]].view()).seed(0))
            .find_best_next_point(None)
            .unwrap();
        assert!((0. ..=8.).contains(&x[0]));
        assert_abs_diff_eq!(ei, EI.value(&x.view(), &bcbo, 0.).unwrap());
    }
}
