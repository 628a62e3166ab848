//! Transfer-learning Bayesian optimization with gaussian process surrogates.
//!
//! This crate gathers:
//!
//! * [gp]: a zero (or constant) prior mean gaussian process with a squared
//!   exponential kernel, its posterior mean, variance and their gradients,
//! * [ego]: Expected Improvement and Upper Confidence Bound acquisition
//!   functions, a parallel multistart Adam optimizer and the Shape Transfer
//!   (STBO) and Bias Corrected (BCBO) compositions of a source GP and a
//!   residual GP.
//!
//! One optimization round fits a posterior on the observed dataset, finds the
//! point maximizing the acquisition function, evaluates it externally and
//! appends the new observation.
//!
//! ```
//! use tlbo::prelude::*;
//! use ndarray::array;
//!
//! let xt = array![[0.], [5.]];
//! let yt = array![1., 0.5];
//! let mut gp = GaussianProcess::<f64>::params()
//!     .theta(1.)
//!     .fit(&Dataset::new(xt, yt))
//!     .expect("GP fitted");
//!
//! let (x_next, _ei) = MultiStartOptimizer::new(&gp, &EI)
//!     .configure(|config| config.bounds(&array![[0., 5.]].view()).seed(0))
//!     .find_best_next_point(Some(&array![[1.], [2.5], [4.]].view()))
//!     .expect("next point");
//! // objective evaluated elsewhere
//! let y_next = 0.8;
//! gp.append(&x_next, y_next).expect("new observation");
//! assert_eq!(gp.n_obs(), 3);
//! ```
#![warn(missing_docs)]

pub use tlbo_ego as ego;
pub use tlbo_gp as gp;

/// Commonly used types and traits
pub mod prelude {
    pub use linfa::prelude::{Dataset, Fit};
    pub use tlbo_ego::criteria::{
        AcquisitionFunction, EiGradient, ExpectedImprovement, UpperConfidenceBound, EI, UCB,
    };
    pub use tlbo_ego::optimizers::{
        AdamParams, BoundsHandling, MultiStartConfig, MultiStartOptimizer, OptimizationTrace,
    };
    pub use tlbo_ego::transfer::{build_source, BiasCorrected, ShapeTransfer};
    pub use tlbo_ego::EgoError;
    pub use tlbo_gp::{
        similarity, GaussianProcess, GpError, GpParams, NoiseVariance, Posterior,
    };
}
