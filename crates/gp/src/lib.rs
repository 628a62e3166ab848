//! This library implements a zero-mean [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! surrogate with a squared exponential kernel of fixed bandwidth, as used
//! by Bayesian optimization acquisition functions.
//!
//! The GP exposes its posterior mean and variance, their analytic gradients
//! wrt the query point, a maximum likelihood estimation of the noise variance,
//! confidence intervals and trajectory sampling.
//! [rkhs_distance()] and [similarity()] compare the posterior means of two GPs
//! sharing a kernel.
//!
//! GP models are implemented by [GaussianProcess] parameterized by [GpParams]
//! and built with the [linfa](https://github.com/rust-ml/linfa) `Fit` trait.
//! The [Posterior] trait is the interface consumed by acquisition functions,
//! other surrogates (e.g. compositions of GPs) implement it too.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod correlation_models;
mod dataset;
mod errors;
mod parameters;
mod similarity;
mod surrogate;
mod utils;

pub use algorithm::*;
pub use dataset::*;
pub use errors::*;
pub use parameters::*;
pub use similarity::*;
pub use surrogate::*;
pub use utils::{differences, squared_distances};
