//! This library implements the acquisition side of Bayesian optimization over
//! gaussian process posteriors:
//!
//! * [criteria]: Expected Improvement and Upper Confidence Bound acquisition
//!   functions, with a reparameterization Monte Carlo estimator of the EI gradient,
//! * [optimizers]: an Adam gradient ascent run from several start points in parallel,
//! * [transfer]: Shape Transfer (STBO) and Bias Corrected (BCBO) compositions
//!   reusing a frozen source GP to optimize a related target function.
//!
//! Every component relies only on the [`Posterior`](tlbo_gp::Posterior) trait,
//! so a plain [`GaussianProcess`](tlbo_gp::GaussianProcess) and a transfer
//! composition are optimized the same way.
//!
//! # Example
//!
//! ```
//! use linfa::prelude::{Dataset, Fit};
//! use ndarray::array;
//! use tlbo_ego::criteria::EI;
//! use tlbo_ego::optimizers::MultiStartOptimizer;
//! use tlbo_ego::transfer::{build_source, ShapeTransfer};
//! use tlbo_gp::{GpParams, NoiseVariance};
//!
//! // Source task, already explored
//! let source = build_source(
//!     &array![[0.], [1.], [2.], [3.], [4.]],
//!     &array![0.1, 0.5, 0.9, 0.4, 0.0],
//!     1.,
//!     0.,
//!     NoiseVariance::Unknown,
//! )
//! .expect("source GP");
//!
//! // Target task, a few observations only
//! let stbo = ShapeTransfer::new(&source, GpParams::new(), &array![[0.5], [3.5]], &array![0.4, 0.3])
//!     .expect("STBO");
//!
//! let (x_next, ei) = MultiStartOptimizer::new(&stbo, &EI)
//!     .configure(|config| config.bounds(&array![[0., 4.]].view()).seed(42))
//!     .find_best_next_point(Some(&array![[1.], [2.], [3.]].view()))
//!     .expect("next point");
//! println!("Next point to evaluate {} (EI = {})", x_next, ei);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod criteria;
mod errors;
pub mod optimizers;
pub mod transfer;
pub mod utils;

pub use errors::*;

/// Environment variable name used to set the log level (see `env_logger`)
pub const TLBO_LOG: &str = "TLBO_LOG";
