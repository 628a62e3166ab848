use thiserror::Error;

/// A result type for GP posterior computations
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using [`GaussianProcess`](crate::GaussianProcess)
#[derive(Error, Debug)]
pub enum GpError {
    /// When a point does not have the dimension of the training inputs
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension of the training inputs
        expected: usize,
        /// Dimension of the offending point
        found: usize,
    },
    /// When the Gram matrix cannot be factorized (near-duplicate inputs)
    #[error("Singular covariance: {0}")]
    SingularCovariance(String),
    /// When the posterior is queried before any observation is recorded
    #[error("Empty dataset: no observation to condition on")]
    EmptyDataset,
    /// When a recognized but unimplemented kernel is selected
    #[error("Kernel not implemented: {0}")]
    NotImplementedKernel(String),
    #[error(transparent)]
    /// When linear algebra computation fails
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
    /// When an array cannot be built or reshaped
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}
