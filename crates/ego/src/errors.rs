use thiserror::Error;

/// A result type for acquisition and optimization errors
pub type Result<T> = std::result::Result<T, EgoError>;

/// An error for acquisition function optimization and transfer compositions
#[derive(Error, Debug)]
pub enum EgoError {
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When a posterior computation fails
    #[error("GP error: {0}")]
    GpError(#[from] tlbo_gp::GpError),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
}
