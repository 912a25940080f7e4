//! Session-level error type.

use thiserror::Error;

use crate::core::types::Key;
use crate::optimizer::OptimizerError;

/// Errors returned by [`crate::PoseGraphSession`] operations.
///
/// A failed operation leaves the graph unchanged.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Scan already stored for key {0}")]
    AlreadyExists(Key),

    #[error("Unknown key {0}")]
    UnknownKey(Key),

    #[error("No scan stored for key {0}")]
    MissingScan(Key),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
