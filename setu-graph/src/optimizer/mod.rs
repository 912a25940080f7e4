//! Pose-graph optimizer interface.
//!
//! The session talks to the solver only through [`PoseOptimizer`]:
//! an `initialize` call with the prior on key 0, then `update` calls that add
//! factors and predicted values and return the solved estimate for every key.
//!
//! [`GaussNewtonOptimizer`] is the bundled reference implementation.

mod gauss_newton;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::types::{Covariance6, Key, Pose3D};

pub use gauss_newton::{
    GaussNewtonConfig, GaussNewtonOptimizer, OptimizationResult, TerminationReason,
};

/// Solved (or predicted) pose per key.
pub type Values = BTreeMap<Key, Pose3D>;

/// Gaussian factor on rigid poses.
#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    /// Absolute pose measurement.
    Prior {
        key: Key,
        pose: Pose3D,
        covariance: Covariance6,
    },

    /// Relative measurement `from⁻¹ · to`.
    Between {
        from: Key,
        to: Key,
        measurement: Pose3D,
        covariance: Covariance6,
    },
}

impl Factor {
    /// Keys this factor constrains.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Factor::Prior { key, .. } => vec![*key],
            Factor::Between { from, to, .. } => vec![*from, *to],
        }
    }

    /// Measurement covariance.
    pub fn covariance(&self) -> &Covariance6 {
        match self {
            Factor::Prior { covariance, .. } | Factor::Between { covariance, .. } => covariance,
        }
    }
}

/// Optimizer failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("Optimizer has not been initialized")]
    NotInitialized,

    #[error("Optimizer is already initialized")]
    AlreadyInitialized,

    #[error("Value for key {0} already exists")]
    DuplicateKey(Key),

    #[error("Factor references unknown key {0}")]
    UnknownKey(Key),

    #[error("Covariance cannot be inverted")]
    SingularCovariance,

    #[error("Linear solve failed")]
    SolveFailed,
}

/// Incremental nonlinear solver over rigid poses.
///
/// Implementations must keep a value for every key ever submitted and return
/// all of them from each call.
pub trait PoseOptimizer {
    /// Start a new problem with a prior factor on key 0.
    fn initialize(
        &mut self,
        prior_pose: Pose3D,
        prior_covariance: Covariance6,
    ) -> Result<Values, OptimizerError>;

    /// Add factors and initial guesses for new keys, then re-solve.
    ///
    /// A call with no factors and no predictions is a plain re-solve.
    fn update(&mut self, factors: Vec<Factor>, predictions: Values)
    -> Result<Values, OptimizerError>;
}
