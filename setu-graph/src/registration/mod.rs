//! Scan registration.
//!
//! The graph core depends only on [`Registrar`]: align a source cloud onto a
//! target cloud and report the transform plus a fitness score (lower is
//! better). [`ScanRegistration`] wraps a registrar with the parts the core
//! owns: moving both keyframe scans into the fixed frame, the acceptance
//! predicate, and turning the raw transform into a loop-closure constraint.
//!
//! [`PointToPointIcp`] and [`VoxelFilter`] are the bundled reference
//! implementations.

mod adapter;
mod filter;
mod icp;

#[cfg(test)]
pub(crate) mod test_utils;

use thiserror::Error;

use crate::core::types::{PointCloud3D, Pose3D};

pub use adapter::{Alignment, ScanRegistration, loop_closure_delta};
pub use filter::VoxelFilter;
pub use icp::{IcpConfig, PointToPointIcp, kabsch};

/// Raw registrar output.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// Transform aligning the source cloud onto the target cloud.
    pub transform: Pose3D,

    /// Alignment quality (lower is better).
    pub fitness_score: f64,

    /// Whether the registrar reports convergence.
    pub converged: bool,

    /// Iterations performed.
    pub iterations: u32,
}

/// Why a candidate alignment was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationFailure {
    #[error("Scan has no points")]
    EmptyScan,

    #[error("Registration did not converge")]
    NotConverged,

    #[error("Fitness {fitness:.4} exceeds {max:.4}")]
    FitnessExceeded { fitness: f64, max: f64 },
}

/// Point-cloud registration engine.
pub trait Registrar {
    /// Align `source` onto `target`; both clouds are in the same frame.
    fn register(
        &self,
        source: &PointCloud3D,
        target: &PointCloud3D,
    ) -> Result<RegistrationResult, RegistrationFailure>;
}

impl<R: Registrar + ?Sized> Registrar for Box<R> {
    fn register(
        &self,
        source: &PointCloud3D,
        target: &PointCloud3D,
    ) -> Result<RegistrationResult, RegistrationFailure> {
        (**self).register(source, target)
    }
}
