//! Registrar adapter used by the loop-closure detector.

use super::{Registrar, RegistrationFailure, VoxelFilter};
use crate::core::types::{PointCloud3D, Pose3D};

/// Accepted alignment between two keyframes.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Relative pose from the query key to the candidate key, corrected by
    /// the registration transform.
    pub delta: Pose3D,

    /// Raw registrar transform (fixed frame).
    pub transform: Pose3D,

    /// Registrar fitness score.
    pub fitness_score: f64,

    /// Query scan in the fixed frame (after filtering).
    pub source: PointCloud3D,

    /// Candidate scan in the fixed frame (after filtering).
    pub target: PointCloud3D,
}

/// Wraps a [`Registrar`] with scan preparation and the acceptance test.
#[derive(Debug, Clone)]
pub struct ScanRegistration<R> {
    registrar: R,
    filter: VoxelFilter,
    max_tolerable_fitness: f64,
}

impl<R: Registrar> ScanRegistration<R> {
    pub fn new(registrar: R, filter: VoxelFilter, max_tolerable_fitness: f64) -> Self {
        Self {
            registrar,
            filter,
            max_tolerable_fitness,
        }
    }

    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    pub fn max_tolerable_fitness(&self) -> f64 {
        self.max_tolerable_fitness
    }

    /// Align the scan of a query keyframe against a candidate keyframe.
    ///
    /// Both scans are filtered, moved into the fixed frame with their solved
    /// poses and handed to the registrar. The alignment is accepted iff the
    /// registrar converged and `fitness ≤ max_tolerable_fitness`.
    pub fn align(
        &self,
        scan1: &PointCloud3D,
        scan2: &PointCloud3D,
        pose1: &Pose3D,
        pose2: &Pose3D,
    ) -> Result<Alignment, RegistrationFailure> {
        let source = self.filter.apply(scan1).transform(pose1);
        let target = self.filter.apply(scan2).transform(pose2);
        if source.is_empty() || target.is_empty() {
            return Err(RegistrationFailure::EmptyScan);
        }

        let result = self.registrar.register(&source, &target)?;
        if !result.converged {
            return Err(RegistrationFailure::NotConverged);
        }
        // NaN fitness is rejected too
        if !(result.fitness_score <= self.max_tolerable_fitness) {
            return Err(RegistrationFailure::FitnessExceeded {
                fitness: result.fitness_score,
                max: self.max_tolerable_fitness,
            });
        }

        Ok(Alignment {
            delta: loop_closure_delta(pose1, pose2, &result.transform),
            transform: result.transform,
            fitness_score: result.fitness_score,
            source,
            target,
        })
    }
}

/// Constraint from `pose1` to `pose2` given a fixed-frame registration
/// transform aligning the first scan onto the second.
///
/// `update = P1 · T⁻¹ · P1⁻¹`, `delta = (P1⁻¹ · P2) · update`.
pub fn loop_closure_delta(pose1: &Pose3D, pose2: &Pose3D, transform: &Pose3D) -> Pose3D {
    let update = pose1.compose(&transform.inverse()).compose(&pose1.inverse());
    pose1.between(pose2).compose(&update)
}
