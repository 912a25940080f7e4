//! Odometry accumulation and keyframe selection.
//!
//! Not every pose becomes a keyframe - only poses that represent sufficient
//! translation since the previous keyframe get a scan stored for them.

use crate::core::types::Pose3D;

/// Running odometry since the last keyframe.
#[derive(Debug, Clone)]
pub struct OdometryIntegrator {
    /// Motion accumulated since the last keyframe.
    accumulated: Pose3D,

    /// Translation (meters) that must be strictly exceeded.
    translation_threshold: f64,
}

impl OdometryIntegrator {
    pub fn new(translation_threshold: f64) -> Self {
        Self {
            accumulated: Pose3D::identity(),
            translation_threshold,
        }
    }

    /// Motion since the last keyframe.
    pub fn accumulated(&self) -> &Pose3D {
        &self.accumulated
    }

    pub fn translation_threshold(&self) -> f64 {
        self.translation_threshold
    }

    /// Compose `delta` onto the accumulator.
    ///
    /// Returns `true` and resets to identity iff the accumulated translation
    /// norm exceeds the threshold.
    pub fn integrate(&mut self, delta: &Pose3D) -> bool {
        self.accumulated = self.accumulated.compose(delta);
        if self.accumulated.translation_norm() > self.translation_threshold {
            self.accumulated = Pose3D::identity();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = Pose3D::identity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_keyframe_when_threshold_exceeded() {
        let mut odom = OdometryIntegrator::new(1.0);
        let step = Pose3D::from_translation(0.4, 0.0, 0.0);

        assert!(!odom.integrate(&step));
        assert!(!odom.integrate(&step));
        assert_relative_eq!(odom.accumulated().translation().x, 0.8, epsilon = 1e-12);

        assert!(odom.integrate(&step));
        assert_relative_eq!(odom.accumulated().translation_norm(), 0.0);
    }

    #[test]
    fn test_exact_threshold_is_not_keyframe() {
        let mut odom = OdometryIntegrator::new(0.5);
        assert!(!odom.integrate(&Pose3D::from_translation(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_rotation_only_never_triggers() {
        let mut odom = OdometryIntegrator::new(0.1);
        let turn = Pose3D::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, 0.5);
        for _ in 0..20 {
            assert!(!odom.integrate(&turn));
        }
    }

    #[test]
    fn test_back_and_forth_cancels() {
        let mut odom = OdometryIntegrator::new(0.5);
        assert!(!odom.integrate(&Pose3D::from_translation(0.4, 0.0, 0.0)));
        assert!(!odom.integrate(&Pose3D::from_translation(-0.4, 0.0, 0.0)));
        assert!(!odom.integrate(&Pose3D::from_translation(0.4, 0.0, 0.0)));
    }
}
