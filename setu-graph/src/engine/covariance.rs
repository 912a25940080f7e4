//! Covariance for loop-closure constraints.
//!
//! Turns a raw registration transform into a diagonal 6x6 covariance.
//! A dispersion value is computed from the transform magnitude and the two
//! solved poses; values above a cap are attenuated into `[0, cap]`:
//!
//! ```text
//! translation: κ = ‖t(T)‖      τ_j  = (t1_j − κ)(t2_j − κ)      ψ = ‖τ‖
//! rotation:    κ = ‖R(T)‖_F    τ_jk = (R1_jk − κ)(R2_jk − κ)    ψ = ‖τ‖_F
//! while ψ > cap: ψ = ψ · a
//! ```
//!
//! The attenuation `a` comes from [`crate::core::math::attenuation_factor`].
//! Only the cap and positivity are guaranteed; the estimate does not model
//! registration uncertainty.

use crate::core::math::{attenuate_into, attenuation_factor};
use crate::core::types::{Covariance6, MIN_VARIANCE, Pose3D, covariance_from_variances};

/// Capped heuristic covariance estimator.
#[derive(Debug, Clone)]
pub struct ConstraintCovarianceEstimator {
    translation_cap: f64,
    rotation_cap: f64,
    translation_attenuation: f64,
    rotation_attenuation: f64,
}

impl ConstraintCovarianceEstimator {
    /// Caps must be positive (validated by the config layer).
    pub fn new(translation_cap: f64, rotation_cap: f64) -> Self {
        Self {
            translation_cap,
            rotation_cap,
            translation_attenuation: attenuation_factor(translation_cap),
            rotation_attenuation: attenuation_factor(rotation_cap),
        }
    }

    pub fn translation_cap(&self) -> f64 {
        self.translation_cap
    }

    pub fn rotation_cap(&self) -> f64 {
        self.rotation_cap
    }

    /// Covariance for a constraint between `pose1` and `pose2` given the
    /// registration `transform`.
    pub fn estimate(&self, transform: &Pose3D, pose1: &Pose3D, pose2: &Pose3D) -> Covariance6 {
        let psi_t = self.bounded(
            translation_dispersion(transform, pose1, pose2),
            self.translation_cap,
            self.translation_attenuation,
            "translation",
        );
        let psi_r = self.bounded(
            rotation_dispersion(transform, pose1, pose2),
            self.rotation_cap,
            self.rotation_attenuation,
            "rotation",
        );

        covariance_from_variances(&[psi_t, psi_t, psi_t, psi_r, psi_r, psi_r])
    }

    fn bounded(&self, raw: f64, cap: f64, attenuation: f64, what: &str) -> f64 {
        if !raw.is_finite() {
            log::error!("Non-finite {} dispersion {}, using cap {}", what, raw, cap);
        }
        attenuate_into(raw, cap, attenuation).max(MIN_VARIANCE.min(cap))
    }
}

fn translation_dispersion(transform: &Pose3D, pose1: &Pose3D, pose2: &Pose3D) -> f64 {
    let kappa = transform.translation_norm();
    let t1 = pose1.translation();
    let t2 = pose2.translation();
    t1.zip_map(&t2, |a, b| (a - kappa) * (b - kappa)).norm()
}

fn rotation_dispersion(transform: &Pose3D, pose1: &Pose3D, pose2: &Pose3D) -> f64 {
    let kappa = transform.rotation_matrix().norm();
    let r1 = pose1.rotation_matrix();
    let r2 = pose2.rotation_matrix();
    r1.zip_map(&r2, |a, b| (a - kappa) * (b - kappa)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_capped(cov: &Covariance6, t_cap: f64, r_cap: f64) {
        for i in 0..6 {
            for j in 0..6 {
                assert_eq!(cov[(i, j)], cov[(j, i)]);
                if i != j {
                    assert_eq!(cov[(i, j)], 0.0);
                }
            }
            let v = cov[(i, i)];
            let cap = if i < 3 { t_cap } else { r_cap };
            assert!(v > 0.0 && v <= cap, "entry {i} = {v}");
        }
    }

    #[test]
    fn test_caps_hold_for_assorted_inputs() {
        let est = ConstraintCovarianceEstimator::new(0.1, 0.04);
        let poses = [
            Pose3D::identity(),
            Pose3D::from_xyz_rpy(1.0, 2.0, 0.0, 0.0, 0.0, 0.3),
            Pose3D::from_xyz_rpy(-50.0, 120.0, 3.0, 0.1, -0.2, 3.0),
            Pose3D::from_xyz_rpy(1e6, -1e6, 1e3, 1.0, 1.0, -2.0),
        ];
        for t in &poses {
            for p1 in &poses {
                for p2 in &poses {
                    assert_capped(&est.estimate(t, p1, p2), 0.1, 0.04);
                }
            }
        }
    }

    #[test]
    fn test_custom_caps() {
        let est = ConstraintCovarianceEstimator::new(0.5, 0.2);
        let t = Pose3D::from_translation(0.3, 0.0, 0.0);
        let p = Pose3D::from_xyz_rpy(10.0, -4.0, 0.0, 0.0, 0.0, 1.0);
        assert_capped(&est.estimate(&t, &p, &p), 0.5, 0.2);
    }

    #[test]
    fn test_zero_dispersion_is_floored() {
        // κ = 0 and both poses at the origin give ψT = 0
        let est = ConstraintCovarianceEstimator::new(0.1, 0.04);
        let cov = est.estimate(&Pose3D::identity(), &Pose3D::identity(), &Pose3D::identity());
        assert_eq!(cov[(0, 0)], MIN_VARIANCE);
        assert!(cov[(3, 3)] > 0.0);
    }

    #[test]
    fn test_caps_below_variance_floor_still_hold() {
        let est = ConstraintCovarianceEstimator::new(1e-12, 1e-12);
        let t = Pose3D::from_translation(0.5, 0.0, 0.0);
        let p1 = Pose3D::from_xyz_rpy(2.0, 1.0, 0.0, 0.0, 0.0, 0.4);
        let cov = est.estimate(&t, &p1, &Pose3D::identity());
        assert_capped(&cov, 1e-12, 1e-12);

        let zero = est.estimate(&Pose3D::identity(), &Pose3D::identity(), &Pose3D::identity());
        assert_eq!(zero[(0, 0)], 1e-12);
    }

    #[test]
    fn test_small_dispersion_passes_through() {
        let est = ConstraintCovarianceEstimator::new(0.1, 0.04);
        let t = Pose3D::identity();
        let p1 = Pose3D::from_translation(0.1, 0.0, 0.0);
        let p2 = Pose3D::from_translation(0.2, 0.0, 0.0);
        let cov = est.estimate(&t, &p1, &p2);
        approx::assert_relative_eq!(cov[(0, 0)], 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_pose_uses_cap() {
        let est = ConstraintCovarianceEstimator::new(0.1, 0.04);
        let bad = Pose3D::from_translation(f64::NAN, 0.0, 0.0);
        let cov = est.estimate(&Pose3D::identity(), &bad, &Pose3D::identity());
        assert_eq!(cov[(0, 0)], 0.1);
    }
}
