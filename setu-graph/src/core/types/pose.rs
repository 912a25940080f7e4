//! Rigid-body pose type for 3D pose graphs.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};

/// Rigid transform (rotation + translation) in 3D.
///
/// Immutable value type: every operation returns a new pose.
/// Composition follows the usual convention `a.compose(b) = a · b`, i.e.
/// `b` is expressed in the frame of `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    isometry: Isometry3<f64>,
}

impl Pose3D {
    /// Create a pose from a translation and a unit quaternion.
    #[inline]
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }

    /// Identity pose.
    #[inline]
    pub fn identity() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }

    /// Pure translation.
    #[inline]
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// Create from position and roll/pitch/yaw (radians).
    ///
    /// Rotation is `Rz(yaw) · Ry(pitch) · Rx(roll)`.
    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Create from a rotation matrix and translation.
    ///
    /// The matrix is re-orthonormalized, so slightly drifted inputs
    /// (e.g. single-precision registration output) are accepted.
    pub fn from_rotation_matrix(rotation: &Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rotation = Rotation3::from_matrix(rotation);
        Self::new(translation, UnitQuaternion::from_rotation_matrix(&rotation))
    }

    /// Create from a homogeneous 4x4 transform.
    pub fn from_matrix(matrix: &Matrix4<f64>) -> Self {
        let rotation: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: Vector3<f64> = matrix.fixed_view::<3, 1>(0, 3).into_owned();
        Self::from_rotation_matrix(&rotation, translation)
    }

    /// Translation component.
    #[inline]
    pub fn translation(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    /// Rotation component.
    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.isometry.rotation
    }

    /// Rotation as a 3x3 matrix.
    #[inline]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.isometry.rotation.to_rotation_matrix().into_inner()
    }

    /// Homogeneous 4x4 transform.
    #[inline]
    pub fn to_matrix(&self) -> Matrix4<f64> {
        self.isometry.to_homogeneous()
    }

    /// Borrow the underlying isometry.
    #[inline]
    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.isometry
    }

    /// Euclidean norm of the translation.
    #[inline]
    pub fn translation_norm(&self) -> f64 {
        self.isometry.translation.vector.norm()
    }

    /// Rotation angle in radians, in [0, π].
    #[inline]
    pub fn rotation_angle(&self) -> f64 {
        self.isometry.rotation.angle()
    }

    /// Compose two poses: `self · other`.
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            isometry: self.isometry * other.isometry,
        }
    }

    /// Inverse transform.
    #[inline]
    pub fn inverse(&self) -> Pose3D {
        Pose3D {
            isometry: self.isometry.inverse(),
        }
    }

    /// Relative pose from `self` to `other`: `self⁻¹ · other`.
    #[inline]
    pub fn between(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            isometry: self.isometry.inv_mul(&other.isometry),
        }
    }

    /// Transform a point from the local frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.isometry.transform_point(point)
    }

    /// Apply a tangent-space increment on the right.
    ///
    /// `delta = [tx, ty, tz, rx, ry, rz]`: translation in the body frame,
    /// rotation as a scaled axis through the exponential map.
    pub fn retract(&self, delta: &[f64; 6]) -> Pose3D {
        let increment = Pose3D::new(
            Vector3::new(delta[0], delta[1], delta[2]),
            UnitQuaternion::from_scaled_axis(Vector3::new(delta[3], delta[4], delta[5])),
        );
        self.compose(&increment)
    }

    /// Tangent-space coordinates of this pose, inverse of [`Pose3D::retract`]
    /// applied to the identity.
    pub fn local_coordinates(&self) -> [f64; 6] {
        let t = self.translation();
        let r = self.isometry.rotation.scaled_axis();
        [t.x, t.y, t.z, r.x, r.y, r.z]
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.translation().iter().all(|v| v.is_finite())
            && self.isometry.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}
