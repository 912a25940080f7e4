//! Core data types for the pose graph.
//!
//! - [`Key`]: Identifier of one pose node
//! - [`Pose3D`]: Rigid transform in 3D
//! - [`PointCloud3D`]: Keyframe scan
//! - [`Covariance6`]: 6x6 measurement covariance (translation first)

mod covariance;
mod pose;
mod scan;

pub use covariance::{
    Covariance6, MIN_VARIANCE, covariance_from_sigmas, covariance_from_variances, regularize,
};
pub use pose::Pose3D;
pub use scan::PointCloud3D;

/// Identifier of one pose node.
///
/// Assigned contiguously from 0 and never reused.
pub type Key = u64;

/// Ordered pair of keys recording a directed constraint.
pub type KeyPair = (Key, Key);
