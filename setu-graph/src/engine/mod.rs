//! Pose graph engine.
//!
//! # Contents
//!
//! - [`PoseGraphStore`]: solved poses, stamps, keyframe scans, edge lists
//! - [`OdometryIntegrator`]: odometry accumulation and keyframe selection
//! - [`LoopClosureDetector`]: proximity search plus geometric verification
//! - [`ConstraintCovarianceEstimator`]: capped covariance for closures
//! - [`PoseGraphSession`]: owns all of the above and the optimizer

mod covariance;
mod loop_closure;
mod odometry;
mod query;
mod session;
mod store;

pub use covariance::ConstraintCovarianceEstimator;
pub use loop_closure::{LoopClosure, LoopClosureDetector};
pub use odometry::OdometryIntegrator;
pub use session::PoseGraphSession;
pub use store::PoseGraphStore;
