//! SetuGraph - Incremental pose-graph SLAM backend with loop closure
//!
//! Maintains a growing graph of robot poses linked by odometry and
//! loop-closure constraints, stores scans for keyframes, verifies revisits
//! with scan registration and keeps an optimized estimate of every pose.
//!
//! # Architecture
//!
//! The crate is organized into 5 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      main                           │  ← Replay binary
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Collaborators
//! │        (publisher, persistence, replay)             │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │   (store, odometry, loop closure, session)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │            optimizer/  registration/                │  ← Solvers
//! │        (Gauss-Newton SE(3), ICP, voxel filter)      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                core/  config/                       │  ← Foundation
//! │           (types, math, TOML config)                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use setu_graph::{PointCloud3D, PoseGraphSession, Pose3D, covariance_from_sigmas};
//!
//! # fn capture_scan() -> PointCloud3D { PointCloud3D::new() }
//! let mut session = PoseGraphSession::from_config_file(Path::new("setu-graph.toml"))?;
//! let delta = Pose3D::from_xyz_rpy(0.6, 0.0, 0.0, 0.0, 0.0, 0.0);
//! let (key, is_keyframe) =
//!     session.add_between_factor(&delta, &covariance_from_sigmas(&[0.01; 6]), 100_000)?;
//! if is_keyframe {
//!     session.add_key_scan_pair(key, capture_scan())?;
//!     let closed = session.find_loop_closures(key)?;
//!     println!("key {key} closed loops with {closed:?}");
//! }
//! # Ok::<(), setu_graph::GraphError>(())
//! ```

// Layer 1: Core foundation (no internal deps)
pub mod core;

// Layer 1: Configuration (depends on core)
pub mod config;

// Layer 2: Solvers (depends on core)
pub mod optimizer;
pub mod registration;

// Layer 3: Pose graph engine (depends on all of the above)
pub mod engine;

// Layer 4: Collaborator boundaries
pub mod io;

pub mod error;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ConfigLoadError, SetuConfig};
pub use crate::core::types::{
    Covariance6, Key, KeyPair, MIN_VARIANCE, PointCloud3D, Pose3D, covariance_from_sigmas,
    covariance_from_variances,
};
pub use engine::{
    ConstraintCovarianceEstimator, LoopClosure, LoopClosureDetector, OdometryIntegrator,
    PoseGraphSession, PoseGraphStore,
};
pub use error::{GraphError, Result};
pub use io::{
    EdgeKind, EdgeSegment, GraphPublisher, LogPublisher, MapSink, PlyMapWriter,
    PoseGraphMessage, TrajectoryRecord,
};
pub use optimizer::{
    Factor, GaussNewtonConfig, GaussNewtonOptimizer, OptimizerError, PoseOptimizer, Values,
};
pub use registration::{
    IcpConfig, PointToPointIcp, Registrar, RegistrationFailure, RegistrationResult,
    ScanRegistration, VoxelFilter,
};
