//! TOML configuration for the pose-graph session.
//!
//! ## Example TOML
//!
//! ```toml
//! [frames]
//! fixed = "map"
//! base = "base_link"
//!
//! [loop_closure]
//! check_for_loop_closures = true
//! translation_threshold = 0.5     # keyframe every 50cm
//! proximity_threshold = 2.0       # candidate radius
//! max_tolerable_fitness = 0.15
//! skip_recent_poses = 20
//! poses_before_reclosing = 10
//!
//! [optimizer]
//! relinearize_skip = 1
//! relinearize_threshold = 0.01
//!
//! [icp]
//! tf_epsilon = 1e-8
//! corr_dist = 1.0
//! iterations = 50
//!
//! [init.position]
//! x = 0.0
//! y = 0.0
//! z = 0.0
//! # ... [init.orientation], [init.position_sigma], [init.orientation_sigma]
//! ```
//!
//! `[covariance]`, `[filter]` and `[persistence]` are optional.

mod defaults;
mod error;
mod sections;
mod setu;

pub use error::ConfigLoadError;
pub use sections::{
    CovarianceSection, FilterSection, FramesSection, IcpSection, InitSection, LoopClosureSection,
    OptimizerSection, OrientationSettings, PersistenceSection, PositionSettings,
};
pub use setu::SetuConfig;
