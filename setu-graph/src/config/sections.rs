//! Configuration sections.

use serde::{Deserialize, Serialize};

use super::defaults;

/// Frame identifiers attached to published messages.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FramesSection {
    /// Fixed (world) frame
    pub fixed: String,
    /// Robot base frame
    pub base: String,
}

impl Default for FramesSection {
    fn default() -> Self {
        Self {
            fixed: "map".to_string(),
            base: "base_link".to_string(),
        }
    }
}

/// Keyframe selection and loop-closure search.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoopClosureSection {
    /// Enable the loop-closure detector
    pub check_for_loop_closures: bool,

    /// Accumulated translation (meters) before a new keyframe
    pub translation_threshold: f64,

    /// Candidate search radius (meters)
    pub proximity_threshold: f64,

    /// Registration acceptance bound (lower fitness is better)
    pub max_tolerable_fitness: f64,

    /// Keys closer than this to the query are never candidates
    pub skip_recent_poses: u64,

    /// Minimum key distance from the last accepted closure
    pub poses_before_reclosing: u64,

    /// Keep scanning after a rejected candidate instead of stopping
    #[serde(default)]
    pub scan_all_candidates: bool,
}

impl Default for LoopClosureSection {
    fn default() -> Self {
        Self {
            check_for_loop_closures: true,
            translation_threshold: 0.5,
            proximity_threshold: 2.0,
            max_tolerable_fitness: 0.15,
            skip_recent_poses: 20,
            poses_before_reclosing: 10,
            scan_all_candidates: false,
        }
    }
}

/// Incremental optimizer tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OptimizerSection {
    /// Relinearize every N updates
    pub relinearize_skip: u32,
    /// Relative chi-squared change treated as converged
    pub relinearize_threshold: f64,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            relinearize_skip: 1,
            relinearize_threshold: 0.01,
        }
    }
}

/// ICP tuning, passed through to the registrar.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IcpSection {
    /// Squared transform change treated as converged
    pub tf_epsilon: f64,
    /// Maximum correspondence distance (meters)
    pub corr_dist: f64,
    /// Iteration cap
    pub iterations: u32,
}

impl Default for IcpSection {
    fn default() -> Self {
        Self {
            tf_epsilon: 1e-8,
            corr_dist: 1.0,
            iterations: 50,
        }
    }
}

/// `x y z` triple.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PositionSettings {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `roll pitch yaw` triple (radians).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OrientationSettings {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Prior on key 0.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InitSection {
    pub position: PositionSettings,
    pub orientation: OrientationSettings,
    pub position_sigma: PositionSettings,
    pub orientation_sigma: OrientationSettings,
}

impl Default for InitSection {
    fn default() -> Self {
        Self {
            position: PositionSettings::default(),
            orientation: OrientationSettings::default(),
            position_sigma: PositionSettings {
                x: 0.01,
                y: 0.01,
                z: 0.01,
            },
            orientation_sigma: OrientationSettings {
                roll: 0.01,
                pitch: 0.01,
                yaw: 0.01,
            },
        }
    }
}

/// Caps on the loop-closure covariance estimate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CovarianceSection {
    #[serde(default = "defaults::translation_cap")]
    pub translation_cap: f64,
    #[serde(default = "defaults::rotation_cap")]
    pub rotation_cap: f64,
}

impl Default for CovarianceSection {
    fn default() -> Self {
        Self {
            translation_cap: defaults::translation_cap(),
            rotation_cap: defaults::rotation_cap(),
        }
    }
}

/// Scan downsampling before registration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterSection {
    /// Voxel edge length (meters, 0 = disabled)
    #[serde(default)]
    pub voxel_leaf_size: f64,
}

/// Map and location output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistenceSection {
    /// Output directory path
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,

    /// Point cloud file name (overwritten on each save)
    #[serde(default = "defaults::map_file")]
    pub map_file: String,

    /// Location log file name (appended on each save)
    #[serde(default = "defaults::location_file")]
    pub location_file: String,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            map_file: defaults::map_file(),
            location_file: defaults::location_file(),
        }
    }
}
