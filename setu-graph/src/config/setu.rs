//! Main SetuConfig and conversion methods.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::{Covariance6, Pose3D, covariance_from_sigmas};
use crate::optimizer::GaussNewtonConfig;
use crate::registration::IcpConfig;

use super::error::ConfigLoadError;
use super::sections::{
    CovarianceSection, FilterSection, FramesSection, IcpSection, InitSection, LoopClosureSection,
    OptimizerSection, PersistenceSection,
};

/// Full configuration loaded from TOML.
///
/// `frames`, `loop_closure`, `optimizer`, `icp` and `init` are required;
/// a missing key in any of them fails the load.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SetuConfig {
    pub frames: FramesSection,
    pub loop_closure: LoopClosureSection,
    pub optimizer: OptimizerSection,
    pub icp: IcpSection,
    pub init: InitSection,

    #[serde(default)]
    pub covariance: CovarianceSection,

    #[serde(default)]
    pub filter: FilterSection,

    #[serde(default)]
    pub persistence: PersistenceSection,
}

impl SetuConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io(e.to_string()))?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML string (no validation)
    pub fn from_toml(toml: &str) -> Result<Self, ConfigLoadError> {
        basic_toml::from_str(toml).map_err(|e| ConfigLoadError::Parse(e.to_string()))
    }

    /// Reject values the graph cannot work with.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let lc = &self.loop_closure;
        positive("loop_closure.translation_threshold", lc.translation_threshold)?;
        positive("loop_closure.proximity_threshold", lc.proximity_threshold)?;
        positive("loop_closure.max_tolerable_fitness", lc.max_tolerable_fitness)?;

        if self.optimizer.relinearize_skip == 0 {
            return Err(ConfigLoadError::Invalid(
                "optimizer.relinearize_skip must be at least 1".to_string(),
            ));
        }
        positive("optimizer.relinearize_threshold", self.optimizer.relinearize_threshold)?;

        positive("icp.tf_epsilon", self.icp.tf_epsilon)?;
        positive("icp.corr_dist", self.icp.corr_dist)?;
        if self.icp.iterations == 0 {
            return Err(ConfigLoadError::Invalid(
                "icp.iterations must be at least 1".to_string(),
            ));
        }

        positive("covariance.translation_cap", self.covariance.translation_cap)?;
        positive("covariance.rotation_cap", self.covariance.rotation_cap)?;

        let leaf = self.filter.voxel_leaf_size;
        if !leaf.is_finite() || leaf < 0.0 {
            return Err(ConfigLoadError::Invalid(format!(
                "filter.voxel_leaf_size must be >= 0, got {leaf}"
            )));
        }

        if !self.init_sigmas().iter().all(|s| s.is_finite() && *s >= 0.0) {
            return Err(ConfigLoadError::Invalid(
                "init sigmas must be finite and non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Prior pose for key 0.
    pub fn init_pose(&self) -> Pose3D {
        let p = &self.init.position;
        let o = &self.init.orientation;
        Pose3D::from_xyz_rpy(p.x, p.y, p.z, o.roll, o.pitch, o.yaw)
    }

    /// Prior covariance for key 0 (squared sigmas, translation first).
    pub fn init_covariance(&self) -> Covariance6 {
        covariance_from_sigmas(&self.init_sigmas())
    }

    fn init_sigmas(&self) -> [f64; 6] {
        let p = &self.init.position_sigma;
        let o = &self.init.orientation_sigma;
        [p.x, p.y, p.z, o.roll, o.pitch, o.yaw]
    }

    /// Config for the reference optimizer
    pub fn optimizer_config(&self) -> GaussNewtonConfig {
        GaussNewtonConfig {
            relinearize_skip: self.optimizer.relinearize_skip,
            relinearize_threshold: self.optimizer.relinearize_threshold,
            ..GaussNewtonConfig::default()
        }
    }

    /// Config for the reference registrar
    pub fn icp_config(&self) -> IcpConfig {
        IcpConfig {
            tf_epsilon: self.icp.tf_epsilon,
            corr_dist: self.icp.corr_dist,
            max_iterations: self.icp.iterations,
            ..IcpConfig::default()
        }
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigLoadError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigLoadError::Invalid(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MINIMAL: &str = r#"
[frames]
fixed = "map"
base = "base_link"

[loop_closure]
check_for_loop_closures = true
translation_threshold = 0.5
proximity_threshold = 2.0
max_tolerable_fitness = 0.15
skip_recent_poses = 20
poses_before_reclosing = 10

[optimizer]
relinearize_skip = 1
relinearize_threshold = 0.01

[icp]
tf_epsilon = 1e-8
corr_dist = 1.0
iterations = 50

[init.position]
x = 1.0
y = 2.0
z = 0.0

[init.orientation]
roll = 0.0
pitch = 0.0
yaw = 0.5

[init.position_sigma]
x = 0.1
y = 0.1
z = 0.1

[init.orientation_sigma]
roll = 0.02
pitch = 0.02
yaw = 0.02
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = SetuConfig::from_toml(MINIMAL).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.loop_closure.scan_all_candidates);
        assert_eq!(config.covariance.translation_cap, 0.1);
        assert_eq!(config.covariance.rotation_cap, 0.04);
        assert_eq!(config.filter.voxel_leaf_size, 0.0);
        assert_eq!(config.persistence.map_file, "map.ply");
    }

    #[test]
    fn test_missing_required_key_is_parse_error() {
        let without = MINIMAL.replace("proximity_threshold = 2.0\n", "");
        let err = SetuConfig::from_toml(&without).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse(_)));
        assert!(err.to_string().contains("proximity_threshold"));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let without = MINIMAL.replace(
            "[icp]\ntf_epsilon = 1e-8\ncorr_dist = 1.0\niterations = 50\n",
            "",
        );
        assert!(matches!(
            SetuConfig::from_toml(&without),
            Err(ConfigLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SetuConfig::default();
        assert!(config.validate().is_ok());

        config.optimizer.relinearize_skip = 0;
        assert!(matches!(config.validate(), Err(ConfigLoadError::Invalid(_))));

        let mut config = SetuConfig::default();
        config.loop_closure.translation_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = SetuConfig::default();
        config.filter.voxel_leaf_size = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_init_prior() {
        let config = SetuConfig::from_toml(MINIMAL).unwrap();
        let pose = config.init_pose();
        assert_relative_eq!(pose.translation().x, 1.0);
        assert_relative_eq!(pose.translation().y, 2.0);
        assert_relative_eq!(pose.rotation_angle(), 0.5, epsilon = 1e-12);

        let cov = config.init_covariance();
        assert_relative_eq!(cov[(0, 0)], 0.01, epsilon = 1e-12);
        assert_relative_eq!(cov[(5, 5)], 0.0004, epsilon = 1e-12);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SetuConfig::load(Path::new("/nonexistent/setu.toml")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Io(_)));
    }
}
