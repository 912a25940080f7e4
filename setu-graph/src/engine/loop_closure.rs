//! Loop closure detection for pose graph SLAM.
//!
//! Detects when the robot revisits a previously mapped area by comparing the
//! scan of a new keyframe with the scans of earlier keyframes.
//!
//! # Detection Strategy
//!
//! 1. **Cooldown**: skip the search while the query key is within
//!    `poses_before_reclosing` of the last accepted closure
//! 2. **Candidate pruning**: skip the query itself, keys within
//!    `skip_recent_poses`, and keys without a stored scan
//! 3. **Proximity**: the solved poses must lie strictly between 0 and
//!    `proximity_threshold` apart
//! 4. **Geometric verification**: the registrar must converge with a fitness
//!    no worse than `max_tolerable_fitness`
//!
//! A candidate that fails step 3 or 4 ends the search for this call unless
//! `scan_all_candidates` is set, in which case it is skipped.

use crate::config::LoopClosureSection;
use crate::core::types::{Covariance6, Key, PointCloud3D, Pose3D};
use crate::error::{GraphError, Result};
use crate::registration::{Registrar, ScanRegistration};

use super::covariance::ConstraintCovarianceEstimator;
use super::store::PoseGraphStore;

/// An accepted loop closure, not yet committed to the graph.
#[derive(Debug, Clone)]
pub struct LoopClosure {
    /// Query key.
    pub key: Key,

    /// Matched earlier key.
    pub other: Key,

    /// Constraint from `key` to `other`.
    pub delta: Pose3D,

    /// Constraint covariance.
    pub covariance: Covariance6,

    /// Registrar fitness score.
    pub fitness_score: f64,

    /// Query scan in the fixed frame.
    pub source: PointCloud3D,

    /// Matched scan in the fixed frame.
    pub target: PointCloud3D,
}

/// Proximity-based loop closure detector.
#[derive(Debug, Clone)]
pub struct LoopClosureDetector {
    enabled: bool,
    proximity_threshold: f64,
    skip_recent_poses: u64,
    poses_before_reclosing: u64,
    scan_all_candidates: bool,

    /// Key at which the most recent closure was accepted.
    last_closure_key: Option<Key>,
}

impl LoopClosureDetector {
    pub fn new(config: &LoopClosureSection) -> Self {
        Self {
            enabled: config.check_for_loop_closures,
            proximity_threshold: config.proximity_threshold,
            skip_recent_poses: config.skip_recent_poses,
            poses_before_reclosing: config.poses_before_reclosing,
            scan_all_candidates: config.scan_all_candidates,
            last_closure_key: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn proximity_threshold(&self) -> f64 {
        self.proximity_threshold
    }

    pub fn last_closure_key(&self) -> Option<Key> {
        self.last_closure_key
    }

    /// True while `key` is too close to the last accepted closure.
    pub fn in_cooldown(&self, key: Key) -> bool {
        self.last_closure_key
            .is_some_and(|last| key.abs_diff(last) < self.poses_before_reclosing)
    }

    /// True if `other` may be proposed as a candidate for `key`.
    pub fn is_eligible(&self, key: Key, other: Key) -> bool {
        other != key && key.abs_diff(other) >= self.skip_recent_poses
    }

    /// Mark a closure accepted at `key`. Never moves backwards.
    pub fn record_closure(&mut self, key: Key) {
        self.last_closure_key = Some(self.last_closure_key.map_or(key, |last| last.max(key)));
    }

    /// Search earlier keyframes for closures with `key`.
    ///
    /// Does not modify the graph; the caller commits the returned closures.
    pub fn detect<R: Registrar>(
        &self,
        key: Key,
        store: &PoseGraphStore,
        registration: &ScanRegistration<R>,
        estimator: &ConstraintCovarianceEstimator,
    ) -> Result<Vec<LoopClosure>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        if self.in_cooldown(key) {
            log::debug!(
                "Key {} within {} poses of last closure {:?}, skipping search",
                key,
                self.poses_before_reclosing,
                self.last_closure_key
            );
            return Ok(Vec::new());
        }

        let pose1 = *store.pose(key).ok_or(GraphError::UnknownKey(key))?;
        let scan1 = store.scan(key).ok_or(GraphError::MissingScan(key))?;

        let mut closures = Vec::new();

        for (&other, pose2) in store.values() {
            if !self.is_eligible(key, other) {
                continue;
            }
            let Some(scan2) = store.scan(other) else {
                continue;
            };

            let distance = pose1.between(pose2).translation_norm();
            if !(distance > 0.0 && distance < self.proximity_threshold) {
                log::debug!(
                    "Candidate {} for key {} is {:.3}m away (limit {:.3}m)",
                    other,
                    key,
                    distance,
                    self.proximity_threshold
                );
                if self.scan_all_candidates {
                    continue;
                }
                break;
            }

            match registration.align(scan1, scan2, &pose1, pose2) {
                Ok(alignment) => {
                    let covariance = estimator.estimate(&alignment.transform, &pose1, pose2);
                    closures.push(LoopClosure {
                        key,
                        other,
                        delta: alignment.delta,
                        covariance,
                        fitness_score: alignment.fitness_score,
                        source: alignment.source,
                        target: alignment.target,
                    });
                }
                Err(reason) => {
                    log::debug!("Rejected candidate {} for key {}: {}", other, key, reason);
                    if !self.scan_all_candidates {
                        break;
                    }
                }
            }
        }

        Ok(closures)
    }
}
