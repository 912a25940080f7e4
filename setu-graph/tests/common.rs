//! Test utilities for SetuGraph integration tests.
//!
//! Mock collaborators record what the session asks of them through shared
//! handles, so a test can keep inspecting them after the session takes
//! ownership.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nalgebra::Point3;
use setu_graph::config::{LoopClosureSection, SetuConfig};
use setu_graph::io::{EdgeSegment, GraphPublisher, PoseGraphMessage};
use setu_graph::optimizer::{Factor, OptimizerError, PoseOptimizer, Values};
use setu_graph::registration::{Registrar, RegistrationFailure, RegistrationResult};
use setu_graph::{Covariance6, Key, PointCloud3D, Pose3D, covariance_from_sigmas};

// ============================================================================
// Configuration
// ============================================================================

/// Small windows so short synthetic graphs exercise every rule.
pub fn test_config() -> SetuConfig {
    SetuConfig {
        loop_closure: LoopClosureSection {
            check_for_loop_closures: true,
            translation_threshold: 0.5,
            proximity_threshold: 1.0,
            max_tolerable_fitness: 0.1,
            skip_recent_poses: 3,
            poses_before_reclosing: 5,
            scan_all_candidates: false,
        },
        ..SetuConfig::default()
    }
}

pub fn odometry_covariance() -> Covariance6 {
    covariance_from_sigmas(&[0.01; 6])
}

pub fn translation(x: f64, y: f64) -> Pose3D {
    Pose3D::from_translation(x, y, 0.0)
}

// ============================================================================
// Optimizer
// ============================================================================

/// Dead-reckoning optimizer: keeps every prediction as the solution.
///
/// Rejects the same inputs a real solver would (duplicate keys, factors on
/// unknown keys) and can be told to fail every update.
#[derive(Clone, Default)]
pub struct RecordingOptimizer {
    pub values: Arc<Mutex<Values>>,
    pub updates: Arc<Mutex<Vec<Vec<Factor>>>>,
    pub fail_updates: Arc<AtomicBool>,
}

impl RecordingOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factors submitted so far, flattened.
    pub fn factors(&self) -> Vec<Factor> {
        self.updates.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl PoseOptimizer for RecordingOptimizer {
    fn initialize(
        &mut self,
        prior_pose: Pose3D,
        _prior_covariance: Covariance6,
    ) -> Result<Values, OptimizerError> {
        let mut values = self.values.lock().unwrap();
        if !values.is_empty() {
            return Err(OptimizerError::AlreadyInitialized);
        }
        values.insert(0, prior_pose);
        Ok(values.clone())
    }

    fn update(
        &mut self,
        factors: Vec<Factor>,
        predictions: Values,
    ) -> Result<Values, OptimizerError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(OptimizerError::SolveFailed);
        }

        let mut values = self.values.lock().unwrap();
        if values.is_empty() {
            return Err(OptimizerError::NotInitialized);
        }
        if let Some(key) = predictions.keys().find(|k| values.contains_key(*k)) {
            return Err(OptimizerError::DuplicateKey(*key));
        }
        for factor in &factors {
            if let Some(key) = factor
                .keys()
                .into_iter()
                .find(|k| !values.contains_key(k) && !predictions.contains_key(k))
            {
                return Err(OptimizerError::UnknownKey(key));
            }
        }

        values.extend(predictions);
        self.updates.lock().unwrap().push(factors);
        Ok(values.clone())
    }
}

// ============================================================================
// Registrar
// ============================================================================

/// Registrar returning a fixed outcome and counting calls.
#[derive(Clone)]
pub struct ScriptedRegistrar {
    pub transform: Pose3D,
    pub fitness_score: f64,
    pub converged: bool,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedRegistrar {
    /// Converges with a good fitness.
    pub fn accepting() -> Self {
        Self {
            transform: Pose3D::identity(),
            fitness_score: 0.01,
            converged: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Converges, but the fitness is far above any sane bound.
    pub fn poor_fitness() -> Self {
        Self {
            fitness_score: 5.0,
            ..Self::accepting()
        }
    }

    pub fn diverging() -> Self {
        Self {
            converged: false,
            ..Self::accepting()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Registrar for ScriptedRegistrar {
    fn register(
        &self,
        _source: &PointCloud3D,
        _target: &PointCloud3D,
    ) -> Result<RegistrationResult, RegistrationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RegistrationResult {
            transform: self.transform,
            fitness_score: self.fitness_score,
            converged: self.converged,
            iterations: 1,
        })
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Everything a [`RecordingPublisher`] received.
#[derive(Debug, Default)]
pub struct PublishedData {
    pub keyed_scans: Vec<Key>,
    pub closure_scans: usize,
    pub closures: Vec<(Key, Key)>,
    pub odometry_edges: Vec<EdgeSegment>,
    pub loop_edges: Vec<EdgeSegment>,
    pub graph_nodes: Vec<Point3<f64>>,
    pub keyframe_nodes: Vec<Point3<f64>>,
    pub closure_area: Option<f64>,
    pub graphs: Vec<PoseGraphMessage>,
}

#[derive(Clone)]
pub struct RecordingPublisher {
    pub subscribed: bool,
    pub data: Arc<Mutex<PublishedData>>,
}

impl RecordingPublisher {
    pub fn new(subscribed: bool) -> Self {
        Self {
            subscribed,
            data: Arc::new(Mutex::new(PublishedData::default())),
        }
    }
}

impl GraphPublisher for RecordingPublisher {
    fn has_subscribers(&self) -> bool {
        self.subscribed
    }

    fn publish_keyed_scan(&mut self, key: Key, _scan: &PointCloud3D) {
        self.data.lock().unwrap().keyed_scans.push(key);
    }

    fn publish_closure_scans(&mut self, _source: &PointCloud3D, _target: &PointCloud3D) {
        self.data.lock().unwrap().closure_scans += 1;
    }

    fn notify_loop_closure(&mut self, key: Key, other: Key) {
        self.data.lock().unwrap().closures.push((key, other));
    }

    fn publish_odometry_edges(&mut self, segments: &[EdgeSegment]) {
        self.data.lock().unwrap().odometry_edges = segments.to_vec();
    }

    fn publish_loop_edges(&mut self, segments: &[EdgeSegment]) {
        self.data.lock().unwrap().loop_edges = segments.to_vec();
    }

    fn publish_graph_nodes(&mut self, positions: &[Point3<f64>]) {
        self.data.lock().unwrap().graph_nodes = positions.to_vec();
    }

    fn publish_keyframe_nodes(&mut self, positions: &[Point3<f64>]) {
        self.data.lock().unwrap().keyframe_nodes = positions.to_vec();
    }

    fn publish_closure_area(&mut self, radius: f64) {
        self.data.lock().unwrap().closure_area = Some(radius);
    }

    fn publish_pose_graph(&mut self, graph: &PoseGraphMessage) {
        self.data.lock().unwrap().graphs.push(graph.clone());
    }
}

// ============================================================================
// Scans
// ============================================================================

/// A handful of body-frame points stamped with `timestamp_us`.
pub fn small_scan(timestamp_us: u64) -> PointCloud3D {
    PointCloud3D::from_points(
        vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ],
        timestamp_us,
    )
}

/// Three orthogonal `n x n` grids meeting at the origin (a room corner).
pub fn corner_cloud(n: usize, spacing: f64) -> PointCloud3D {
    let mut cloud = PointCloud3D::with_capacity(3 * n * n);
    for i in 0..n {
        for j in 0..n {
            cloud.push(Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
        }
    }
    for i in 0..n {
        for k in 1..n {
            cloud.push(Point3::new(i as f64 * spacing, 0.0, k as f64 * spacing));
        }
    }
    for j in 1..n {
        for k in 1..n {
            cloud.push(Point3::new(0.0, j as f64 * spacing, k as f64 * spacing));
        }
    }
    cloud
}

/// What a sensor at `pose` sees of a static `world` cloud.
pub fn observe(world: &PointCloud3D, pose: &Pose3D, timestamp_us: u64) -> PointCloud3D {
    let mut scan = world.transform(&pose.inverse());
    scan.timestamp_us = timestamp_us;
    scan
}
