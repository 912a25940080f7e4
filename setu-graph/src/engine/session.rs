//! Pose graph session.
//!
//! Owns every piece of mutable graph state: the optimizer, the cached solved
//! poses, the odometry accumulator and the loop-closure cooldown. All
//! operations are synchronous; callers serialize access.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► initialize() ──► add_between_factor() ─┬─► add_key_scan_pair()
//!                 ▲                 (keyframe?) ───┘          │
//!                 │                                           ▼
//!           prior on key 0                          find_loop_closures()
//! ```

use std::path::Path;

use nalgebra::Point3;

use crate::config::SetuConfig;
use crate::core::types::{Covariance6, Key, PointCloud3D, Pose3D};
use crate::error::{GraphError, Result};
use crate::io::{GraphPublisher, MapSink, PoseGraphMessage};
use crate::optimizer::{Factor, GaussNewtonOptimizer, PoseOptimizer, Values};
use crate::registration::{PointToPointIcp, Registrar, ScanRegistration, VoxelFilter};

use super::covariance::ConstraintCovarianceEstimator;
use super::loop_closure::LoopClosureDetector;
use super::odometry::OdometryIntegrator;
use super::store::PoseGraphStore;

/// Format of the timestamp handed to map sinks.
const SAVE_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

type BoxedPublisher = Box<dyn GraphPublisher + Send>;
type BoxedSink = Box<dyn MapSink + Send>;

/// Incremental pose graph with loop closure.
pub struct PoseGraphSession<O, R> {
    config: SetuConfig,
    optimizer: O,
    registration: ScanRegistration<R>,
    store: PoseGraphStore,
    odometry: OdometryIntegrator,
    detector: LoopClosureDetector,
    estimator: ConstraintCovarianceEstimator,
    publishers: Vec<BoxedPublisher>,
    sinks: Vec<BoxedSink>,

    /// Key the next odometry step will receive.
    next_key: Key,
    initialized: bool,
}

impl PoseGraphSession<GaussNewtonOptimizer, PointToPointIcp> {
    /// Initialized session using the bundled optimizer and ICP.
    pub fn from_config(config: SetuConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| GraphError::Initialization(e.to_string()))?;
        let optimizer = GaussNewtonOptimizer::new(config.optimizer_config());
        let registrar = PointToPointIcp::new(config.icp_config());
        let mut session = Self::new(config, optimizer, registrar);
        session
            .initialize()
            .map_err(|e| GraphError::Initialization(e.to_string()))?;
        Ok(session)
    }

    /// Load a TOML config and build an initialized session from it.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config =
            SetuConfig::load(path).map_err(|e| GraphError::Initialization(e.to_string()))?;
        Self::from_config(config)
    }
}

impl<O: PoseOptimizer, R: Registrar> PoseGraphSession<O, R> {
    /// Uninitialized session. Call [`initialize`](Self::initialize) before
    /// anything else.
    pub fn new(config: SetuConfig, optimizer: O, registrar: R) -> Self {
        let registration = ScanRegistration::new(
            registrar,
            VoxelFilter::new(config.filter.voxel_leaf_size),
            config.loop_closure.max_tolerable_fitness,
        );
        let odometry = OdometryIntegrator::new(config.loop_closure.translation_threshold);
        let detector = LoopClosureDetector::new(&config.loop_closure);
        let estimator = ConstraintCovarianceEstimator::new(
            config.covariance.translation_cap,
            config.covariance.rotation_cap,
        );

        Self {
            config,
            optimizer,
            registration,
            store: PoseGraphStore::new(),
            odometry,
            detector,
            estimator,
            publishers: Vec::new(),
            sinks: Vec::new(),
            next_key: 0,
            initialized: false,
        }
    }

    /// Submit the prior on key 0 and cache the solved estimate.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(GraphError::InvalidArgument(
                "session is already initialized".to_string(),
            ));
        }

        let pose = self.config.init_pose();
        let covariance = self.config.init_covariance();
        let values = self.optimizer.initialize(pose, covariance)?;
        if !values.contains_key(&0) {
            return Err(GraphError::Initialization(
                "optimizer returned no estimate for key 0".to_string(),
            ));
        }

        self.store.set_values(values);
        self.odometry.reset();
        self.next_key = 1;
        self.initialized = true;

        log::info!(
            "Pose graph initialized at ({:.3}, {:.3}, {:.3})",
            pose.translation().x,
            pose.translation().y,
            pose.translation().z
        );
        Ok(())
    }

    // ========================================================================
    // Graph building
    // ========================================================================

    /// Append a pose linked to the previous one by `delta`.
    ///
    /// Returns the new key and whether it is a keyframe. On error nothing
    /// changes, including the odometry accumulator.
    pub fn add_between_factor(
        &mut self,
        delta: &Pose3D,
        covariance: &Covariance6,
        timestamp_us: u64,
    ) -> Result<(Key, bool)> {
        self.ensure_initialized()?;

        let prev = self.next_key - 1;
        let key = self.next_key;
        let prev_pose = *self.store.pose(prev).ok_or(GraphError::UnknownKey(prev))?;

        let factor = Factor::Between {
            from: prev,
            to: key,
            measurement: *delta,
            covariance: *covariance,
        };
        let mut prediction = Values::new();
        prediction.insert(key, prev_pose.compose(delta));

        let values = self.optimizer.update(vec![factor], prediction)?;
        self.store.set_values(values);
        self.store.insert_stamp(key, timestamp_us);
        self.store.add_odometry_edge(prev, key);
        self.next_key += 1;

        let is_keyframe = self.odometry.integrate(delta);
        if is_keyframe {
            log::debug!("Key {} is a keyframe", key);
        }
        Ok((key, is_keyframe))
    }

    /// Store the scan captured at keyframe `key`.
    ///
    /// Key 0 takes its stamp from the scan if it has none yet.
    pub fn add_key_scan_pair(&mut self, key: Key, scan: PointCloud3D) -> Result<()> {
        self.ensure_initialized()?;

        if self.store.has_scan(key) {
            log::error!("Key {} already has a scan", key);
            return Err(GraphError::AlreadyExists(key));
        }

        let timestamp_us = scan.timestamp_us;
        self.store.insert_scan(key, scan)?;
        if key == 0 {
            self.store.insert_stamp(0, timestamp_us);
        }

        if let Some(scan) = self.store.scan(key) {
            for_each_subscribed(&mut self.publishers, |p| p.publish_keyed_scan(key, scan));
        }
        Ok(())
    }

    /// Search for loop closures with keyframe `key` and commit the accepted
    /// ones. Returns the matched keys.
    pub fn find_loop_closures(&mut self, key: Key) -> Result<Vec<Key>> {
        self.ensure_initialized()?;

        let closures =
            self.detector
                .detect(key, &self.store, &self.registration, &self.estimator)?;
        if closures.is_empty() {
            return Ok(Vec::new());
        }

        let factors = closures
            .iter()
            .map(|c| Factor::Between {
                from: c.key,
                to: c.other,
                measurement: c.delta,
                covariance: c.covariance,
            })
            .collect();
        let values = self.optimizer.update(factors, Values::new())?;
        self.store.set_values(values);

        let mut matched = Vec::with_capacity(closures.len());
        for closure in &closures {
            self.store.add_loop_edge(closure.key, closure.other);
            log::info!(
                "Closed loop between poses {} and {} (fitness {:.4})",
                closure.key,
                closure.other,
                closure.fitness_score
            );
            for_each_subscribed(&mut self.publishers, |p| {
                p.publish_closure_scans(&closure.source, &closure.target);
                p.notify_loop_closure(closure.key, closure.other);
            });
            matched.push(closure.other);
        }
        self.detector.record_closure(key);

        Ok(matched)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Solved pose of the most recent key.
    pub fn get_last_pose(&self) -> Result<Pose3D> {
        self.ensure_initialized()?;
        self.store
            .last_pose()
            .ok_or_else(|| GraphError::InvalidArgument("graph is empty".to_string()))
    }

    /// All keyframe scans in the fixed frame.
    pub fn get_maximum_likelihood_points(&self) -> Result<PointCloud3D> {
        self.ensure_initialized()?;
        Ok(self.store.maximum_likelihood_points())
    }

    pub fn pose_graph_message(&self) -> PoseGraphMessage {
        self.store.pose_graph_message(&self.config.frames.fixed)
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    pub fn add_publisher(&mut self, publisher: BoxedPublisher) {
        self.publishers.push(publisher);
    }

    pub fn add_map_sink(&mut self, sink: BoxedSink) {
        self.sinks.push(sink);
    }

    /// Push edges, nodes and the full graph to subscribed publishers, then
    /// hand the marker cloud to every map sink.
    ///
    /// Sink failures are logged and do not fail the call.
    pub fn publish_pose_graph(&mut self) -> Result<()> {
        self.ensure_initialized()?;

        let odometry = self.store.edge_segments(self.store.odometry_edges());
        let loops = self.store.edge_segments(self.store.loop_edges());
        let nodes = self.store.node_positions(false);
        let keyframes = self.store.node_positions(true);
        let radius = self.detector.proximity_threshold();

        if self.publishers.iter().any(|p| p.has_subscribers()) {
            let message = self.pose_graph_message();
            for_each_subscribed(&mut self.publishers, |p| {
                p.publish_odometry_edges(&odometry);
                p.publish_loop_edges(&loops);
                p.publish_graph_nodes(&nodes);
                p.publish_keyframe_nodes(&keyframes);
                p.publish_closure_area(radius);
                p.publish_pose_graph(&message);
            });
        }

        if self.sinks.is_empty() {
            return Ok(());
        }

        let mut cloud = PointCloud3D::with_capacity(
            2 * (odometry.len() + loops.len()) + nodes.len() + keyframes.len(),
        );
        for segment in odometry.iter().chain(loops.iter()) {
            cloud.push(segment.from);
            cloud.push(segment.to);
        }
        for p in nodes.iter().chain(keyframes.iter()) {
            cloud.push(*p);
        }

        let location = self.robot_location();
        let timestamp = chrono::Local::now().format(SAVE_TIME_FORMAT).to_string();
        for sink in &mut self.sinks {
            if let Err(e) = sink.save(&cloud, location, &timestamp) {
                log::error!("Failed to save map: {}", e);
            }
        }
        Ok(())
    }

    /// End of the last odometry edge, or key 0 before any motion.
    fn robot_location(&self) -> (f64, f64) {
        let key = self
            .store
            .odometry_edges()
            .last()
            .map_or(0, |&(_, to)| to);
        let position = self
            .store
            .pose(key)
            .map(|p| Point3::from(p.translation()))
            .unwrap_or_else(Point3::origin);
        (position.x, position.y)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn store(&self) -> &PoseGraphStore {
        &self.store
    }

    pub fn config(&self) -> &SetuConfig {
        &self.config
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn registrar(&self) -> &R {
        self.registration.registrar()
    }

    /// Key of the most recent accepted closure.
    pub fn last_closure_key(&self) -> Option<Key> {
        self.detector.last_closure_key()
    }

    /// Motion accumulated since the last keyframe.
    pub fn accumulated_odometry(&self) -> &Pose3D {
        self.odometry.accumulated()
    }

    pub fn next_key(&self) -> Key {
        self.next_key
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(GraphError::InvalidArgument(
                "session is not initialized".to_string(),
            ))
        }
    }
}

fn for_each_subscribed(publishers: &mut [BoxedPublisher], mut f: impl FnMut(&mut BoxedPublisher)) {
    for publisher in publishers.iter_mut().filter(|p| p.has_subscribers()) {
        f(publisher);
    }
}
