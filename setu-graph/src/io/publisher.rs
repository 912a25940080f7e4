//! Observer interface for visualization and downstream consumers.
//!
//! The session pushes graph data to every registered [`GraphPublisher`]
//! that reports subscribers. Publishing never affects graph state.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::core::types::{Key, PointCloud3D, Pose3D};

// ============================================================================
// Messages
// ============================================================================

/// Line segment between two node positions (z flattened to 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeSegment {
    pub from: Point3<f64>,
    pub to: Point3<f64>,
}

/// Kind of constraint an edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Odometry,
    Loop,
}

/// Pose of one node, position plus quaternion `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePose {
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl From<&Pose3D> for NodePose {
    fn from(pose: &Pose3D) -> Self {
        let t = pose.translation();
        let q = pose.rotation();
        Self {
            position: [t.x, t.y, t.z],
            orientation: [q.i, q.j, q.k, q.w],
        }
    }
}

/// One node of the published pose graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseGraphNode {
    pub key: Key,
    pub pose: NodePose,
    /// Capture time in microseconds, if known.
    pub timestamp_us: Option<u64>,
}

/// One edge of the published pose graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseGraphEdge {
    pub key_from: Key,
    pub key_to: Key,
    pub kind: EdgeKind,
}

/// Full pose graph: every solved node, odometry edges then loop edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseGraphMessage {
    pub frame_id: String,
    pub nodes: Vec<PoseGraphNode>,
    pub edges: Vec<PoseGraphEdge>,
}

// ============================================================================
// Publisher
// ============================================================================

/// Receives graph data from the session. Every method has a no-op default.
pub trait GraphPublisher {
    /// Skip all work for this publisher when `false`.
    fn has_subscribers(&self) -> bool {
        true
    }

    /// A keyframe scan was stored (body frame).
    fn publish_keyed_scan(&mut self, _key: Key, _scan: &PointCloud3D) {}

    /// Both scans of an accepted closure, in the fixed frame.
    fn publish_closure_scans(&mut self, _source: &PointCloud3D, _target: &PointCloud3D) {}

    /// A loop closure between `key` and `other` was committed.
    fn notify_loop_closure(&mut self, _key: Key, _other: Key) {}

    fn publish_odometry_edges(&mut self, _segments: &[EdgeSegment]) {}

    fn publish_loop_edges(&mut self, _segments: &[EdgeSegment]) {}

    fn publish_graph_nodes(&mut self, _positions: &[Point3<f64>]) {}

    fn publish_keyframe_nodes(&mut self, _positions: &[Point3<f64>]) {}

    /// Radius of the loop-closure search area around the robot.
    fn publish_closure_area(&mut self, _radius: f64) {}

    fn publish_pose_graph(&mut self, _graph: &PoseGraphMessage) {}
}

/// Publisher that writes a summary of everything it receives to the log.
#[derive(Debug, Default)]
pub struct LogPublisher {
    closures: usize,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loop closures seen so far.
    pub fn closures(&self) -> usize {
        self.closures
    }
}

impl GraphPublisher for LogPublisher {
    fn publish_keyed_scan(&mut self, key: Key, scan: &PointCloud3D) {
        log::debug!("Keyframe {}: {} points", key, scan.len());
    }

    fn notify_loop_closure(&mut self, key: Key, other: Key) {
        self.closures += 1;
        log::info!("Loop closure {} -> {} (total {})", key, other, self.closures);
    }

    fn publish_odometry_edges(&mut self, segments: &[EdgeSegment]) {
        log::debug!("{} odometry edges", segments.len());
    }

    fn publish_loop_edges(&mut self, segments: &[EdgeSegment]) {
        log::debug!("{} loop edges", segments.len());
    }

    fn publish_pose_graph(&mut self, graph: &PoseGraphMessage) {
        log::info!(
            "Pose graph [{}]: {} nodes, {} edges",
            graph.frame_id,
            graph.nodes.len(),
            graph.edges.len()
        );
    }
}
