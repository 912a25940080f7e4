//! Read-only graph queries used by publishers and persistence.

use nalgebra::Point3;

use crate::core::types::{KeyPair, PointCloud3D, Pose3D};
use crate::io::{
    EdgeKind, EdgeSegment, NodePose, PoseGraphEdge, PoseGraphMessage, PoseGraphNode,
};

use super::store::PoseGraphStore;

impl PoseGraphStore {
    /// Solved pose of the highest key.
    ///
    /// With only key 0 in the graph this logs a warning and returns key 0.
    /// `None` only for an empty store.
    pub fn last_pose(&self) -> Option<Pose3D> {
        if self.len() > 1 {
            let key = self.last_key()?;
            self.pose(key).copied()
        } else {
            log::warn!("The graph only contains its initial pose");
            self.pose(0).copied()
        }
    }

    /// Every keyframe scan moved into the fixed frame with its solved pose,
    /// concatenated in key order. Keys without a scan are skipped.
    pub fn maximum_likelihood_points(&self) -> PointCloud3D {
        let mut points = PointCloud3D::new();
        for key in self.keyframe_keys() {
            let (Some(pose), Some(scan)) = (self.pose(key), self.scan(key)) else {
                continue;
            };
            points.extend_from(&scan.transform(pose));
            points.timestamp_us = points.timestamp_us.max(scan.timestamp_us);
        }
        points
    }

    /// Node positions flattened to z = 0. Non-finite positions are skipped.
    pub fn node_positions(&self, keyframes_only: bool) -> Vec<Point3<f64>> {
        self.values()
            .iter()
            .filter(|(key, _)| !keyframes_only || self.has_scan(**key))
            .filter_map(|(key, pose)| {
                let p = flatten(pose);
                if p.is_none() {
                    log::warn!("Skipping non-finite position of key {}", key);
                }
                p
            })
            .collect()
    }

    /// Segments between the solved positions of each edge (z = 0).
    pub fn edge_segments(&self, edges: &[KeyPair]) -> Vec<EdgeSegment> {
        edges
            .iter()
            .filter_map(|(from, to)| {
                let a = self.pose(*from).and_then(flatten);
                let b = self.pose(*to).and_then(flatten);
                match (a, b) {
                    (Some(from), Some(to)) => Some(EdgeSegment { from, to }),
                    _ => {
                        log::warn!("Skipping edge {} -> {} with invalid pose", from, to);
                        None
                    }
                }
            })
            .collect()
    }

    /// Full pose graph message: all nodes, then odometry and loop edges.
    pub fn pose_graph_message(&self, frame_id: &str) -> PoseGraphMessage {
        let nodes = self
            .values()
            .iter()
            .map(|(key, pose)| {
                let timestamp_us = self.stamp(*key);
                if timestamp_us.is_none() {
                    log::warn!("Couldn't find timestamp for key {}", key);
                }
                PoseGraphNode {
                    key: *key,
                    pose: NodePose::from(pose),
                    timestamp_us,
                }
            })
            .collect();

        let odometry = self.odometry_edges().iter().map(|e| (e, EdgeKind::Odometry));
        let loops = self.loop_edges().iter().map(|e| (e, EdgeKind::Loop));
        let edges = odometry
            .chain(loops)
            .map(|(&(key_from, key_to), kind)| PoseGraphEdge {
                key_from,
                key_to,
                kind,
            })
            .collect();

        PoseGraphMessage {
            frame_id: frame_id.to_string(),
            nodes,
            edges,
        }
    }
}

fn flatten(pose: &Pose3D) -> Option<Point3<f64>> {
    let t = pose.translation();
    (t.x.is_finite() && t.y.is_finite()).then(|| Point3::new(t.x, t.y, 0.0))
}
