//! Pose graph storage.
//!
//! Owns the latest solved poses, per-key capture stamps, keyframe scans and
//! the edge lists kept for export. The optimizer holds the authoritative
//! factors; edges here only record which keys are linked.

use std::collections::BTreeMap;

use crate::core::types::{Key, KeyPair, PointCloud3D, Pose3D};
use crate::error::{GraphError, Result};
use crate::optimizer::Values;

/// Graph state shared by the session components.
#[derive(Debug, Clone, Default)]
pub struct PoseGraphStore {
    /// Solved pose per key (cache of the optimizer estimate).
    values: Values,

    /// Capture time per key, microseconds.
    keyed_stamps: BTreeMap<Key, u64>,

    /// Body-frame scan per keyframe key.
    keyed_scans: BTreeMap<Key, PointCloud3D>,

    odometry_edges: Vec<KeyPair>,
    loop_edges: Vec<KeyPair>,
}

impl PoseGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Poses
    // ========================================================================

    /// Solved poses, ordered by key.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Replace the cached estimate with a fresh optimizer solution.
    pub fn set_values(&mut self, values: Values) {
        self.values = values;
    }

    pub fn pose(&self, key: Key) -> Option<&Pose3D> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    /// Number of pose nodes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Highest key with a solved pose.
    pub fn last_key(&self) -> Option<Key> {
        self.values.keys().next_back().copied()
    }

    // ========================================================================
    // Stamps
    // ========================================================================

    pub fn stamp(&self, key: Key) -> Option<u64> {
        self.keyed_stamps.get(&key).copied()
    }

    /// Record the capture time of `key`. Stamps are immutable once set;
    /// returns `false` if one already exists.
    pub fn insert_stamp(&mut self, key: Key, timestamp_us: u64) -> bool {
        if self.keyed_stamps.contains_key(&key) {
            return false;
        }
        self.keyed_stamps.insert(key, timestamp_us);
        true
    }

    // ========================================================================
    // Keyframe scans
    // ========================================================================

    pub fn scan(&self, key: Key) -> Option<&PointCloud3D> {
        self.keyed_scans.get(&key)
    }

    pub fn has_scan(&self, key: Key) -> bool {
        self.keyed_scans.contains_key(&key)
    }

    /// Store the scan for a solved key. Each key takes at most one scan.
    pub fn insert_scan(&mut self, key: Key, scan: PointCloud3D) -> Result<()> {
        if self.keyed_scans.contains_key(&key) {
            return Err(GraphError::AlreadyExists(key));
        }
        if !self.values.contains_key(&key) {
            return Err(GraphError::UnknownKey(key));
        }
        self.keyed_scans.insert(key, scan);
        Ok(())
    }

    /// Keys that carry a scan, ordered.
    pub fn keyframe_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.keyed_scans.keys().copied()
    }

    pub fn num_keyframes(&self) -> usize {
        self.keyed_scans.len()
    }

    // ========================================================================
    // Edges
    // ========================================================================

    pub fn add_odometry_edge(&mut self, from: Key, to: Key) {
        self.odometry_edges.push((from, to));
    }

    pub fn add_loop_edge(&mut self, from: Key, to: Key) {
        self.loop_edges.push((from, to));
    }

    pub fn odometry_edges(&self) -> &[KeyPair] {
        &self.odometry_edges
    }

    pub fn loop_edges(&self) -> &[KeyPair] {
        &self.loop_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn store_with_keys(n: u64) -> PoseGraphStore {
        let mut store = PoseGraphStore::new();
        store.set_values(
            (0..n)
                .map(|k| (k, Pose3D::from_translation(k as f64, 0.0, 0.0)))
                .collect(),
        );
        store
    }

    #[test]
    fn test_last_key() {
        assert_eq!(PoseGraphStore::new().last_key(), None);
        assert_eq!(store_with_keys(3).last_key(), Some(2));
    }

    #[test]
    fn test_stamps_are_write_once() {
        let mut store = store_with_keys(1);
        assert!(store.insert_stamp(0, 10));
        assert!(!store.insert_stamp(0, 20));
        assert_eq!(store.stamp(0), Some(10));
    }

    #[test]
    fn test_duplicate_scan_rejected() {
        let mut store = store_with_keys(2);
        let first = PointCloud3D::from_points(vec![Point3::origin()], 1);
        let second = PointCloud3D::from_points(vec![Point3::new(1.0, 1.0, 1.0)], 2);

        store.insert_scan(1, first.clone()).unwrap();
        assert!(matches!(
            store.insert_scan(1, second),
            Err(GraphError::AlreadyExists(1))
        ));
        assert_eq!(store.scan(1), Some(&first));
    }

    #[test]
    fn test_scan_requires_known_key() {
        let mut store = store_with_keys(1);
        assert!(matches!(
            store.insert_scan(5, PointCloud3D::new()),
            Err(GraphError::UnknownKey(5))
        ));
        assert_eq!(store.num_keyframes(), 0);
    }

    #[test]
    fn test_keyframe_keys_ordered() {
        let mut store = store_with_keys(5);
        store.insert_scan(3, PointCloud3D::new()).unwrap();
        store.insert_scan(0, PointCloud3D::new()).unwrap();
        assert_eq!(store.keyframe_keys().collect::<Vec<_>>(), vec![0, 3]);
    }
}
