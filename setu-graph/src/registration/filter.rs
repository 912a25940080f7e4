//! Voxel grid downsampling.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

use crate::core::types::PointCloud3D;

/// Replaces all points inside each occupied voxel with their centroid.
///
/// A leaf size of 0 disables the filter and returns the input unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelFilter {
    leaf_size: f64,
}

impl VoxelFilter {
    /// Create a filter with the given voxel edge length (meters).
    pub fn new(leaf_size: f64) -> Self {
        Self {
            leaf_size: if leaf_size.is_finite() { leaf_size.max(0.0) } else { 0.0 },
        }
    }

    /// Pass-through filter.
    pub fn disabled() -> Self {
        Self { leaf_size: 0.0 }
    }

    /// Voxel edge length.
    pub fn leaf_size(&self) -> f64 {
        self.leaf_size
    }

    /// True if the filter changes its input.
    pub fn is_enabled(&self) -> bool {
        self.leaf_size > 0.0
    }

    /// Downsample a cloud. Output is ordered by voxel index.
    pub fn apply(&self, cloud: &PointCloud3D) -> PointCloud3D {
        if !self.is_enabled() {
            return cloud.clone();
        }

        let inv = 1.0 / self.leaf_size;
        let mut voxels: BTreeMap<(i64, i64, i64), (Vector3<f64>, usize)> = BTreeMap::new();

        for p in cloud.iter() {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                continue;
            }
            let index = (
                (p.x * inv).floor() as i64,
                (p.y * inv).floor() as i64,
                (p.z * inv).floor() as i64,
            );
            let entry = voxels.entry(index).or_insert((Vector3::zeros(), 0));
            entry.0 += p.coords;
            entry.1 += 1;
        }

        let points = voxels
            .into_values()
            .map(|(sum, count)| Point3::from(sum / count as f64))
            .collect();

        PointCloud3D::from_points(points, cloud.timestamp_us)
    }
}

impl Default for VoxelFilter {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_disabled_is_passthrough() {
        let cloud = PointCloud3D::from_points(vec![Point3::new(0.01, 0.0, 0.0); 3], 7);
        let out = VoxelFilter::disabled().apply(&cloud);
        assert_eq!(out, cloud);
        assert!(!VoxelFilter::new(-1.0).is_enabled());
    }

    #[test]
    fn test_merges_points_in_voxel() {
        let cloud = PointCloud3D::from_points(
            vec![
                Point3::new(0.01, 0.01, 0.01),
                Point3::new(0.03, 0.03, 0.03),
                Point3::new(0.51, 0.0, 0.0),
            ],
            9,
        );
        let out = VoxelFilter::new(0.1).apply(&cloud);
        assert_eq!(out.len(), 2);
        assert_eq!(out.timestamp_us, 9);
        assert_relative_eq!(out.points[0], Point3::new(0.02, 0.02, 0.02), epsilon = 1e-12);
    }

    #[test]
    fn test_drops_non_finite() {
        let cloud = PointCloud3D::from_points(
            vec![Point3::new(f64::NAN, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)],
            0,
        );
        assert_eq!(VoxelFilter::new(0.5).apply(&cloud).len(), 1);
    }
}
