//! Point cloud type for keyframe scans.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::pose::Pose3D;

/// Collection of 3D points in meters with a capture timestamp.
///
/// Keyframe scans are stored in the sensor (body) frame and only moved into
/// the fixed frame when queried or registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud3D {
    /// Points in meters.
    pub points: Vec<Point3<f64>>,
    /// Capture time in microseconds.
    pub timestamp_us: u64,
}

impl PointCloud3D {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            timestamp_us: 0,
        }
    }

    /// Create a cloud from points and a capture time.
    pub fn from_points(points: Vec<Point3<f64>>, timestamp_us: u64) -> Self {
        Self {
            points,
            timestamp_us,
        }
    }

    /// Add a point.
    #[inline]
    pub fn push(&mut self, point: Point3<f64>) {
        self.points.push(point);
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over points.
    pub fn iter(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.points.iter()
    }

    /// Transform every point by `pose`, keeping the timestamp.
    pub fn transform(&self, pose: &Pose3D) -> PointCloud3D {
        PointCloud3D {
            points: self.points.iter().map(|p| pose.transform_point(p)).collect(),
            timestamp_us: self.timestamp_us,
        }
    }

    /// Append all points of `other`.
    pub fn extend_from(&mut self, other: &PointCloud3D) {
        self.points.extend_from_slice(&other.points);
    }

    /// Centroid of the cloud, `None` if empty.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.points.len() as f64))
    }
}
