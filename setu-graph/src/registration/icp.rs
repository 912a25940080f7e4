//! Point-to-Point Iterative Closest Point (ICP) in 3D.
//!
//! ```text
//! Input: Source point cloud S, Target point cloud T
//! Output: Transform T* that aligns S to T
//!
//! 1. S' = S, T* = I
//! 2. For each iteration:
//!    a. Find nearest neighbor in T for each point in S' within corr_dist
//!    b. Compute optimal rigid transform ΔT using SVD (Kabsch)
//!    c. T* = ΔT · T*, S' = T* ⊕ S
//!    d. If |ΔT|² < tf_epsilon, converged
//! 3. Return T* and the fitness score
//! ```
//!
//! Reaching the iteration cap also counts as converged. The fitness score is
//! the mean squared nearest-neighbor distance over all transformed source
//! points, so a partial overlap shows up as a large score rather than as a
//! failure to converge.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, Vector3};

use super::{Registrar, RegistrationFailure, RegistrationResult};
use crate::core::types::{PointCloud3D, Pose3D};

/// Per-index offset added to k-d tree coordinates, relative to the point's
/// largest coordinate magnitude.
///
/// kiddo panics when a bucket fills with points that share a coordinate on
/// the split axis (flat floors, straight walls). A few ulps per index keeps
/// them apart at any scale.
const TREE_JITTER: f64 = 4.0 * f64::EPSILON;

/// Configuration for Point-to-Point ICP.
#[derive(Debug, Clone)]
pub struct IcpConfig {
    /// Convergence threshold on the squared incremental change
    /// (translation² + angle²).
    pub tf_epsilon: f64,

    /// Maximum correspondence distance (meters).
    ///
    /// Point pairs farther than this are rejected as outliers.
    pub corr_dist: f64,

    /// Maximum number of iterations.
    pub max_iterations: u32,

    /// Minimum number of valid correspondences required.
    pub min_correspondences: usize,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            tf_epsilon: 1e-8,
            corr_dist: 1.0,
            max_iterations: 50,
            min_correspondences: 3,
        }
    }
}

/// Point-to-Point ICP registrar.
///
/// Uses a k-d tree over the target for nearest-neighbor queries.
#[derive(Debug, Clone, Default)]
pub struct PointToPointIcp {
    config: IcpConfig,
}

impl PointToPointIcp {
    /// Create a new ICP registrar with the given configuration.
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Target cloud must hold only finite points.
    fn build_kdtree(cloud: &PointCloud3D) -> KdTree<f64, 3> {
        let mut tree: KdTree<f64, 3> = KdTree::new();
        for (i, p) in cloud.iter().enumerate() {
            let scale = p.coords.amax().max(1.0);
            let j = i as f64 * scale * TREE_JITTER;
            tree.add(&[p.x + j, p.y + j, p.z + j], i as u64);
        }
        tree
    }

    /// Pairs of (transformed source point, target point).
    fn find_correspondences(
        &self,
        source: &PointCloud3D,
        target: &PointCloud3D,
        tree: &KdTree<f64, 3>,
        transform: &Pose3D,
    ) -> Vec<(Point3<f64>, Point3<f64>)> {
        let max_dist_sq = self.config.corr_dist * self.config.corr_dist;
        let mut pairs = Vec::with_capacity(source.len());

        for p in source.iter() {
            let q = transform.transform_point(p);
            let nearest = tree.nearest_one::<SquaredEuclidean>(&[q.x, q.y, q.z]);
            if nearest.distance <= max_dist_sq {
                if let Some(t) = target.points.get(nearest.item as usize) {
                    pairs.push((q, *t));
                }
            }
        }

        pairs
    }

    fn fitness(source: &PointCloud3D, tree: &KdTree<f64, 3>, transform: &Pose3D) -> f64 {
        let sum: f64 = source
            .iter()
            .map(|p| {
                let q = transform.transform_point(p);
                tree.nearest_one::<SquaredEuclidean>(&[q.x, q.y, q.z]).distance
            })
            .sum();
        sum / source.len() as f64
    }
}

/// Copy of `cloud` without NaN or infinite points.
fn finite_points(cloud: &PointCloud3D) -> PointCloud3D {
    let points: Vec<_> = cloud
        .iter()
        .filter(|p| p.coords.iter().all(|c| c.is_finite()))
        .copied()
        .collect();
    if points.len() < cloud.len() {
        log::debug!("Dropped {} non-finite points", cloud.len() - points.len());
    }
    PointCloud3D::from_points(points, cloud.timestamp_us)
}

/// Least-squares rigid transform mapping the first point of each pair onto
/// the second (Kabsch with reflection correction).
pub fn kabsch(pairs: &[(Point3<f64>, Point3<f64>)]) -> Option<Pose3D> {
    if pairs.len() < 3 {
        return None;
    }

    let n = pairs.len() as f64;
    let (sum_s, sum_t) = pairs.iter().fold(
        (Vector3::zeros(), Vector3::zeros()),
        |(a, b), (s, t)| (a + s.coords, b + t.coords),
    );
    let cs = sum_s / n;
    let ct = sum_t / n;

    let mut h = Matrix3::zeros();
    for (s, t) in pairs {
        h += (s.coords - cs) * (t.coords - ct).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();

    let mut rotation = v * u.transpose();
    if rotation.determinant() < 0.0 {
        let mut v = v;
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        rotation = v * u.transpose();
    }

    let translation = ct - rotation * cs;
    let pose = Pose3D::from_rotation_matrix(&rotation, translation);
    pose.is_finite().then_some(pose)
}

impl Registrar for PointToPointIcp {
    fn register(
        &self,
        source: &PointCloud3D,
        target: &PointCloud3D,
    ) -> Result<RegistrationResult, RegistrationFailure> {
        let source = &finite_points(source);
        let target = &finite_points(target);
        if source.is_empty() || target.is_empty() {
            return Err(RegistrationFailure::EmptyScan);
        }

        let tree = Self::build_kdtree(target);
        let mut current = Pose3D::identity();
        let mut iterations = 0u32;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let pairs = self.find_correspondences(source, target, &tree, &current);
            let delta = match kabsch(&pairs) {
                Some(delta) if pairs.len() >= self.config.min_correspondences => delta,
                _ => {
                    return Ok(RegistrationResult {
                        transform: current,
                        fitness_score: Self::fitness(source, &tree, &current),
                        converged: false,
                        iterations,
                    });
                }
            };

            current = delta.compose(&current);

            let angle = delta.rotation_angle();
            let change = delta.translation().norm_squared() + angle * angle;
            if change < self.config.tf_epsilon {
                break;
            }
        }

        Ok(RegistrationResult {
            transform: current,
            fitness_score: Self::fitness(source, &tree, &current),
            converged: true,
            iterations,
        })
    }
}
