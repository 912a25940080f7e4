//! Synthetic clouds for registration tests.

use nalgebra::Point3;

use crate::core::types::PointCloud3D;

/// Three orthogonal `n x n` grids meeting at the origin (a room corner).
///
/// Every point is unique, and the shape constrains all six degrees of
/// freedom.
pub fn corner_cloud(n: usize, spacing: f64) -> PointCloud3D {
    let mut cloud = PointCloud3D::with_capacity(3 * n * n);
    for i in 0..n {
        for j in 0..n {
            // Floor
            cloud.push(Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
        }
    }
    for i in 0..n {
        for k in 1..n {
            // Wall along x
            cloud.push(Point3::new(i as f64 * spacing, 0.0, k as f64 * spacing));
        }
    }
    for j in 1..n {
        for k in 1..n {
            // Wall along y
            cloud.push(Point3::new(0.0, j as f64 * spacing, k as f64 * spacing));
        }
    }
    cloud
}
