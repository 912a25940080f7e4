//! 6x6 covariance helpers.
//!
//! Ordering is translation first: `[x, y, z, roll, pitch, yaw]`.

use nalgebra::{Matrix6, Vector6};

/// 6x6 covariance of a rigid-body measurement.
pub type Covariance6 = Matrix6<f64>;

/// Smallest variance allowed on a diagonal entry.
///
/// Keeps information matrices finite when a caller supplies zero sigmas.
pub const MIN_VARIANCE: f64 = 1e-9;

/// Diagonal covariance from per-axis standard deviations.
pub fn covariance_from_sigmas(sigmas: &[f64; 6]) -> Covariance6 {
    let variances = Vector6::from_iterator(sigmas.iter().map(|s| s * s));
    Matrix6::from_diagonal(&variances)
}

/// Diagonal covariance from per-axis variances.
pub fn covariance_from_variances(variances: &[f64; 6]) -> Covariance6 {
    Matrix6::from_diagonal(&Vector6::from_column_slice(variances))
}

/// Symmetrize and floor the diagonal so the matrix can be inverted.
pub fn regularize(covariance: &Covariance6) -> Covariance6 {
    let mut out = (covariance + covariance.transpose()) * 0.5;
    for i in 0..6 {
        let v = out[(i, i)];
        if v.is_nan() || v < MIN_VARIANCE {
            out[(i, i)] = MIN_VARIANCE;
        }
    }
    out
}
