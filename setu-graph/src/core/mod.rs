//! Core foundation layer.
//!
//! Bottom layer with no internal dependencies.
//!
//! # Contents
//!
//! - [`types`]: Poses, point clouds, covariances and keys
//! - [`math`]: Numerical helpers used by the covariance estimator

pub mod math;
pub mod types;
