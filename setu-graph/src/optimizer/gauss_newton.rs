//! Dense Levenberg-Marquardt pose-graph optimizer.
//!
//! Minimizes
//!
//! ```text
//! F(x) = Σ e(x, z)^T * Ω * e(x, z)
//! ```
//!
//! over every pose in the graph, where `Ω` is the inverse of the factor
//! covariance and `e` is the tangent-space residual:
//!
//! - prior:   `e = log(z⁻¹ · xi)`
//! - between: `e = log(z⁻¹ · xi⁻¹ · xj)`
//!
//! Jacobians are computed numerically with central differences through
//! [`Pose3D::retract`], so the solver works directly on SE(3) without
//! hand-derived derivatives. Each iteration solves
//!
//! ```text
//! (H + λ·diag(H)) * Δx = -b
//! ```
//!
//! with a Cholesky factorization and rejects steps that increase the error.
//!
//! The problem is dense (6N × 6N), which is fine for the graph sizes an
//! indoor robot produces between map resets.

use nalgebra::{DMatrix, DVector, Matrix6, Vector6};

use super::{Factor, OptimizerError, PoseOptimizer, Values};
use crate::core::types::{Covariance6, Key, Pose3D, regularize};

/// Step used for numeric Jacobians.
const JACOBIAN_STEP: f64 = 1e-6;

/// Damping above which a step is considered hopeless.
const MAX_LAMBDA: f64 = 1e10;

/// Configuration for the optimizer.
#[derive(Debug, Clone)]
pub struct GaussNewtonConfig {
    /// Relinearize (run the solver) every N updates.
    ///
    /// Updates in between only insert the predicted values.
    pub relinearize_skip: u32,

    /// Relative chi-squared change treated as converged.
    pub relinearize_threshold: f64,

    /// Maximum solver iterations per relinearization.
    pub max_iterations: u32,

    /// Initial Levenberg-Marquardt damping factor.
    pub initial_lambda: f64,
}

impl Default for GaussNewtonConfig {
    fn default() -> Self {
        Self {
            relinearize_skip: 1,
            relinearize_threshold: 0.01,
            max_iterations: 50,
            initial_lambda: 1e-3,
        }
    }
}

/// Result of one relinearization.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Number of iterations performed.
    pub iterations: u32,

    /// Initial chi-squared error.
    pub initial_error: f64,

    /// Final chi-squared error.
    pub final_error: f64,

    /// Reason for termination.
    pub termination_reason: TerminationReason,
}

/// Reason for optimization termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Relative error change below threshold.
    Converged,

    /// Maximum iterations reached.
    MaxIterations,

    /// Damping grew past its bound without an improving step.
    Diverged,

    /// No factor has a non-zero residual.
    NoError,
}

/// Factor with its precomputed information matrix.
#[derive(Debug, Clone)]
struct WeightedFactor {
    factor: Factor,
    information: Matrix6<f64>,
}

/// Batch Levenberg-Marquardt optimizer behind the incremental interface.
pub struct GaussNewtonOptimizer {
    config: GaussNewtonConfig,
    factors: Vec<WeightedFactor>,
    values: Values,
    initialized: bool,
    pending_updates: u32,
    last_result: Option<OptimizationResult>,
}

impl GaussNewtonOptimizer {
    /// Create a new optimizer.
    pub fn new(config: GaussNewtonConfig) -> Self {
        Self {
            config,
            factors: Vec::new(),
            values: Values::new(),
            initialized: false,
            pending_updates: 0,
            last_result: None,
        }
    }

    /// Current estimate.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Number of factors in the problem.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Result of the most recent relinearization.
    pub fn last_result(&self) -> Option<&OptimizationResult> {
        self.last_result.as_ref()
    }

    /// Total chi-squared error at the current estimate.
    pub fn chi_squared(&self) -> f64 {
        compute_chi_squared(&self.factors, &self.values)
    }

    fn weigh(factor: Factor) -> Result<WeightedFactor, OptimizerError> {
        let information = information_from(factor.covariance())?;
        Ok(WeightedFactor {
            factor,
            information,
        })
    }

    /// Optimize all values in place.
    fn optimize(&mut self) -> Result<OptimizationResult, OptimizerError> {
        let initial_error = compute_chi_squared(&self.factors, &self.values);
        if initial_error <= f64::EPSILON {
            return Ok(OptimizationResult {
                iterations: 0,
                initial_error,
                final_error: initial_error,
                termination_reason: TerminationReason::NoError,
            });
        }

        let keys: Vec<Key> = self.values.keys().copied().collect();
        let mut current_error = initial_error;
        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let (h, b) = build_linear_system(&self.factors, &self.values, &keys);

            let dx = match solve_damped(&h, &b, lambda) {
                Some(dx) => dx,
                None => {
                    lambda *= 10.0;
                    if lambda > MAX_LAMBDA {
                        return Err(OptimizerError::SolveFailed);
                    }
                    continue;
                }
            };

            let candidate = apply_update(&self.values, &keys, &dx);
            let new_error = compute_chi_squared(&self.factors, &candidate);

            if !new_error.is_finite() || new_error > current_error {
                // Keep the previous estimate and retry with more damping
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    return Ok(OptimizationResult {
                        iterations,
                        initial_error,
                        final_error: current_error,
                        termination_reason: TerminationReason::Diverged,
                    });
                }
                continue;
            }

            self.values = candidate;
            lambda = (lambda * 0.1).max(1e-10);

            let relative_change = (current_error - new_error).abs() / current_error.max(1e-10);
            current_error = new_error;

            if relative_change < self.config.relinearize_threshold {
                return Ok(OptimizationResult {
                    iterations,
                    initial_error,
                    final_error: current_error,
                    termination_reason: TerminationReason::Converged,
                });
            }
        }

        Ok(OptimizationResult {
            iterations,
            initial_error,
            final_error: current_error,
            termination_reason: TerminationReason::MaxIterations,
        })
    }
}

impl Default for GaussNewtonOptimizer {
    fn default() -> Self {
        Self::new(GaussNewtonConfig::default())
    }
}

impl PoseOptimizer for GaussNewtonOptimizer {
    fn initialize(
        &mut self,
        prior_pose: Pose3D,
        prior_covariance: Covariance6,
    ) -> Result<Values, OptimizerError> {
        if self.initialized {
            return Err(OptimizerError::AlreadyInitialized);
        }

        let prior = Self::weigh(Factor::Prior {
            key: 0,
            pose: prior_pose,
            covariance: prior_covariance,
        })?;

        self.factors.push(prior);
        self.values.insert(0, prior_pose);
        self.initialized = true;
        self.pending_updates = 0;

        Ok(self.values.clone())
    }

    fn update(
        &mut self,
        factors: Vec<Factor>,
        predictions: Values,
    ) -> Result<Values, OptimizerError> {
        if !self.initialized {
            return Err(OptimizerError::NotInitialized);
        }

        // Validate everything before touching state
        for key in predictions.keys() {
            if self.values.contains_key(key) {
                return Err(OptimizerError::DuplicateKey(*key));
            }
        }
        let mut weighted = Vec::with_capacity(factors.len());
        for factor in factors {
            for key in factor.keys() {
                if !self.values.contains_key(&key) && !predictions.contains_key(&key) {
                    return Err(OptimizerError::UnknownKey(key));
                }
            }
            weighted.push(Self::weigh(factor)?);
        }

        let force = weighted.is_empty() && predictions.is_empty();
        let snapshot = self.values.clone();
        let factor_count = self.factors.len();
        let pending = self.pending_updates;

        self.values.extend(predictions);
        self.factors.extend(weighted);
        self.pending_updates += 1;

        if force || self.pending_updates >= self.config.relinearize_skip {
            self.pending_updates = 0;
            match self.optimize() {
                Ok(result) => {
                    log::debug!(
                        "Optimized {} poses in {} iterations: chi2 {:.6} -> {:.6} ({:?})",
                        self.values.len(),
                        result.iterations,
                        result.initial_error,
                        result.final_error,
                        result.termination_reason
                    );
                    self.last_result = Some(result);
                }
                Err(e) => {
                    self.values = snapshot;
                    self.factors.truncate(factor_count);
                    self.pending_updates = pending;
                    return Err(e);
                }
            }
        }

        Ok(self.values.clone())
    }
}

/// Inverse of the regularized covariance.
fn information_from(covariance: &Covariance6) -> Result<Matrix6<f64>, OptimizerError> {
    let information = regularize(covariance)
        .try_inverse()
        .ok_or(OptimizerError::SingularCovariance)?;
    if information.iter().all(|v| v.is_finite()) {
        Ok(information)
    } else {
        Err(OptimizerError::SingularCovariance)
    }
}

#[inline]
fn prior_error(measurement: &Pose3D, x: &Pose3D) -> Vector6<f64> {
    Vector6::from(measurement.between(x).local_coordinates())
}

#[inline]
fn between_error(measurement: &Pose3D, xi: &Pose3D, xj: &Pose3D) -> Vector6<f64> {
    Vector6::from(measurement.between(&xi.between(xj)).local_coordinates())
}

/// Residual of a factor at the given values, `None` if a key is missing.
fn factor_error(factor: &Factor, values: &Values) -> Option<Vector6<f64>> {
    match factor {
        Factor::Prior { key, pose, .. } => Some(prior_error(pose, values.get(key)?)),
        Factor::Between {
            from,
            to,
            measurement,
            ..
        } => Some(between_error(measurement, values.get(from)?, values.get(to)?)),
    }
}

fn compute_chi_squared(factors: &[WeightedFactor], values: &Values) -> f64 {
    factors
        .iter()
        .filter_map(|wf| {
            let e = factor_error(&wf.factor, values)?;
            Some((e.transpose() * wf.information * e)[(0, 0)])
        })
        .sum()
}

/// Central-difference Jacobian of `f` with respect to a right perturbation
/// of `pose`.
fn numeric_jacobian<F>(pose: &Pose3D, f: F) -> Matrix6<f64>
where
    F: Fn(&Pose3D) -> Vector6<f64>,
{
    let mut jacobian = Matrix6::zeros();
    for k in 0..6 {
        let mut delta = [0.0; 6];
        delta[k] = JACOBIAN_STEP;
        let plus = f(&pose.retract(&delta));
        delta[k] = -JACOBIAN_STEP;
        let minus = f(&pose.retract(&delta));
        jacobian.set_column(k, &((plus - minus) / (2.0 * JACOBIAN_STEP)));
    }
    jacobian
}

fn index_of(keys: &[Key], key: Key) -> Option<usize> {
    keys.binary_search(&key).ok()
}

fn add_block(h: &mut DMatrix<f64>, row: usize, col: usize, block: &Matrix6<f64>) {
    let mut view = h.fixed_view_mut::<6, 6>(row * 6, col * 6);
    view += block;
}

fn add_segment(b: &mut DVector<f64>, row: usize, segment: &Vector6<f64>) {
    let mut view = b.fixed_rows_mut::<6>(row * 6);
    view += segment;
}

/// Build the linear system H * dx = -b.
fn build_linear_system(
    factors: &[WeightedFactor],
    values: &Values,
    keys: &[Key],
) -> (DMatrix<f64>, DVector<f64>) {
    let dim = keys.len() * 6;
    let mut h = DMatrix::zeros(dim, dim);
    let mut b = DVector::zeros(dim);

    for wf in factors {
        let omega = &wf.information;
        match &wf.factor {
            Factor::Prior { key, pose, .. } => {
                let (Some(i), Some(x)) = (index_of(keys, *key), values.get(key)) else {
                    continue;
                };
                let e = prior_error(pose, x);
                let j = numeric_jacobian(x, |p| prior_error(pose, p));
                let jt_omega = j.transpose() * omega;

                add_block(&mut h, i, i, &(jt_omega * j));
                add_segment(&mut b, i, &(jt_omega * e));
            }
            Factor::Between {
                from,
                to,
                measurement,
                ..
            } => {
                let (Some(i), Some(j_idx)) = (index_of(keys, *from), index_of(keys, *to)) else {
                    continue;
                };
                let (Some(xi), Some(xj)) = (values.get(from), values.get(to)) else {
                    continue;
                };

                let e = between_error(measurement, xi, xj);
                let ji = numeric_jacobian(xi, |p| between_error(measurement, p, xj));
                let jj = numeric_jacobian(xj, |p| between_error(measurement, xi, p));
                let ji_omega = ji.transpose() * omega;
                let jj_omega = jj.transpose() * omega;

                add_block(&mut h, i, i, &(ji_omega * ji));
                add_block(&mut h, i, j_idx, &(ji_omega * jj));
                add_block(&mut h, j_idx, i, &(jj_omega * ji));
                add_block(&mut h, j_idx, j_idx, &(jj_omega * jj));
                add_segment(&mut b, i, &(ji_omega * e));
                add_segment(&mut b, j_idx, &(jj_omega * e));
            }
        }
    }

    (h, b)
}

/// Solve (H + λ·diag(H)) dx = -b.
fn solve_damped(h: &DMatrix<f64>, b: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut damped = h.clone();
    for i in 0..h.nrows() {
        damped[(i, i)] += lambda * h[(i, i)].max(1e-9);
    }
    let dx = damped.cholesky()?.solve(&(-b));
    dx.iter().all(|v| v.is_finite()).then_some(dx)
}

fn apply_update(values: &Values, keys: &[Key], dx: &DVector<f64>) -> Values {
    keys.iter()
        .enumerate()
        .filter_map(|(i, key)| {
            let pose = values.get(key)?;
            let s = dx.fixed_rows::<6>(i * 6);
            Some((*key, pose.retract(&[s[0], s[1], s[2], s[3], s[4], s[5]])))
        })
        .collect()
}
