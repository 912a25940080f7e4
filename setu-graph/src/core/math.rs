//! Numerical helpers for the loop-closure covariance estimate.
//!
//! The covariance estimator scales a raw dispersion value into its cap by
//! repeated multiplication with an attenuation factor. The factor is derived
//! from a windowed integral: a cosine-tapered Haar window integrated with the
//! composite Simpson 3/8 rule.

use std::f64::consts::FRAC_PI_2;

/// Number of intervals used by [`windowed_integral`] (multiple of 3).
const WINDOW_INTERVALS: usize = 99;

/// Dilation of the Haar window.
pub const WINDOW_DILATION: f64 = 2.0;

/// Location of the Haar window.
pub const WINDOW_LOCATION: f64 = 1.0;

/// Bounds on the attenuation factor.
pub const MIN_ATTENUATION: f64 = 0.1;
pub const MAX_ATTENUATION: f64 = 0.9;

/// Composite Simpson 3/8 rule over equally spaced samples.
///
/// Requires `3k + 1` samples (k ≥ 1). Returns `None` otherwise.
pub fn simpson_3_8(samples: &[f64], step: f64) -> Option<f64> {
    let n = samples.len();
    if n < 4 || (n - 1) % 3 != 0 {
        return None;
    }

    let mut sum = samples[0] + samples[n - 1];
    for (i, v) in samples.iter().enumerate().take(n - 1).skip(1) {
        sum += if i % 3 == 0 { 2.0 * v } else { 3.0 * v };
    }

    Some(3.0 * step / 8.0 * sum)
}

/// Haar-style window: +1 inside `[location - dilation/2, dilation]`,
/// -1 inside `[dilation, location - dilation/2]`, 0 elsewhere.
#[inline]
pub fn haar_window(z: f64, location: f64, dilation: f64) -> f64 {
    let lower = location - dilation / 2.0;
    if z <= dilation && z >= lower {
        1.0
    } else if z >= dilation && z <= lower {
        -1.0
    } else {
        0.0
    }
}

/// Windowed integral of a cosine taper over `[lower, upper]`, divided by the
/// dilation.
///
/// Returns 0.0 for an empty or inverted range.
pub fn windowed_integral(lower: f64, upper: f64, dilation: f64, location: f64) -> f64 {
    let span = upper - lower;
    if !(span > 0.0) || !(dilation > 0.0) {
        return 0.0;
    }

    let step = span / WINDOW_INTERVALS as f64;
    let samples: Vec<f64> = (0..=WINDOW_INTERVALS)
        .map(|i| {
            let z = lower + i as f64 * step;
            let taper = (FRAC_PI_2 * (z - lower) / span).cos();
            taper * haar_window(z, location, dilation)
        })
        .collect();

    simpson_3_8(&samples, step).unwrap_or(0.0) / dilation
}

/// Attenuation factor for scaling a dispersion value into `[0, cap]`.
///
/// Dimensionless: the windowed integral is normalized by the cap. Always
/// within `[MIN_ATTENUATION, MAX_ATTENUATION]`, so repeated scaling of a
/// finite value terminates.
pub fn attenuation_factor(cap: f64) -> f64 {
    if !(cap > 0.0) || !cap.is_finite() {
        return MIN_ATTENUATION;
    }
    let ratio = windowed_integral(0.0, cap, WINDOW_DILATION, WINDOW_LOCATION) / cap;
    (1.0 - ratio).clamp(MIN_ATTENUATION, MAX_ATTENUATION)
}

/// Scale `value` down by `attenuation` until it no longer exceeds `cap`.
///
/// Non-finite input yields `cap`. Negative input is clamped to 0.
pub fn attenuate_into(value: f64, cap: f64, attenuation: f64) -> f64 {
    if !value.is_finite() {
        return cap;
    }
    let mut v = value.max(0.0);
    while v > cap {
        v *= attenuation;
    }
    v
}
