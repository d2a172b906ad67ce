//! Speed field computation
//!
//! Derives the traversal-cost field used by seeding and contour evolution
//! from the raw intensity volume: Gaussian smoothing suppresses speckle,
//! gradient magnitude highlights tissue boundaries, and a decreasing sigmoid
//! maps edges to low speed and flat regions to high speed.
//!
//! The speed field is computed once per session; the input volume does not
//! change across edits.

use crate::field::VolumetricField;
use crate::filters::{discrete_gaussian, gradient_magnitude, sigmoid_remap};

/// Gaussian variance in mm^2 applied before the gradient
const SMOOTHING_VARIANCE: f64 = 1.5;
/// Sigmoid steepness; negative so edges map toward zero speed
const SIGMOID_ALPHA: f64 = -5.0;
/// Gradient magnitude mapped to the middle of the speed range
const SIGMOID_BETA: f64 = 10.0;

/// Compute the traversal speed field for one segmentation session.
///
/// Pure, deterministic function of the input volume. Output values lie in
/// [0, 1]: high where the volume is flat, low across intensity edges.
pub fn compute_speed_field(volume: &VolumetricField) -> VolumetricField {
    let smoothed = discrete_gaussian(volume, SMOOTHING_VARIANCE);
    let edges = gradient_magnitude(&smoothed);
    sigmoid_remap(&edges, SIGMOID_ALPHA, SIGMOID_BETA, 0.0, 1.0)
}
