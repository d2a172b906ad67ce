//! Sigmoid intensity remap
//!
//! Monotone squashing of a scalar field into a fixed output range:
//! `f(x) = min + (max - min) / (1 + exp(-(x - beta) / alpha))`.
//! With negative `alpha` the mapping is decreasing, which is how gradient
//! magnitudes become traversal speeds (strong edges -> low speed).

use crate::field::VolumetricField;

/// Remap every voxel through a sigmoid.
///
/// # Arguments
/// * `field` - Input scalar field
/// * `alpha` - Steepness; negative values invert the mapping
/// * `beta` - Input value mapped to the middle of the output range
/// * `out_min`, `out_max` - Output range bounds
pub fn sigmoid_remap(
    field: &VolumetricField,
    alpha: f64,
    beta: f64,
    out_min: f64,
    out_max: f64,
) -> VolumetricField {
    let span = out_max - out_min;
    let data = field
        .data
        .iter()
        .map(|&x| out_min + span / (1.0 + (-(x - beta) / alpha).exp()))
        .collect();

    VolumetricField {
        geometry: field.geometry.clone(),
        data,
    }
}
