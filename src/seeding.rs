//! Initial level-set construction
//!
//! Two seeding paths produce the signed-distance field that contour
//! evolution starts from: a flood-front arrival-time computation around a
//! seed voxel (blood-pool phase) and a boundary band extracted from an
//! existing mask (leaflet phase).

use crate::fast_marching::arrival_times;
use crate::field::{LabelMask, VolumetricField};
use crate::filters::signed_distance;

/// Arrival-time radius that delimits the "near seed" region
pub const ARRIVAL_TIME_RADIUS: f64 = 10.0;

/// Level set seeded from a single voxel.
///
/// Runs fast marching from the seed over the speed field, keeps voxels the
/// front reaches within [`ARRIVAL_TIME_RADIUS`] time units, and converts that
/// region to a signed distance field (negative inside).
///
/// # Arguments
/// * `speed` - Session speed field
/// * `seed_voxel` - Seed voxel (i, j, k); must lie inside the grid
pub fn seed_from_point(
    speed: &VolumetricField,
    seed_voxel: (usize, usize, usize),
) -> VolumetricField {
    let times = arrival_times(speed, seed_voxel);
    let near_seed = threshold_range(&times, 0.0, ARRIVAL_TIME_RADIUS);
    signed_distance(&near_seed)
}

/// Level set seeded from a band around a mask boundary.
///
/// Thresholds the signed distance of `reference` to the shell
/// `[inner_radius, outer_radius]` (inclusive, physical units, positive =
/// outside the reference region) and converts the shell to a signed distance
/// field. Used to re-seed the leaflet phase from the blood-pool boundary.
pub fn seed_from_band(
    reference: &LabelMask,
    inner_radius: f64,
    outer_radius: f64,
) -> VolumetricField {
    let dist = signed_distance(reference);
    let shell = threshold_range(&dist, inner_radius, outer_radius);
    signed_distance(&shell)
}

/// Binary threshold on a closed value range.
fn threshold_range(field: &VolumetricField, lower: f64, upper: f64) -> LabelMask {
    let data = field
        .data
        .iter()
        .map(|&v| if v >= lower && v <= upper { 1 } else { 0 })
        .collect();
    LabelMask {
        geometry: field.geometry.clone(),
        data,
    }
}
