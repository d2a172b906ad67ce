//! Spacing-aware gradient magnitude
//!
//! Central differences in the interior, one-sided differences at the
//! borders, each component scaled by the voxel spacing of its axis.

use crate::field::VolumetricField;

/// Gradient magnitude of a scalar field.
///
/// # Arguments
/// * `field` - Input scalar field
///
/// # Returns
/// Field of `|grad f|` values on the same grid. High values mark edges.
pub fn gradient_magnitude(field: &VolumetricField) -> VolumetricField {
    let (nx, ny, nz) = field.geometry.dims;
    let [sx, sy, sz] = field.geometry.spacing;
    let data = &field.data;
    let mut out = vec![0.0; data.len()];

    // Fortran order: index = i + j*nx + k*nx*ny
    for k in 0..nz {
        let k_offset = k * nx * ny;
        for j in 0..ny {
            let j_offset = j * nx;
            for i in 0..nx {
                let idx = i + j_offset + k_offset;

                let gx = axis_diff(data, idx, i, nx, 1) / sx;
                let gy = axis_diff(data, idx, j, ny, nx) / sy;
                let gz = axis_diff(data, idx, k, nz, nx * ny) / sz;

                out[idx] = (gx * gx + gy * gy + gz * gz).sqrt();
            }
        }
    }

    VolumetricField {
        geometry: field.geometry.clone(),
        data: out,
    }
}

/// Central difference along one axis, degrading to one-sided at the borders.
#[inline]
fn axis_diff(data: &[f64], idx: usize, pos: usize, dim: usize, stride: usize) -> f64 {
    if dim < 2 {
        return 0.0;
    }
    if pos == 0 {
        data[idx + stride] - data[idx]
    } else if pos == dim - 1 {
        data[idx] - data[idx - stride]
    } else {
        (data[idx + stride] - data[idx - stride]) * 0.5
    }
}
