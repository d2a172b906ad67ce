//! Spacing-aware discrete Gaussian smoothing
//!
//! Separable convolution with a sampled, normalized Gaussian kernel. The
//! requested variance is in physical units (mm^2), so anisotropic voxels get
//! a different kernel per axis. Kernel radius is bounded to keep the filter
//! cheap on coarse volumes.

use crate::field::VolumetricField;

/// Widest supported half-kernel, i.e. a full width of 33 taps.
const MAX_KERNEL_RADIUS: usize = 16;

/// Smooth a field with a Gaussian of the given physical variance.
///
/// # Arguments
/// * `field` - Input scalar field
/// * `variance` - Gaussian variance in mm^2 (sigma = sqrt(variance))
///
/// # Returns
/// Smoothed field on the same grid. Borders are handled by edge replication.
pub fn discrete_gaussian(field: &VolumetricField, variance: f64) -> VolumetricField {
    let sigma_mm = variance.max(0.0).sqrt();
    let mut out = field.clone();
    if sigma_mm == 0.0 || field.data.is_empty() {
        return out;
    }

    for axis in 0..3 {
        let sigma_vox = sigma_mm / field.geometry.spacing[axis];
        let kernel = sampled_kernel(sigma_vox);
        if kernel.len() > 1 {
            out = convolve_axis(&out, axis, &kernel);
        }
    }
    out
}

/// Sample and normalize a 1D Gaussian kernel for the given sigma in voxels.
///
/// Returns a kernel of odd length `2r + 1`; a sub-voxel sigma collapses to
/// the identity kernel `[1.0]`.
fn sampled_kernel(sigma_vox: f64) -> Vec<f64> {
    let radius = ((3.0 * sigma_vox + 0.5).ceil() as usize).min(MAX_KERNEL_RADIUS);
    if radius == 0 || sigma_vox < 1e-3 {
        return vec![1.0];
    }

    let inv_two_sigma2 = 1.0 / (2.0 * sigma_vox * sigma_vox);
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    for t in -(radius as isize)..=(radius as isize) {
        let d = t as f64;
        kernel.push((-d * d * inv_two_sigma2).exp());
    }
    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// Convolve along one axis with edge replication at the borders.
fn convolve_axis(field: &VolumetricField, axis: usize, kernel: &[f64]) -> VolumetricField {
    let (nx, ny, nz) = field.geometry.dims;
    let radius = kernel.len() / 2;
    let mut out = vec![0.0; field.data.len()];

    let dim = [nx, ny, nz][axis];
    let stride = [1, nx, nx * ny][axis];

    // Fortran order: index = i + j*nx + k*nx*ny
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let pos = [i, j, k][axis];
                let idx = i + j * nx + k * nx * ny;

                let mut acc = 0.0;
                for (t, &w) in kernel.iter().enumerate() {
                    let offset = t as isize - radius as isize;
                    let p = (pos as isize + offset).clamp(0, dim as isize - 1) as usize;
                    let sample_idx = idx + p * stride - pos * stride;
                    acc += w * field.data[sample_idx];
                }
                out[idx] = acc;
            }
        }
    }

    VolumetricField {
        geometry: field.geometry.clone(),
        data: out,
    }
}
