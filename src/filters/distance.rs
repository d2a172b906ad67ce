//! Signed Euclidean distance transform
//!
//! Exact squared EDT via the separable lower-envelope (parabola) scan of
//! Felzenszwalb & Huttenlocher, run once per axis with that axis' voxel
//! spacing. The signed variant is negative inside the mask and positive
//! outside, matching the level-set inside convention.
//!
//! Reference:
//! Felzenszwalb, P.F., Huttenlocher, D.P. (2012).
//! "Distance Transforms of Sampled Functions." Theory of Computing 8, 415-428.

use crate::field::{LabelMask, VolumetricField};

/// Signed distance field of a binary mask.
///
/// Negative inside (distance to the nearest background voxel), positive
/// outside (distance to the nearest foreground voxel), in physical units.
/// An empty mask yields +inf everywhere and a full mask -inf everywhere;
/// degenerate inputs propagate as fields rather than erroring.
pub fn signed_distance(mask: &LabelMask) -> VolumetricField {
    let to_foreground = squared_edt(mask, true);
    let to_background = squared_edt(mask, false);

    let data = mask
        .data
        .iter()
        .enumerate()
        .map(|(idx, &m)| {
            if m > 0 {
                -to_background[idx].sqrt()
            } else {
                to_foreground[idx].sqrt()
            }
        })
        .collect();

    VolumetricField {
        geometry: mask.geometry.clone(),
        data,
    }
}

/// Squared distance from every voxel to the nearest feature voxel.
///
/// `foreground` selects whether mask values > 0 or == 0 are the feature set.
fn squared_edt(mask: &LabelMask, foreground: bool) -> Vec<f64> {
    let (nx, ny, nz) = mask.geometry.dims;
    let [sx, sy, sz] = mask.geometry.spacing;

    let mut dist: Vec<f64> = mask
        .data
        .iter()
        .map(|&m| {
            let is_feature = if foreground { m > 0 } else { m == 0 };
            if is_feature {
                0.0
            } else {
                f64::INFINITY
            }
        })
        .collect();

    edt_axis_pass(&mut dist, (nx, ny, nz), 0, sx);
    edt_axis_pass(&mut dist, (nx, ny, nz), 1, sy);
    edt_axis_pass(&mut dist, (nx, ny, nz), 2, sz);

    dist
}

/// Run the 1D squared-distance lower-envelope scan along one axis.
fn edt_axis_pass(dist: &mut [f64], dims: (usize, usize, usize), axis: usize, spacing: f64) {
    let (nx, ny, nz) = dims;
    let dim = [nx, ny, nz][axis];
    let stride = [1, nx, nx * ny][axis];
    if dim == 0 {
        return;
    }
    let mut line = vec![0.0; dim];
    let mut out = vec![0.0; dim];
    let mut hull_pos = vec![0usize; dim];
    let mut boundaries = vec![0.0; dim + 1];

    // Iterate over the two axes orthogonal to `axis`
    let (outer_a, outer_b) = match axis {
        0 => (ny, nz),
        1 => (nx, nz),
        _ => (nx, ny),
    };

    for b in 0..outer_b {
        for a in 0..outer_a {
            let base = match axis {
                0 => a * nx + b * nx * ny,
                1 => a + b * nx * ny,
                _ => a + b * nx,
            };

            for p in 0..dim {
                line[p] = dist[base + p * stride];
            }
            dt1d(&line, spacing, &mut out, &mut hull_pos, &mut boundaries);
            for p in 0..dim {
                dist[base + p * stride] = out[p];
            }
        }
    }
}

/// 1D squared distance transform of a sampled function.
///
/// Computes `out[i] = min_q ((i - q) * h)^2 + f[q]` via the lower envelope of
/// parabolas. Parabolas rooted at +inf are skipped; a line that is entirely
/// +inf stays +inf.
fn dt1d(f: &[f64], h: f64, out: &mut [f64], hull_pos: &mut [usize], boundaries: &mut [f64]) {
    let n = f.len();
    let mut k: isize = -1;

    for q in 0..n {
        if f[q].is_infinite() {
            continue;
        }
        let xq = q as f64 * h;
        loop {
            if k < 0 {
                break;
            }
            let p = hull_pos[k as usize];
            let xp = p as f64 * h;
            // Intersection of parabolas rooted at p and q
            let s = ((f[q] + xq * xq) - (f[p] + xp * xp)) / (2.0 * xq - 2.0 * xp);
            if s <= boundaries[k as usize] {
                k -= 1;
            } else {
                k += 1;
                hull_pos[k as usize] = q;
                boundaries[k as usize] = s;
                boundaries[k as usize + 1] = f64::INFINITY;
                break;
            }
        }
        if k < 0 {
            k = 0;
            hull_pos[0] = q;
            boundaries[0] = f64::NEG_INFINITY;
            boundaries[1] = f64::INFINITY;
        }
    }

    if k < 0 {
        // No finite parabola on this line
        out[..n].copy_from_slice(&f[..n]);
        return;
    }

    let mut j = 0usize;
    for (i, out_val) in out.iter_mut().enumerate().take(n) {
        let x = i as f64 * h;
        while boundaries[j + 1] < x {
            j += 1;
        }
        let p = hull_pos[j];
        let d = x - p as f64 * h;
        *out_val = d * d + f[p];
    }
}
