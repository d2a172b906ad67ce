//! Fast-marching arrival-time computation
//!
//! Solves the Eikonal equation `|grad T| = 1 / speed` for the arrival time of
//! a front expanding from a seed voxel, using the upwind quadratic update and
//! a min-heap ordered trial set (Sethian's fast marching method).
//!
//! Speeds at or below `SPEED_FLOOR` are treated as impassable and keep an
//! infinite arrival time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::field::VolumetricField;

/// Speeds below this never accept a front
const SPEED_FLOOR: f64 = 1e-8;

/// Heap entry ordered by ascending arrival time.
struct Trial {
    time: f64,
    idx: usize,
}

impl PartialEq for Trial {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.idx == other.idx
    }
}
impl Eq for Trial {}

impl Ord for Trial {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want earliest arrival first
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}
impl PartialOrd for Trial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Arrival times of a front expanding from `seed` across `speed`.
///
/// # Arguments
/// * `speed` - Traversal speed field, values in [0, 1]
/// * `seed` - Seed voxel (i, j, k); must lie inside the grid
///
/// # Returns
/// Field of arrival times; the seed voxel is 0, unreachable voxels are +inf.
pub fn arrival_times(speed: &VolumetricField, seed: (usize, usize, usize)) -> VolumetricField {
    let (nx, ny, nz) = speed.geometry.dims;
    assert!(
        seed.0 < nx && seed.1 < ny && seed.2 < nz,
        "seed voxel {:?} outside grid {:?}",
        seed,
        speed.geometry.dims
    );

    let n = speed.geometry.len();
    let mut times = vec![f64::INFINITY; n];
    let mut frozen = vec![false; n];
    let mut heap = BinaryHeap::new();

    let seed_idx = speed.geometry.idx(seed.0, seed.1, seed.2);
    times[seed_idx] = 0.0;
    heap.push(Trial {
        time: 0.0,
        idx: seed_idx,
    });

    while let Some(Trial { idx, .. }) = heap.pop() {
        if frozen[idx] {
            continue;
        }
        frozen[idx] = true;

        // Relax the six face neighbors
        let i = idx % nx;
        let j = (idx / nx) % ny;
        let k = idx / (nx * ny);

        let neighbors = [
            (i > 0, idx.wrapping_sub(1)),
            (i + 1 < nx, idx + 1),
            (j > 0, idx.wrapping_sub(nx)),
            (j + 1 < ny, idx + nx),
            (k > 0, idx.wrapping_sub(nx * ny)),
            (k + 1 < nz, idx + nx * ny),
        ];

        for &(in_bounds, nidx) in &neighbors {
            if !in_bounds || frozen[nidx] {
                continue;
            }
            let g = speed.data[nidx];
            if g <= SPEED_FLOOR {
                continue;
            }
            let candidate = eikonal_update(&times, &frozen, speed, nidx, 1.0 / g);
            if candidate < times[nidx] {
                times[nidx] = candidate;
                heap.push(Trial {
                    time: candidate,
                    idx: nidx,
                });
            }
        }
    }

    VolumetricField {
        geometry: speed.geometry.clone(),
        data: times,
    }
}

/// Upwind quadratic update at one voxel.
///
/// Gathers the smallest frozen neighbor time per axis and solves
/// `sum_a ((T - t_a) / h_a)^2 = cost^2` for the largest root, including axes
/// greedily in ascending `t_a` order while they still contribute.
fn eikonal_update(
    times: &[f64],
    frozen: &[bool],
    speed: &VolumetricField,
    idx: usize,
    cost: f64,
) -> f64 {
    let (nx, ny, nz) = speed.geometry.dims;
    let spacing = speed.geometry.spacing;

    let i = idx % nx;
    let j = (idx / nx) % ny;
    let k = idx / (nx * ny);

    let mut terms: Vec<(f64, f64)> = Vec::with_capacity(3);
    let axis_min = |lo_ok: bool, lo: usize, hi_ok: bool, hi: usize| -> f64 {
        let a = if lo_ok && frozen[lo] {
            times[lo]
        } else {
            f64::INFINITY
        };
        let b = if hi_ok && frozen[hi] {
            times[hi]
        } else {
            f64::INFINITY
        };
        a.min(b)
    };

    let tx = axis_min(i > 0, idx.wrapping_sub(1), i + 1 < nx, idx + 1);
    let ty = axis_min(j > 0, idx.wrapping_sub(nx), j + 1 < ny, idx + nx);
    let tz = axis_min(
        k > 0,
        idx.wrapping_sub(nx * ny),
        k + 1 < nz,
        idx + nx * ny,
    );

    if tx.is_finite() {
        terms.push((tx, spacing[0]));
    }
    if ty.is_finite() {
        terms.push((ty, spacing[1]));
    }
    if tz.is_finite() {
        terms.push((tz, spacing[2]));
    }
    if terms.is_empty() {
        return f64::INFINITY;
    }
    terms.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Add axes while the quadratic still has a root above every included time
    let mut solution = f64::INFINITY;
    for m in 1..=terms.len() {
        let active = &terms[..m];
        let mut a = 0.0;
        let mut b = 0.0;
        let mut c = -cost * cost;
        for &(t, h) in active {
            let w = 1.0 / (h * h);
            a += w;
            b -= 2.0 * t * w;
            c += t * t * w;
        }
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            break;
        }
        let root = (-b + disc.sqrt()) / (2.0 * a);
        if m < terms.len() && root > terms[m].0 {
            continue;
        }
        solution = root;
        break;
    }

    if solution.is_finite() {
        solution
    } else {
        // Fall back to the one-axis causal update
        terms[0].0 + cost * terms[0].1
    }
}
