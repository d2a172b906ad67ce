//! Volumetric scalar fields
//!
//! The core data type shared by every stage of the pipeline: a 3D scalar
//! grid with geometric metadata (voxel spacing, origin, direction cosines).
//! Data is stored flat in Fortran (column-major) order:
//! `index = i + j*nx + k*nx*ny`.
//!
//! Two specializations are used by value, not by subtype: a *speed field*
//! (values in [0,1], higher = easier to cross) and a *level-set field*
//! (signed distance approximation; negative = inside the evolving region).

use nalgebra::{Matrix3, Vector3};

/// Grid geometry shared by all fields of one session.
///
/// `direction` holds orthonormal direction cosines mapping voxel axes to
/// physical axes. Fields that are combined in one operation must have
/// identical geometry; a mismatch is a programming error, not a recoverable
/// condition.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldGeometry {
    /// Volume dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Voxel spacing in mm per axis
    pub spacing: [f64; 3],
    /// Physical position of voxel (0, 0, 0)
    pub origin: [f64; 3],
    /// Orthonormal direction cosine matrix
    pub direction: Matrix3<f64>,
}

impl FieldGeometry {
    /// Axis-aligned geometry with identity direction cosines.
    pub fn axis_aligned(dims: (usize, usize, usize), spacing: [f64; 3], origin: [f64; 3]) -> Self {
        FieldGeometry {
            dims,
            spacing,
            origin,
            direction: Matrix3::identity(),
        }
    }

    /// Unit-spacing geometry at the physical origin. Convenient for
    /// synthetic volumes.
    pub fn isotropic(dims: (usize, usize, usize)) -> Self {
        Self::axis_aligned(dims, [1.0; 3], [0.0; 3])
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    /// True if the grid has no voxels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of voxel (i, j, k) in Fortran order
    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        i + j * self.dims.0 + k * self.dims.0 * self.dims.1
    }

    /// Map a physical-space point to continuous voxel coordinates.
    ///
    /// Inverts `p = origin + direction * diag(spacing) * v`. The direction
    /// matrix is orthonormal by invariant, so its transpose is its inverse.
    pub fn physical_to_voxel(&self, point: [f64; 3]) -> [f64; 3] {
        let rel = Vector3::new(
            point[0] - self.origin[0],
            point[1] - self.origin[1],
            point[2] - self.origin[2],
        );
        let local = self.direction.transpose() * rel;
        [
            local[0] / self.spacing[0],
            local[1] / self.spacing[1],
            local[2] / self.spacing[2],
        ]
    }
}

/// A 3D scalar field: flat `f64` data plus grid geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumetricField {
    pub geometry: FieldGeometry,
    pub data: Vec<f64>,
}

impl VolumetricField {
    /// Zero-filled field on the given grid
    pub fn zeros(geometry: FieldGeometry) -> Self {
        let n = geometry.len();
        VolumetricField {
            geometry,
            data: vec![0.0; n],
        }
    }

    /// Wrap existing data. Panics if the data length does not match the grid.
    pub fn from_data(geometry: FieldGeometry, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            geometry.len(),
            "field data length {} does not match grid {:?}",
            data.len(),
            geometry.dims
        );
        VolumetricField { geometry, data }
    }

    /// Panic with a descriptive message if `other` lives on a different grid.
    ///
    /// Mismatched geometry between fields used together indicates an internal
    /// bug and is not recoverable.
    #[track_caller]
    pub fn assert_same_geometry(&self, other: &VolumetricField) {
        assert!(
            self.geometry == other.geometry,
            "field geometry mismatch: {:?} spacing {:?} vs {:?} spacing {:?}",
            self.geometry.dims,
            self.geometry.spacing,
            other.geometry.dims,
            other.geometry.spacing
        );
    }

    /// Threshold at the zero level into a binary mask (value <= 0 -> 1).
    ///
    /// This is the level-set inside convention: negative values are inside
    /// the evolving region, the zero crossing is the boundary.
    pub fn threshold_inside(&self) -> LabelMask {
        let data = self
            .data
            .iter()
            .map(|&v| if v <= 0.0 { 1 } else { 0 })
            .collect();
        LabelMask {
            geometry: self.geometry.clone(),
            data,
        }
    }

    /// Number of voxels at or below the zero level
    pub fn inside_count(&self) -> usize {
        self.data.iter().filter(|&&v| v <= 0.0).count()
    }

    /// True if both fields delimit the identical region after zero-level
    /// thresholding, regardless of the underlying distance values.
    ///
    /// Single full-volume pass, no allocation. Used by the history manager
    /// to reject no-op evolution steps.
    pub fn mask_equivalent(&self, other: &VolumetricField) -> bool {
        self.assert_same_geometry(other);
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(&a, &b)| (a <= 0.0) == (b <= 0.0))
    }
}

/// Binary label mask exchanged with the segmentation store.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelMask {
    pub geometry: FieldGeometry,
    pub data: Vec<u8>,
}

impl LabelMask {
    /// Zero-filled mask on the given grid
    pub fn zeros(geometry: FieldGeometry) -> Self {
        let n = geometry.len();
        LabelMask {
            geometry,
            data: vec![0; n],
        }
    }

    /// Number of foreground voxels
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0).count()
    }
}
