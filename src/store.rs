//! External collaborator boundaries
//!
//! The engine reads landmarks from and writes masks to host-provided
//! collaborators. These traits and value types are the entire surface: no
//! file formats, scene graphs or mesh processing live in this crate.

use crate::field::LabelMask;

/// The two segmentation stages, each with its own level set and history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    BloodPool,
    Leaflet,
}

impl Phase {
    /// Storage key of this phase's segment in the segmentation store.
    ///
    /// The string identifiers exist only at this boundary; internal logic
    /// works with the `Phase` tag.
    pub fn segment_name(self) -> &'static str {
        match self {
            Phase::BloodPool => "BP Segmentation",
            Phase::Leaflet => "Leaflet Segmentation",
        }
    }
}

/// Parameters the store uses when deriving a closed-surface mesh from a
/// committed label mask. Changing them invalidates the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceConversion {
    pub decimation_factor: f64,
    pub smoothing_factor: f64,
}

impl Default for SurfaceConversion {
    fn default() -> Self {
        SurfaceConversion {
            decimation_factor: 0.5,
            smoothing_factor: 0.5,
        }
    }
}

/// Named-segment storage provided by the host.
///
/// Accepts binary label masks under string keys and maintains a derived
/// surface representation per segment. All methods are synchronous; the
/// engine performs one write plus one surface regeneration per commit.
pub trait SegmentationStore {
    /// Create or replace the segment's label mask
    fn write_segment(&mut self, name: &str, mask: &LabelMask);

    /// Read a segment's label mask, if present
    fn read_segment(&self, name: &str) -> Option<LabelMask>;

    /// Set the mask-to-surface conversion parameters for all segments
    fn set_surface_conversion(&mut self, conversion: SurfaceConversion);

    /// Drop and rebuild the segment's derived surface representation
    fn regenerate_surface(&mut self, name: &str);
}

/// Annulus landmark definition supplied by the host's landmark provider.
///
/// The contour points trace the valve annulus in physical space;
/// `plane_normal` is the unit normal of the annulus best-fit plane.
#[derive(Clone, Debug)]
pub struct AnnulusDefinition {
    pub contour_points: Vec<[f64; 3]>,
    pub plane_normal: [f64; 3],
}

impl AnnulusDefinition {
    /// Centroid of the contour points, or None when the contour is empty.
    pub fn centroid(&self) -> Option<[f64; 3]> {
        if self.contour_points.is_empty() {
            return None;
        }
        let mut sum = [0.0; 3];
        for p in &self.contour_points {
            sum[0] += p[0];
            sum[1] += p[1];
            sum[2] += p[2];
        }
        let n = self.contour_points.len() as f64;
        Some([sum[0] / n, sum[1] / n, sum[2] / n])
    }
}
