//! Common test utilities for valveseg integration tests

use std::collections::HashMap;

use valveseg::{
    FieldGeometry, LabelMask, SegmentationStore, SurfaceConversion, VolumetricField,
};

/// In-memory segmentation store standing in for the host application.
///
/// Records every write and surface regeneration so tests can assert on the
/// commit protocol.
#[derive(Default)]
pub struct InMemoryStore {
    pub segments: HashMap<String, LabelMask>,
    pub conversion: Option<SurfaceConversion>,
    pub surface_rebuilds: HashMap<String, usize>,
    pub writes: usize,
}

impl SegmentationStore for InMemoryStore {
    fn write_segment(&mut self, name: &str, mask: &LabelMask) {
        self.segments.insert(name.to_string(), mask.clone());
        self.writes += 1;
    }

    fn read_segment(&self, name: &str) -> Option<LabelMask> {
        self.segments.get(name).cloned()
    }

    fn set_surface_conversion(&mut self, conversion: SurfaceConversion) {
        self.conversion = Some(conversion);
    }

    fn regenerate_surface(&mut self, name: &str) {
        *self.surface_rebuilds.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Constant-intensity volume on a unit-spacing grid
pub fn flat_volume(dims: (usize, usize, usize), value: f64) -> VolumetricField {
    let geom = FieldGeometry::isotropic(dims);
    VolumetricField::from_data(geom.clone(), vec![value; geom.len()])
}

/// Constant speed field, bypassing the intensity pipeline
pub fn constant_speed(dims: (usize, usize, usize), value: f64) -> VolumetricField {
    flat_volume(dims, value)
}

/// Volume containing a bright ball on a dark background.
///
/// The intensity step at the ball surface becomes a low-speed shell in the
/// derived speed field, which is what the contour locks onto.
pub fn ball_volume(
    dims: (usize, usize, usize),
    center: (f64, f64, f64),
    radius: f64,
) -> VolumetricField {
    let geom = FieldGeometry::isotropic(dims);
    let mut volume = VolumetricField::zeros(geom.clone());
    for k in 0..dims.2 {
        for j in 0..dims.1 {
            for i in 0..dims.0 {
                let dx = i as f64 - center.0;
                let dy = j as f64 - center.1;
                let dz = k as f64 - center.2;
                if (dx * dx + dy * dy + dz * dz).sqrt() <= radius {
                    volume.data[geom.idx(i, j, k)] = 200.0;
                }
            }
        }
    }
    volume
}

/// Radius of a ball with the same voxel volume as the level set's inside
/// region
pub fn equivalent_radius(level_set: &VolumetricField) -> f64 {
    let v = level_set.inside_count() as f64;
    (3.0 * v / (4.0 * std::f64::consts::PI)).cbrt()
}
