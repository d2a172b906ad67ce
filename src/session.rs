//! Segmentation session and phase controller
//!
//! The top-level mutable object for one editing session. Owns the speed
//! field (computed exactly once per session), the per-phase level sets and
//! their histories, and drives the two-phase state machine:
//!
//! 1. blood pool: seeded from the annulus landmark, grown outward
//!    (positive propagation),
//! 2. leaflet: re-seeded from a band around the blood-pool boundary, carved
//!    inward (negative propagation).
//!
//! Every user action (initialize, add-N-iterations, undo, redo) is a
//! blocking call that commits the thresholded mask to the segmentation
//! store before returning. The session is exclusively owned by the host;
//! there is no internal locking and no hidden global state.

use log::debug;

use crate::error::SegmentationError;
use crate::evolution::{evolve, EvolutionWeights};
use crate::field::{FieldGeometry, VolumetricField};
use crate::filters::signed_distance;
use crate::history::HistoryManager;
use crate::seeding::{seed_from_band, seed_from_point};
use crate::speed::compute_speed_field;
use crate::store::{AnnulusDefinition, Phase, SegmentationStore, SurfaceConversion};

/// Offset of the seed point from the annulus centroid along the plane
/// normal, in mm. Negative: toward the ventricle side of the annulus.
pub const SEED_NORMAL_OFFSET_MM: f64 = -10.0;

/// Leaflet seeding band around the blood-pool boundary, in physical units
pub const LEAFLET_BAND_INNER: f64 = 1.0;
pub const LEAFLET_BAND_OUTER: f64 = 11.0;

/// Iteration budget for first-time phase initialization
pub const BLOOD_POOL_INIT_ITERATIONS: u32 = 500;
pub const LEAFLET_INIT_ITERATIONS: u32 = 300;

/// Initialization presets are tuned for robust convergence from a rough
/// seed; increment presets move the boundary in small, predictable steps
/// the user can evaluate and undo.
pub const BLOOD_POOL_INIT_WEIGHTS: EvolutionWeights = EvolutionWeights {
    curvature_scaling: 0.8,
    advection_scaling: 1.2,
    propagation_scaling: 1.0,
    max_rms_error: 1e-4,
};

pub const BLOOD_POOL_STEP_WEIGHTS: EvolutionWeights = EvolutionWeights {
    curvature_scaling: 1.2,
    advection_scaling: 1.0,
    propagation_scaling: 0.9,
    max_rms_error: 1e-5,
};

pub const LEAFLET_INIT_WEIGHTS: EvolutionWeights = EvolutionWeights {
    curvature_scaling: 1.0,
    advection_scaling: 0.1,
    propagation_scaling: -0.6,
    max_rms_error: 1e-4,
};

pub const LEAFLET_STEP_WEIGHTS: EvolutionWeights = EvolutionWeights {
    curvature_scaling: 0.9,
    advection_scaling: 0.1,
    propagation_scaling: -0.4,
    max_rms_error: 1e-4,
};

/// One interactive segmentation session over a fixed input volume.
pub struct SegmentationSession {
    speed: VolumetricField,
    blood_pool: HistoryManager,
    leaflet: HistoryManager,
    blood_pool_committed: bool,
}

impl SegmentationSession {
    /// Start a session on an input volume, computing the speed field once.
    ///
    /// The input volume is not retained; all later operations work on the
    /// derived speed field.
    pub fn new(volume: &VolumetricField) -> Result<Self, SegmentationError> {
        if volume.data.is_empty() {
            debug!("session rejected: input volume is empty");
            return Err(SegmentationError::MissingPrecondition(
                "input volume is empty",
            ));
        }
        Ok(SegmentationSession {
            speed: compute_speed_field(volume),
            blood_pool: HistoryManager::new(),
            leaflet: HistoryManager::new(),
            blood_pool_committed: false,
        })
    }

    /// The session speed field, immutable for the session's lifetime
    pub fn speed_field(&self) -> &VolumetricField {
        &self.speed
    }

    /// Current level set of a phase, if that phase has been initialized
    pub fn level_set(&self, phase: Phase) -> Option<&VolumetricField> {
        self.history(phase).current()
    }

    /// Read access to a phase's undo/redo history
    pub fn history(&self, phase: Phase) -> &HistoryManager {
        match phase {
            Phase::BloodPool => &self.blood_pool,
            Phase::Leaflet => &self.leaflet,
        }
    }

    fn history_mut(&mut self, phase: Phase) -> &mut HistoryManager {
        match phase {
            Phase::BloodPool => &mut self.blood_pool,
            Phase::Leaflet => &mut self.leaflet,
        }
    }

    /// Seed and run the first blood-pool evolution pass, then commit.
    ///
    /// Fails with `MissingPrecondition` when the annulus contour is empty;
    /// no session state is touched in that case. Returns the number of PDE
    /// iterations actually run.
    pub fn initialize_blood_pool(
        &mut self,
        annulus: &AnnulusDefinition,
        store: &mut dyn SegmentationStore,
    ) -> Result<u32, SegmentationError> {
        let seed = derive_seed_voxel(&self.speed.geometry, annulus)?;
        debug!("blood pool seed voxel: {:?}", seed);

        let level = seed_from_point(&self.speed, seed);
        let (evolved, ran) = evolve(
            &level,
            &self.speed,
            BLOOD_POOL_INIT_ITERATIONS,
            &BLOOD_POOL_INIT_WEIGHTS,
        );
        debug!(
            "blood pool init ran {}/{} iterations",
            ran, BLOOD_POOL_INIT_ITERATIONS
        );

        self.blood_pool.record_if_changed(evolved);
        self.commit(Phase::BloodPool, store);
        Ok(ran)
    }

    /// Seed the leaflet phase from a band around the blood-pool boundary,
    /// run the first leaflet evolution pass, then commit.
    ///
    /// Fails with `PhaseOrderViolation` unless the blood pool has been
    /// committed at least once.
    pub fn initialize_leaflet(
        &mut self,
        store: &mut dyn SegmentationStore,
    ) -> Result<u32, SegmentationError> {
        if !self.blood_pool_committed {
            debug!("leaflet init rejected: blood pool not committed");
            return Err(SegmentationError::PhaseOrderViolation(
                "blood pool must be committed before leaflet initialization",
            ));
        }
        let blood_pool = self.blood_pool.current().ok_or(
            SegmentationError::MissingPrecondition("blood pool level set missing"),
        )?;

        let reference = blood_pool.threshold_inside();
        let level = seed_from_band(&reference, LEAFLET_BAND_INNER, LEAFLET_BAND_OUTER);
        let (evolved, ran) = evolve(
            &level,
            &self.speed,
            LEAFLET_INIT_ITERATIONS,
            &LEAFLET_INIT_WEIGHTS,
        );
        debug!(
            "leaflet init ran {}/{} iterations",
            ran, LEAFLET_INIT_ITERATIONS
        );

        self.leaflet.record_if_changed(evolved);
        self.commit(Phase::Leaflet, store);
        Ok(ran)
    }

    /// Evolve a phase by up to `iterations` more steps from its current
    /// state, record the result if it changed anything observable, commit.
    ///
    /// Returns the number of iterations actually run (less than requested
    /// when the RMS stopping criterion fires).
    pub fn add_iterations(
        &mut self,
        phase: Phase,
        iterations: u32,
        store: &mut dyn SegmentationStore,
    ) -> Result<u32, SegmentationError> {
        let weights = match phase {
            Phase::BloodPool => BLOOD_POOL_STEP_WEIGHTS,
            Phase::Leaflet => LEAFLET_STEP_WEIGHTS,
        };
        let current = self.history(phase).current().ok_or_else(|| {
            debug!("add_iterations rejected: {:?} not initialized", phase);
            SegmentationError::MissingPrecondition("phase not initialized")
        })?;

        let (evolved, ran) = evolve(current, &self.speed, iterations, &weights);
        let recorded = self.history_mut(phase).record_if_changed(evolved);
        debug!(
            "{:?} ran {}/{} iterations, recorded: {}",
            phase, ran, iterations, recorded
        );

        self.commit(phase, store);
        Ok(ran)
    }

    /// Step a phase back to its previous state and commit that state.
    ///
    /// Returns whether further undo steps remain. Does not invoke the PDE
    /// engine; history is replayed as-is.
    pub fn undo(
        &mut self,
        phase: Phase,
        store: &mut dyn SegmentationStore,
    ) -> Result<bool, SegmentationError> {
        let more = self.history_mut(phase).undo()?;
        self.commit(phase, store);
        Ok(more)
    }

    /// Step a phase forward again and commit that state.
    ///
    /// Returns whether further redo steps remain.
    pub fn redo(
        &mut self,
        phase: Phase,
        store: &mut dyn SegmentationStore,
    ) -> Result<bool, SegmentationError> {
        let more = self.history_mut(phase).redo()?;
        self.commit(phase, store);
        Ok(more)
    }

    /// Rebuild a phase's level set from the mask committed in the store.
    ///
    /// Used when resuming a session whose in-memory state is gone, or after
    /// the user edited the stored segment with external tools. Returns
    /// whether the reconstructed state differed from the in-memory one.
    pub fn reconstruct_from_store(
        &mut self,
        phase: Phase,
        store: &dyn SegmentationStore,
    ) -> Result<bool, SegmentationError> {
        let mask = store.read_segment(phase.segment_name()).ok_or(
            SegmentationError::MissingPrecondition("segment not present in store"),
        )?;
        assert!(
            mask.geometry == self.speed.geometry,
            "stored mask geometry {:?} does not match session grid {:?}",
            mask.geometry.dims,
            self.speed.geometry.dims
        );

        let level = signed_distance(&mask);
        let recorded = self.history_mut(phase).record_if_changed(level);
        if phase == Phase::BloodPool {
            self.blood_pool_committed = true;
        }
        Ok(recorded)
    }

    /// Threshold the phase's current level set and push it to the store.
    fn commit(&mut self, phase: Phase, store: &mut dyn SegmentationStore) {
        if let Some(level) = self.history(phase).current() {
            let mask = level.threshold_inside();
            store.set_surface_conversion(SurfaceConversion::default());
            store.write_segment(phase.segment_name(), &mask);
            store.regenerate_surface(phase.segment_name());
            if phase == Phase::BloodPool {
                self.blood_pool_committed = true;
            }
        }
    }
}

/// Map the annulus landmark to the blood-pool seed voxel.
///
/// The contour centroid is pushed [`SEED_NORMAL_OFFSET_MM`] along the plane
/// normal into the blood pool, converted to voxel indices and rounded. A
/// slice index at or below the first slice is clamped to the first valid
/// slice; in-plane indices are clamped into the grid.
pub fn derive_seed_voxel(
    geometry: &FieldGeometry,
    annulus: &AnnulusDefinition,
) -> Result<(usize, usize, usize), SegmentationError> {
    let centroid = annulus.centroid().ok_or(
        SegmentationError::MissingPrecondition("annulus contour not defined"),
    )?;
    let normal = annulus.plane_normal;
    let target = [
        centroid[0] + SEED_NORMAL_OFFSET_MM * normal[0],
        centroid[1] + SEED_NORMAL_OFFSET_MM * normal[1],
        centroid[2] + SEED_NORMAL_OFFSET_MM * normal[2],
    ];

    let v = geometry.physical_to_voxel(target);
    let (nx, ny, nz) = geometry.dims;
    let clamp_axis = |x: f64, dim: usize| -> usize {
        (x.round() as i64).clamp(0, dim as i64 - 1) as usize
    };

    let i = clamp_axis(v[0], nx);
    let j = clamp_axis(v[1], ny);
    // Boundary clamp policy: at or below the first slice lands on slice 1
    let mut k = v[2].round() as i64;
    if k <= 0 {
        k = 1;
    }
    let k = k.clamp(0, nz as i64 - 1) as usize;

    Ok((i, j, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::LabelMask;
    use std::collections::HashMap;

    /// Minimal store double for controller unit tests
    #[derive(Default)]
    struct RecordingStore {
        segments: HashMap<String, LabelMask>,
        conversion: Option<SurfaceConversion>,
        surface_rebuilds: usize,
    }

    impl SegmentationStore for RecordingStore {
        fn write_segment(&mut self, name: &str, mask: &LabelMask) {
            self.segments.insert(name.to_string(), mask.clone());
        }
        fn read_segment(&self, name: &str) -> Option<LabelMask> {
            self.segments.get(name).cloned()
        }
        fn set_surface_conversion(&mut self, conversion: SurfaceConversion) {
            self.conversion = Some(conversion);
        }
        fn regenerate_surface(&mut self, _name: &str) {
            self.surface_rebuilds += 1;
        }
    }

    fn flat_volume(dims: (usize, usize, usize)) -> VolumetricField {
        let geom = FieldGeometry::isotropic(dims);
        VolumetricField::from_data(geom.clone(), vec![100.0; geom.len()])
    }

    fn center_annulus(dims: (usize, usize, usize)) -> AnnulusDefinition {
        // Centroid above the grid center so the -10 mm offset lands inside
        let c = [
            dims.0 as f64 / 2.0,
            dims.1 as f64 / 2.0,
            dims.2 as f64 / 2.0 + 4.0,
        ];
        AnnulusDefinition {
            contour_points: vec![c],
            plane_normal: [0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn test_empty_volume_rejected() {
        let volume = VolumetricField::zeros(FieldGeometry::isotropic((0, 0, 0)));
        assert_eq!(
            SegmentationSession::new(&volume).err(),
            Some(SegmentationError::MissingPrecondition(
                "input volume is empty"
            ))
        );
    }

    #[test]
    fn test_empty_annulus_rejected_without_mutation() {
        let volume = flat_volume((12, 12, 12));
        let mut session = SegmentationSession::new(&volume).unwrap();
        let mut store = RecordingStore::default();

        let annulus = AnnulusDefinition {
            contour_points: vec![],
            plane_normal: [0.0, 0.0, 1.0],
        };
        let err = session.initialize_blood_pool(&annulus, &mut store);
        assert_eq!(
            err,
            Err(SegmentationError::MissingPrecondition(
                "annulus contour not defined"
            ))
        );
        assert!(session.level_set(Phase::BloodPool).is_none());
        assert!(store.segments.is_empty());
    }

    #[test]
    fn test_leaflet_before_blood_pool_is_order_violation() {
        let volume = flat_volume((12, 12, 12));
        let mut session = SegmentationSession::new(&volume).unwrap();
        let mut store = RecordingStore::default();
        assert!(matches!(
            session.initialize_leaflet(&mut store),
            Err(SegmentationError::PhaseOrderViolation(_))
        ));
    }

    #[test]
    fn test_add_iterations_requires_initialized_phase() {
        let volume = flat_volume((12, 12, 12));
        let mut session = SegmentationSession::new(&volume).unwrap();
        let mut store = RecordingStore::default();
        assert!(matches!(
            session.add_iterations(Phase::BloodPool, 50, &mut store),
            Err(SegmentationError::MissingPrecondition(_))
        ));
    }

    #[test]
    fn test_blood_pool_init_commits_named_segment() {
        let volume = flat_volume((16, 16, 16));
        let mut session = SegmentationSession::new(&volume).unwrap();
        let mut store = RecordingStore::default();

        session
            .initialize_blood_pool(&center_annulus((16, 16, 16)), &mut store)
            .unwrap();

        let mask = store.segments.get("BP Segmentation").expect("segment");
        assert!(mask.foreground_count() > 0, "committed mask is empty");
        assert_eq!(
            store.conversion,
            Some(SurfaceConversion::default()),
            "surface conversion parameters not applied"
        );
        assert!(store.surface_rebuilds > 0);
        assert!(session.level_set(Phase::BloodPool).is_some());
    }

    #[test]
    fn test_seed_voxel_projection_and_rounding() {
        let geom = FieldGeometry::isotropic((32, 32, 32));
        let annulus = AnnulusDefinition {
            contour_points: vec![[16.0, 16.0, 26.0]],
            plane_normal: [0.0, 0.0, 1.0],
        };
        assert_eq!(derive_seed_voxel(&geom, &annulus).unwrap(), (16, 16, 16));
    }

    #[test]
    fn test_seed_below_first_slice_clamps_to_slice_one() {
        let geom = FieldGeometry::isotropic((32, 32, 32));
        // Projection lands at k = -4: clamp to the first valid slice
        let annulus = AnnulusDefinition {
            contour_points: vec![[16.0, 16.0, 6.0]],
            plane_normal: [0.0, 0.0, 1.0],
        };
        assert_eq!(derive_seed_voxel(&geom, &annulus).unwrap(), (16, 16, 1));

        // Exactly the first slice also moves to slice 1
        let annulus = AnnulusDefinition {
            contour_points: vec![[16.0, 16.0, 10.0]],
            plane_normal: [0.0, 0.0, 1.0],
        };
        assert_eq!(derive_seed_voxel(&geom, &annulus).unwrap(), (16, 16, 1));
    }

    #[test]
    fn test_reconstruct_from_store_roundtrip() {
        let volume = flat_volume((16, 16, 16));
        let mut session = SegmentationSession::new(&volume).unwrap();
        let mut store = RecordingStore::default();
        session
            .initialize_blood_pool(&center_annulus((16, 16, 16)), &mut store)
            .unwrap();

        // Reconstructing from the just-committed mask is a no-op
        let recorded = session
            .reconstruct_from_store(Phase::BloodPool, &store)
            .unwrap();
        assert!(!recorded, "roundtrip reconstruction must not pollute history");
        assert_eq!(session.history(Phase::BloodPool).undo_depth(), 0);
    }

    #[test]
    fn test_reconstruct_missing_segment_fails() {
        let volume = flat_volume((12, 12, 12));
        let mut session = SegmentationSession::new(&volume).unwrap();
        let store = RecordingStore::default();
        assert!(matches!(
            session.reconstruct_from_store(Phase::Leaflet, &store),
            Err(SegmentationError::MissingPrecondition(_))
        ));
    }
}
