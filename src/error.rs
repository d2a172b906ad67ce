//! Error taxonomy for the segmentation engine
//!
//! Recoverable failures (missing inputs, phase ordering, empty history) are
//! reported through `SegmentationError`. Grid geometry violations are
//! programming errors and panic instead; see `FieldGeometry`.

use thiserror::Error;

/// Errors surfaced by the phase controller and history manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentationError {
    /// A required input (volume, landmark, prior phase result) is absent.
    /// The operation aborts before any state mutation.
    #[error("missing precondition: {0}")]
    MissingPrecondition(&'static str),

    /// Leaflet segmentation requested before the blood pool has been
    /// committed at least once.
    #[error("phase order violation: {0}")]
    PhaseOrderViolation(&'static str),

    /// Undo or redo requested with an empty respective stack.
    /// The session state is left unchanged.
    #[error("nothing to {action}")]
    HistoryUnderflow {
        /// Which operation ran dry ("undo" or "redo").
        action: &'static str,
    },
}
