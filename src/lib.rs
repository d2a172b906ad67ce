//! valveseg: semi-automatic two-phase level-set segmentation of heart valves
//!
//! This crate implements the segmentation engine for interactive valve
//! segmentation from 3D ultrasound/CT volumes: a speed field derived from
//! image edges, fast-marching seed initialization, geodesic active-contour
//! evolution in user-controlled increments, and per-phase undo/redo history.
//!
//! # Modules
//! - `field`: 3D scalar fields with grid geometry (the shared data type)
//! - `filters`: Gaussian smoothing, gradient magnitude, sigmoid, signed EDT
//! - `fast_marching`: arrival-time front propagation from a seed voxel
//! - `speed`: traversal-cost field computation (once per session)
//! - `seeding`: initial level sets from a seed point or a boundary band
//! - `evolution`: the geodesic active-contour PDE solver
//! - `history`: undo/redo stacks with mask-equivalence change detection
//! - `store`: host collaborator boundaries (segment store, landmarks)
//! - `session`: the two-phase controller driving it all
//!
//! The host application owns rendering, mesh conversion and persistence;
//! this crate only ever touches those through the `store` traits.

// Data type and kernels
pub mod fast_marching;
pub mod field;
pub mod filters;

// Pipeline stages
pub mod evolution;
pub mod seeding;
pub mod speed;

// Session state
pub mod error;
pub mod history;
pub mod session;
pub mod store;

pub use error::SegmentationError;
pub use evolution::{evolve, EvolutionWeights};
pub use field::{FieldGeometry, LabelMask, VolumetricField};
pub use history::HistoryManager;
pub use seeding::{seed_from_band, seed_from_point};
pub use session::SegmentationSession;
pub use speed::compute_speed_field;
pub use store::{AnnulusDefinition, Phase, SegmentationStore, SurfaceConversion};
