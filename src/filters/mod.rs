//! Discrete image-processing kernels
//!
//! The filter toolbox consumed by the segmentation pipeline: Gaussian
//! smoothing, gradient magnitude, sigmoid remapping and the signed distance
//! transform. All filters are pure functions on `VolumetricField` /
//! `LabelMask` and are spacing-aware where the operation has physical units.

pub mod distance;
pub mod gaussian;
pub mod gradient;
pub mod sigmoid;

pub use distance::signed_distance;
pub use gaussian::discrete_gaussian;
pub use gradient::gradient_magnitude;
pub use sigmoid::sigmoid_remap;
