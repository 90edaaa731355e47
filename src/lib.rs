//! Subdaily photosynthesis with slow acclimation
//!
//! Re-exports the shared building blocks and the photosynthesis models.

pub use rspm_components;
pub use rspm_core;
