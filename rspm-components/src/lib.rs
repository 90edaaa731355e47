//! Photosynthesis sub-models for the P Model
//!
//! # Module Organisation
//!
//! - `optimal_chi`, `quantum_yield`, `jmax_limitation`, `arrhenius`: interchangeable
//!   sub-models selected by name
//! - `pmodel`: the daily optimality model built from those sub-models
//! - `subdaily`: the subdaily model with slow acclimation of ξ, Vcmax and Jmax

pub mod arrhenius;
pub mod jmax_limitation;
pub mod optimal_chi;
pub mod pmodel;
pub mod quantum_yield;
pub mod subdaily;
