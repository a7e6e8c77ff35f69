//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundary between
//! the assessment logic and the model artifact format.

mod risk_model;

pub use risk_model::{check_vector, InferenceError, RiskModel};
