//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod assessment;
pub mod interpretation;
pub mod normalizer;
pub mod report;

pub use assessment::{AssessmentReport, AssessmentService, ModelRisk};
pub use normalizer::{normalize, NormalizeError};
pub use report::{render_text, to_json};
