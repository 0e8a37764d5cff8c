pub mod correlation;
pub mod scoring;
pub mod severity;

pub use correlation::{CorrelationEngine, CorrelationOutcome};
pub use scoring::{AnomalyScorer, BaselineScorer, ScoringError};
pub use severity::classify;
