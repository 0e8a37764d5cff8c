//! Anomaly scoring
//!
//! The hub treats the scorer as an external capability: it hands over a
//! feature vector and expects a normalized score in [0, 1] back. Anything
//! else is treated as "score unavailable".

use crate::config::ScoringConfig;
use thiserror::Error;

/// Errors that can occur while scoring an event
#[derive(Error, Debug, PartialEq)]
pub enum ScoringError {
    #[error("Feature vector contains a non-finite value")]
    NonFinite,

    #[error("Score out of range: {0}")]
    OutOfRange(f64),

    #[error("Invalid baseline: {0}")]
    InvalidBaseline(String),
}

/// A source of normalized anomaly scores
pub trait AnomalyScorer: Send + Sync {
    /// Score a feature vector; higher is more anomalous
    fn score(&self, features: &[f64]) -> Result<f64, ScoringError>;
}

/// Ask the scorer for a score, treating any failure as unavailable
pub fn score_or_unavailable(scorer: &dyn AnomalyScorer, features: &[f64]) -> Option<f64> {
    match scorer.score(features) {
        Ok(score) if score.is_finite() && (0.0..=1.0).contains(&score) => Some(score),
        Ok(score) => {
            log::warn!("Scorer unavailable: {}", ScoringError::OutOfRange(score));
            None
        }
        Err(e) => {
            log::warn!("Scorer unavailable: {}", e);
            None
        }
    }
}

/// Distance-from-baseline scorer
///
/// Each feature is standardized against a per-feature mean and standard
/// deviation; the mean squared z-score `m` maps to `1 - exp(-m / 2)`.
/// Vectors are zero padded or truncated to the baseline dimension.
#[derive(Debug, Clone)]
pub struct BaselineScorer {
    mean: Vec<f64>,
    std_dev: Vec<f64>,
}

impl BaselineScorer {
    pub fn new(mean: Vec<f64>, std_dev: Vec<f64>) -> Result<Self, ScoringError> {
        if mean.is_empty() || mean.len() != std_dev.len() {
            return Err(ScoringError::InvalidBaseline(format!(
                "mean has {} entries, std_dev has {}",
                mean.len(),
                std_dev.len()
            )));
        }
        if mean.iter().any(|m| !m.is_finite())
            || std_dev.iter().any(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(ScoringError::InvalidBaseline(
                "means must be finite and deviations positive".to_string(),
            ));
        }
        Ok(BaselineScorer { mean, std_dev })
    }

    pub fn from_config(config: &ScoringConfig) -> Result<Self, ScoringError> {
        Self::new(config.baseline_mean.clone(), config.baseline_std.clone())
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }
}

impl AnomalyScorer for BaselineScorer {
    fn score(&self, features: &[f64]) -> Result<f64, ScoringError> {
        if features.iter().any(|f| !f.is_finite()) {
            return Err(ScoringError::NonFinite);
        }

        let sum_sq: f64 = self
            .mean
            .iter()
            .zip(&self.std_dev)
            .enumerate()
            .map(|(i, (mean, std_dev))| {
                let x = features.get(i).copied().unwrap_or(0.0);
                ((x - mean) / std_dev).powi(2)
            })
            .sum();

        let mean_sq = sum_sq / self.dimension() as f64;
        Ok((1.0 - (-mean_sq / 2.0).exp()).clamp(0.0, 1.0))
    }
}
