//! Baseline severity classification from an anomaly score

use crate::models::Severity;

/// Scores strictly above this are High
pub const HIGH_THRESHOLD: f64 = 0.7;

/// Scores strictly above this (and not High) are Medium
pub const MEDIUM_THRESHOLD: f64 = 0.5;

/// Map an anomaly score to a severity tier
///
/// A missing score is classified Medium rather than Low.
pub fn classify(score: Option<f64>) -> Severity {
    match score {
        None => Severity::Medium,
        Some(s) if s.is_nan() => Severity::Medium,
        Some(s) if s > HIGH_THRESHOLD => Severity::High,
        Some(s) if s > MEDIUM_THRESHOLD => Severity::Medium,
        Some(_) => Severity::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_points() {
        assert_eq!(classify(Some(0.9)), Severity::High);
        assert_eq!(classify(Some(0.6)), Severity::Medium);
        assert_eq!(classify(Some(0.3)), Severity::Low);
        assert_eq!(classify(None), Severity::Medium);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(classify(Some(0.7)), Severity::Medium);
        assert_eq!(classify(Some(0.7000001)), Severity::High);
        assert_eq!(classify(Some(0.5)), Severity::Low);
        assert_eq!(classify(Some(0.5000001)), Severity::Medium);
        assert_eq!(classify(Some(0.0)), Severity::Low);
        assert_eq!(classify(Some(1.0)), Severity::High);
    }

    #[test]
    fn test_monotonic_over_unit_interval() {
        let rank = |s: Severity| match s {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Unknown => unreachable!(),
        };
        let ranks: Vec<u8> = (0..=100)
            .map(|i| rank(classify(Some(i as f64 / 100.0))))
            .collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    }
}
