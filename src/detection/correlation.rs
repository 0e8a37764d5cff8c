//! Cross-site correlation
//!
//! Detects coordinated activity: an alert is coordinated when another alert
//! of the same event type, reported by a different site, lies within the
//! correlation window of it. Each alert goes through exactly one
//! correlation pass right after it is stored, which fixes its final
//! severity and summary.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::{Alert, Severity};
use crate::persistence::{AlertStore, PersistenceError};

/// Default correlation window in seconds
pub const DEFAULT_WINDOW_SECONDS: i64 = 120;

/// Largest window, in seconds, a `Duration` can represent
pub const MAX_WINDOW_SECONDS: i64 = i64::MAX / 1_000;

/// Summary reported when the alert to correlate does not exist
pub const NOT_FOUND_SUMMARY: &str = "No record found";

/// Summary reported when the correlation pass itself failed
pub const ERROR_SUMMARY: &str = "Error processing alert";

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Final severity and summary of one correlation pass
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationOutcome {
    pub severity: Severity,
    pub summary: String,
    pub coordinated: bool,
}

impl CorrelationOutcome {
    fn not_found() -> Self {
        CorrelationOutcome {
            severity: Severity::Unknown,
            summary: NOT_FOUND_SUMMARY.to_string(),
            coordinated: false,
        }
    }

    fn degraded() -> Self {
        CorrelationOutcome {
            severity: Severity::Medium,
            summary: ERROR_SUMMARY.to_string(),
            coordinated: false,
        }
    }

    fn from_stored(alert: &Alert) -> Self {
        CorrelationOutcome {
            severity: alert.severity,
            summary: alert.summary.clone(),
            coordinated: is_coordinated_summary(&alert.summary),
        }
    }
}

/// Summary written onto an alert found to be part of a coordinated attack
pub fn coordinated_summary(event_type: &str) -> String {
    format!("Coordinated {} detected across schools", event_type)
}

/// Summary written onto an alert with no cross-site match
pub fn plain_summary(event_type: &str, site_id: &str) -> String {
    format!("{} detected by {}", event_type, site_id)
}

/// Whether a stored summary marks its alert as coordinated
pub fn is_coordinated_summary(summary: &str) -> bool {
    summary.to_lowercase().contains("coordinated")
}

/// Best-effort timestamp parsing
///
/// Accepts RFC 3339 (`Z` or numeric offset), ISO-8601 with a colon-less
/// offset, naive date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Correlates freshly stored alerts against recent alerts from other sites
pub struct CorrelationEngine {
    store: Arc<dyn AlertStore>,
    window: Duration,
}

impl CorrelationEngine {
    /// Create an engine with the default 120 second window
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self::with_window(store, DEFAULT_WINDOW_SECONDS)
    }

    /// Create an engine with a custom window
    ///
    /// Negative windows are treated as zero and windows beyond what a
    /// `Duration` can hold are capped at [`MAX_WINDOW_SECONDS`].
    pub fn with_window(store: Arc<dyn AlertStore>, window_seconds: i64) -> Self {
        let clamped = window_seconds.clamp(0, MAX_WINDOW_SECONDS);
        if clamped != window_seconds {
            log::warn!(
                "Correlation window of {}s out of range, using {}s",
                window_seconds,
                clamped
            );
        }

        CorrelationEngine {
            store,
            window: Duration::try_seconds(clamped).unwrap_or_else(Duration::zero),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run the correlation pass for an alert and persist its outcome
    ///
    /// Never fails: a missing alert yields an `Unknown` outcome and any
    /// internal error yields a `Medium` outcome with a generic summary.
    pub fn correlate(&self, alert_id: i64) -> CorrelationOutcome {
        match self.try_correlate(alert_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Correlation failed for alert #{}: {}", alert_id, e);
                CorrelationOutcome::degraded()
            }
        }
    }

    fn try_correlate(&self, alert_id: i64) -> Result<CorrelationOutcome, PersistenceError> {
        let alert = match self.store.get_alert(alert_id)? {
            Some(alert) => alert,
            None => {
                log::warn!("Correlation requested for missing alert #{}", alert_id);
                return Ok(CorrelationOutcome::not_found());
            }
        };

        if alert.resolved {
            log::debug!("Alert #{} already correlated", alert_id);
            return Ok(CorrelationOutcome::from_stored(&alert));
        }

        let subject_time = parse_timestamp(&alert.timestamp).unwrap_or_else(|| {
            log::debug!(
                "Alert #{} has unparsable timestamp {:?}, using current time",
                alert.id,
                alert.timestamp
            );
            Utc::now()
        });

        let outcome = match self.find_peer(&alert, subject_time)? {
            Some(peer) => {
                log::info!(
                    "Coordinated {} detected: alert #{} ({}) matches alert #{} ({})",
                    alert.event_type,
                    alert.id,
                    alert.site_id,
                    peer.id,
                    peer.site_id
                );
                CorrelationOutcome {
                    severity: Severity::High,
                    summary: coordinated_summary(&alert.event_type),
                    coordinated: true,
                }
            }
            None => CorrelationOutcome {
                severity: alert.severity,
                summary: plain_summary(&alert.event_type, &alert.site_id),
                coordinated: false,
            },
        };

        if !self
            .store
            .resolve_alert(alert.id, outcome.severity, &outcome.summary)?
        {
            // Lost a race with another pass over the same alert; its result stands.
            return match self.store.get_alert(alert.id)? {
                Some(stored) => Ok(CorrelationOutcome::from_stored(&stored)),
                None => Ok(CorrelationOutcome::not_found()),
            };
        }

        Ok(outcome)
    }

    /// First alert, scanning newest to oldest, of the same event type from
    /// another site within the window
    fn find_peer(
        &self,
        alert: &Alert,
        subject_time: DateTime<Utc>,
    ) -> Result<Option<Alert>, PersistenceError> {
        self.store
            .find_by_event_type(&alert.event_type, alert.id, &mut |candidate: &Alert| {
                match parse_timestamp(&candidate.timestamp) {
                    Some(candidate_time) => {
                        candidate.site_id != alert.site_id
                            && self.within_window(subject_time, candidate_time)
                    }
                    None => {
                        log::debug!(
                            "Skipping alert #{} with unparsable timestamp {:?}",
                            candidate.id,
                            candidate.timestamp
                        );
                        false
                    }
                }
            })
    }

    fn within_window(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        (a - b).abs() <= self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MaskedDetails, NewAlert};
    use crate::persistence::testing::FailingStore;
    use crate::persistence::SqliteAlertStore;

    const T0: &str = "2024-05-01T10:00:00Z";

    fn setup() -> (Arc<SqliteAlertStore>, CorrelationEngine) {
        let store = Arc::new(SqliteAlertStore::in_memory().unwrap());
        let engine = CorrelationEngine::new(store.clone());
        (store, engine)
    }

    fn at(offset_secs: i64) -> String {
        (parse_timestamp(T0).unwrap() + Duration::seconds(offset_secs)).to_rfc3339()
    }

    fn insert(store: &SqliteAlertStore, site_id: &str, event_type: &str, timestamp: &str, severity: Severity) -> i64 {
        store
            .insert_alert(&NewAlert {
                site_id: site_id.to_string(),
                timestamp: timestamp.to_string(),
                event_type: event_type.to_string(),
                masked_details: MaskedDetails::default(),
                anomaly_score: None,
                severity,
                summary: String::new(),
            })
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01T10:00:00.250"),
            Some(expected + Duration::milliseconds(250))
        );
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_cross_site_within_window_is_coordinated() {
        let (store, engine) = setup();
        let a = insert(&store, "S1", "T", &at(0), Severity::High);
        assert!(!engine.correlate(a).coordinated);

        let b = insert(&store, "S2", "T", &at(90), Severity::Low);
        let outcome = engine.correlate(b);

        assert!(outcome.coordinated);
        assert_eq!(outcome.severity, Severity::High);
        assert_eq!(outcome.summary, "Coordinated T detected across schools");

        let stored = store.get_alert(b).unwrap().unwrap();
        assert_eq!(stored.severity, Severity::High);
        assert!(is_coordinated_summary(&stored.summary));
    }

    #[test]
    fn test_outside_window_is_not_coordinated() {
        let (store, engine) = setup();
        let a = insert(&store, "S1", "T", &at(0), Severity::Low);
        engine.correlate(a);

        let c = insert(&store, "S2", "T", &at(200), Severity::Low);
        let outcome = engine.correlate(c);

        assert!(!outcome.coordinated);
        assert_eq!(outcome.severity, Severity::Low);
        assert_eq!(outcome.summary, "T detected by S2");
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let (store, engine) = setup();
        insert(&store, "S1", "T", &at(0), Severity::Low);
        let b = insert(&store, "S2", "T", &at(120), Severity::Low);
        assert!(engine.correlate(b).coordinated);

        let (store, engine) = setup();
        insert(&store, "S1", "T", &at(0), Severity::Low);
        let b = insert(&store, "S2", "T", &at(121), Severity::Low);
        assert!(!engine.correlate(b).coordinated);
    }

    #[test]
    fn test_earlier_timestamp_still_matches() {
        let (store, engine) = setup();
        insert(&store, "S1", "T", &at(60), Severity::Low);
        let b = insert(&store, "S2", "T", &at(0), Severity::Low);
        assert!(engine.correlate(b).coordinated);
    }

    #[test]
    fn test_same_site_is_not_coordinated() {
        let (store, engine) = setup();
        insert(&store, "S1", "T", &at(0), Severity::Low);
        let c = insert(&store, "S1", "T", &at(10), Severity::Medium);

        let outcome = engine.correlate(c);
        assert!(!outcome.coordinated);
        assert_eq!(outcome.severity, Severity::Medium);
        assert_eq!(outcome.summary, "T detected by S1");
    }

    #[test]
    fn test_different_event_type_is_not_coordinated() {
        let (store, engine) = setup();
        insert(&store, "S1", "port_scan", &at(0), Severity::Low);
        let b = insert(&store, "S2", "login_attempts", &at(5), Severity::Low);
        assert!(!engine.correlate(b).coordinated);
    }

    #[test]
    fn test_unparsable_candidates_are_skipped() {
        let (store, engine) = setup();
        insert(&store, "S1", "T", &at(0), Severity::Low);
        insert(&store, "S3", "T", "not a time", Severity::Low);
        let b = insert(&store, "S2", "T", &at(30), Severity::Low);
        assert!(engine.correlate(b).coordinated);

        let (store, engine) = setup();
        insert(&store, "S3", "T", "not a time", Severity::Low);
        let b = insert(&store, "S2", "T", &at(30), Severity::Low);
        assert!(!engine.correlate(b).coordinated);
    }

    #[test]
    fn test_unparsable_subject_uses_current_time() {
        let (store, engine) = setup();
        insert(&store, "S1", "T", &Utc::now().to_rfc3339(), Severity::Low);
        let b = insert(&store, "S2", "T", "garbled", Severity::Low);
        assert!(engine.correlate(b).coordinated);
    }

    #[test]
    fn test_missing_alert_is_unknown() {
        let (_store, engine) = setup();
        let outcome = engine.correlate(42);
        assert_eq!(outcome.severity, Severity::Unknown);
        assert_eq!(outcome.summary, NOT_FOUND_SUMMARY);
    }

    #[test]
    fn test_rerun_returns_stored_result() {
        let (store, engine) = setup();
        insert(&store, "S1", "T", &at(0), Severity::Low);
        let b = insert(&store, "S2", "T", &at(30), Severity::Low);

        let first = engine.correlate(b);
        let second = engine.correlate(b);
        assert_eq!(first, second);
    }

    #[test]
    fn test_store_failure_degrades_to_medium() {
        let engine = CorrelationEngine::new(Arc::new(FailingStore));
        let outcome = engine.correlate(1);
        assert_eq!(outcome.severity, Severity::Medium);
        assert_eq!(outcome.summary, ERROR_SUMMARY);
        assert!(!outcome.coordinated);
    }

    #[test]
    fn test_custom_window() {
        let store = Arc::new(SqliteAlertStore::in_memory().unwrap());
        let engine = CorrelationEngine::with_window(store.clone(), 30);
        assert_eq!(engine.window(), Duration::seconds(30));

        insert(&store, "S1", "T", &at(0), Severity::Low);
        let b = insert(&store, "S2", "T", &at(45), Severity::Low);
        assert!(!engine.correlate(b).coordinated);
    }

    #[test]
    fn test_out_of_range_windows_are_clamped() {
        let store = Arc::new(SqliteAlertStore::in_memory().unwrap());

        let engine = CorrelationEngine::with_window(store.clone(), -5);
        assert_eq!(engine.window(), Duration::zero());

        let engine = CorrelationEngine::with_window(store.clone(), i64::MAX);
        assert_eq!(engine.window(), Duration::seconds(MAX_WINDOW_SECONDS));

        insert(&store, "S1", "T", "2001-01-01T00:00:00Z", Severity::Low);
        let b = insert(&store, "S2", "T", &at(0), Severity::Low);
        assert!(engine.correlate(b).coordinated);
    }
}
