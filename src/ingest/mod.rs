//! Ingestion service
//!
//! Orchestrates one submission end to end: validate, anonymize, score,
//! classify, persist, correlate. Each successful call performs exactly one
//! insert and at most one update on the store.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::anonymize::anonymize;
use crate::config::{Config, IngestConfig};
use crate::detection::correlation::CorrelationEngine;
use crate::detection::scoring::{score_or_unavailable, AnomalyScorer, BaselineScorer};
use crate::detection::severity::classify;
use crate::metrics::{HubMetrics, MetricsService};
use crate::models::{Alert, AlertSubmission, NewAlert, SubmitReceipt};
use crate::persistence::{AlertStore, PersistenceError};

/// Event type recorded when a submission does not name one
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Errors surfaced to the submitter
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    Validation(String),

    #[error("failed to store alert: {0}")]
    Persistence(#[from] PersistenceError),
}

/// The hub's ingestion and query front door
pub struct HubService {
    store: Arc<dyn AlertStore>,
    correlation: CorrelationEngine,
    metrics: MetricsService,
    scorer: Option<Arc<dyn AnomalyScorer>>,
    limits: IngestConfig,
}

impl HubService {
    /// Create a service with default limits, the default correlation
    /// window and no scorer
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        HubService {
            correlation: CorrelationEngine::new(store.clone()),
            metrics: MetricsService::new(store.clone()),
            store,
            scorer: None,
            limits: IngestConfig::default(),
        }
    }

    /// Create a service configured from `config`, including the baseline
    /// scorer if its configuration is valid
    pub fn from_config(store: Arc<dyn AlertStore>, config: &Config) -> Self {
        let scorer: Option<Arc<dyn AnomalyScorer>> =
            match BaselineScorer::from_config(&config.scoring) {
                Ok(scorer) => Some(Arc::new(scorer) as Arc<dyn AnomalyScorer>),
                Err(e) => {
                    log::warn!("Baseline scorer disabled: {}", e);
                    None
                }
            };

        HubService {
            correlation: CorrelationEngine::with_window(
                store.clone(),
                config.correlation.window_seconds,
            ),
            metrics: MetricsService::new(store.clone()),
            store,
            scorer,
            limits: config.ingest.clone(),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn AnomalyScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn store(&self) -> &Arc<dyn AlertStore> {
        &self.store
    }

    /// Ingest one telemetry event
    ///
    /// A missing `site_id` is rejected before anything is written. Once the
    /// alert is stored the call succeeds even if correlation degrades.
    pub fn submit(&self, submission: &AlertSubmission) -> Result<SubmitReceipt, IngestError> {
        let site_id = submission
            .site_id
            .as_deref()
            .and_then(|s| sanitize(s, self.limits.max_field_len))
            .ok_or_else(|| IngestError::Validation("missing site_id".to_string()))?;

        let event_type = submission
            .event_type
            .as_deref()
            .and_then(|s| sanitize(s, self.limits.max_field_len))
            .unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_string());

        let timestamp = submission
            .timestamp
            .as_deref()
            .and_then(|s| sanitize(s, self.limits.max_timestamp_len))
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        let anomaly_score = self.resolve_score(submission);

        let alert = NewAlert {
            site_id,
            timestamp,
            event_type,
            masked_details: anonymize(submission.raw_details.as_ref()),
            anomaly_score,
            severity: classify(anomaly_score),
            summary: String::new(),
        };

        let id = self.store.insert_alert(&alert)?;
        let outcome = self.correlation.correlate(id);

        log::info!(
            "Received alert #{} from {}: {} (severity: {})",
            id,
            alert.site_id,
            alert.event_type,
            outcome.severity
        );

        Ok(SubmitReceipt {
            id,
            severity: outcome.severity,
            summary: outcome.summary,
        })
    }

    /// All alerts, most recent first; a store failure yields no alerts
    pub fn list_alerts(&self) -> Vec<Alert> {
        self.store.list_alerts().unwrap_or_else(|e| {
            log::error!("Failed to list alerts: {}", e);
            Vec::new()
        })
    }

    /// The `limit` most recent alerts; a store failure yields no alerts
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.store.recent_alerts(limit).unwrap_or_else(|e| {
            log::error!("Failed to list recent alerts: {}", e);
            Vec::new()
        })
    }

    pub fn get_metrics(&self) -> HubMetrics {
        self.metrics.get_metrics()
    }

    pub fn is_healthy(&self) -> bool {
        match self.store.ping() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Health check failed: {}", e);
                false
            }
        }
    }

    fn resolve_score(&self, submission: &AlertSubmission) -> Option<f64> {
        if let Some(raw) = &submission.anomaly_score {
            return normalize_score(raw);
        }
        match (&self.scorer, &submission.features) {
            (Some(scorer), Some(features)) => score_or_unavailable(scorer.as_ref(), features),
            _ => None,
        }
    }
}

/// Strip control characters and surrounding whitespace, then truncate to
/// `max_len` characters. Blank input yields `None`.
pub fn sanitize(raw: &str, max_len: usize) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect();
    let cleaned = cleaned.trim_end().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Interpret a submitted anomaly score
///
/// Numbers and numeric strings are clamped into [0, 1]; anything else,
/// including NaN, is unavailable.
pub fn normalize_score(raw: &Value) -> Option<f64> {
    let score = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if score.is_nan() {
        None
    } else {
        Some(score.clamp(0.0, 1.0))
    }
}
