//! Read-side aggregation over the alert store
//!
//! Metrics are recomputed from a full scan on every call; nothing is cached.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detection::correlation::is_coordinated_summary;
use crate::models::{Alert, Severity};
use crate::persistence::AlertStore;

/// Alert counts per severity tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Aggregate view of all stored alerts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubMetrics {
    pub total_alerts: usize,
    pub by_severity: SeverityCounts,
    pub by_site: BTreeMap<String, usize>,
    pub by_event_type: BTreeMap<String, usize>,
    pub coordinated_count: usize,
}

impl HubMetrics {
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        let mut metrics = HubMetrics {
            total_alerts: alerts.len(),
            ..Default::default()
        };

        for alert in alerts {
            match alert.severity {
                Severity::High => metrics.by_severity.high += 1,
                Severity::Low => metrics.by_severity.low += 1,
                // Unknown is never persisted; count it with Medium so the
                // severity buckets always add up to the total.
                Severity::Medium | Severity::Unknown => metrics.by_severity.medium += 1,
            }
            *metrics.by_site.entry(alert.site_id.clone()).or_insert(0) += 1;
            *metrics
                .by_event_type
                .entry(alert.event_type.clone())
                .or_insert(0) += 1;
            if is_coordinated_summary(&alert.summary) {
                metrics.coordinated_count += 1;
            }
        }

        metrics
    }
}

/// Computes [`HubMetrics`] from the store on demand
pub struct MetricsService {
    store: Arc<dyn AlertStore>,
}

impl MetricsService {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        MetricsService { store }
    }

    /// Current metrics; a store failure yields empty metrics
    pub fn get_metrics(&self) -> HubMetrics {
        match self.store.list_alerts() {
            Ok(alerts) => HubMetrics::from_alerts(&alerts),
            Err(e) => {
                log::error!("Failed to compute metrics: {}", e);
                HubMetrics::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaskedDetails;
    use crate::persistence::testing::FailingStore;

    fn alert(id: i64, site_id: &str, event_type: &str, severity: Severity, summary: &str) -> Alert {
        Alert {
            id,
            site_id: site_id.to_string(),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            event_type: event_type.to_string(),
            masked_details: MaskedDetails::default(),
            anomaly_score: None,
            severity,
            summary: summary.to_string(),
            resolved: true,
        }
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = HubMetrics::from_alerts(&[]);
        assert_eq!(metrics, HubMetrics::default());
    }

    #[test]
    fn test_aggregation() {
        let alerts = vec![
            alert(4, "SUC_B", "login_attempts", Severity::High, "Coordinated login_attempts detected across schools"),
            alert(3, "SUC_B", "port_scan", Severity::Low, "port_scan detected by SUC_B"),
            alert(2, "SUC_A", "login_attempts", Severity::Medium, "login_attempts detected by SUC_A"),
            alert(1, "SUC_A", "login_attempts", Severity::High, "COORDINATED activity"),
        ];
        let metrics = HubMetrics::from_alerts(&alerts);

        assert_eq!(metrics.total_alerts, 4);
        assert_eq!(metrics.by_severity, SeverityCounts { high: 2, medium: 1, low: 1 });
        assert_eq!(metrics.by_site["SUC_A"], 2);
        assert_eq!(metrics.by_site["SUC_B"], 2);
        assert_eq!(metrics.by_event_type["login_attempts"], 3);
        assert_eq!(metrics.by_event_type["port_scan"], 1);
        assert_eq!(metrics.coordinated_count, 2);
    }

    #[test]
    fn test_severity_buckets_sum_to_total() {
        let alerts = vec![
            alert(3, "S", "T", Severity::Unknown, ""),
            alert(2, "S", "T", Severity::Low, ""),
            alert(1, "S", "T", Severity::High, ""),
        ];
        let metrics = HubMetrics::from_alerts(&alerts);
        let buckets = metrics.by_severity.high + metrics.by_severity.medium + metrics.by_severity.low;
        assert_eq!(buckets, metrics.total_alerts);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(HubMetrics::from_alerts(&[alert(1, "S1", "T", Severity::Low, "")])).unwrap();
        assert_eq!(json["total_alerts"], 1);
        assert_eq!(json["by_severity"]["low"], 1);
        assert_eq!(json["by_site"]["S1"], 1);
        assert_eq!(json["by_event_type"]["T"], 1);
        assert_eq!(json["coordinated_count"], 0);
    }

    #[test]
    fn test_store_failure_yields_empty_metrics() {
        let service = MetricsService::new(Arc::new(FailingStore));
        assert_eq!(service.get_metrics(), HubMetrics::default());
    }
}
