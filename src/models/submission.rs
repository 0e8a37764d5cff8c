use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::Severity;

/// Telemetry event as submitted by a reporting site
///
/// Unknown payload fields (e.g. `anomaly_label`) are ignored on
/// deserialization; nothing outside this struct reaches the pipeline.
/// Optional fields of the wrong JSON type never reject the event: scalar
/// identifiers are stringified, anything else falls back to its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSubmission {
    #[serde(default, alias = "suc_id", deserialize_with = "scalar_as_string")]
    pub site_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub event_type: Option<String>,
    /// Only string timestamps are kept; others default to ingestion time
    #[serde(default, deserialize_with = "string_only")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub raw_details: Option<Value>,
    /// Either a number or a numeric string; anything else is stored as null
    #[serde(default)]
    pub anomaly_score: Option<Value>,
    /// Feature vector for the anomaly scorer, used when no score is supplied
    #[serde(default, deserialize_with = "numeric_array")]
    pub features: Option<Vec<f64>>,
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// An array made only of numbers; anything else means no features
fn numeric_array<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().map(Value::as_f64).collect(),
        _ => None,
    })
}

impl AlertSubmission {
    pub fn new(site_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        AlertSubmission {
            site_id: Some(site_id.into()),
            event_type: Some(event_type.into()),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.anomaly_score = Some(Value::from(score));
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.raw_details = Some(details);
        self
    }

    pub fn with_features(mut self, features: Vec<f64>) -> Self {
        self.features = Some(features);
        self
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub id: i64,
    pub severity: Severity,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_suc_id_alias() {
        let json = r#"{"suc_id": "SUC_A", "event_type": "login_attempts", "anomaly_label": "anomaly"}"#;
        let submission: AlertSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.site_id.as_deref(), Some("SUC_A"));
        assert_eq!(submission.event_type.as_deref(), Some("login_attempts"));
        assert!(submission.anomaly_score.is_none());
    }

    #[test]
    fn test_score_accepts_any_json() {
        let json = r#"{"site_id": "S1", "anomaly_score": "not-a-number"}"#;
        let submission: AlertSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.anomaly_score, Some(Value::from("not-a-number")));
    }

    #[test]
    fn test_wrongly_typed_optional_fields_are_coerced() {
        let json = r#"{"site_id": 101, "event_type": 42, "timestamp": 1714557600, "features": [1, "x"]}"#;
        let submission: AlertSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.site_id.as_deref(), Some("101"));
        assert_eq!(submission.event_type.as_deref(), Some("42"));
        assert!(submission.timestamp.is_none());
        assert!(submission.features.is_none());

        let json = r#"{"suc_id": "SUC_A", "event_type": null, "timestamp": {"at": 1}, "features": "1,2"}"#;
        let submission: AlertSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.site_id.as_deref(), Some("SUC_A"));
        assert!(submission.event_type.is_none());
        assert!(submission.timestamp.is_none());
        assert!(submission.features.is_none());
    }

    #[test]
    fn test_numeric_features_are_kept() {
        let json = r#"{"site_id": "S1", "features": [3, 0.25]}"#;
        let submission: AlertSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.features, Some(vec![3.0, 0.25]));
    }
}
