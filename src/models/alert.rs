use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use std::str::FromStr;

/// Severity tier assigned to an alert
///
/// `Unknown` is only ever reported back from a correlation pass that could
/// not find its alert; it is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "unknown" => Ok(Severity::Unknown),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Anonymized subset of the raw event details
///
/// Only whitelisted fields survive anonymization, so this is a closed
/// record rather than a free-form map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskedDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip_masked: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports_scanned: Option<Number>,
}

impl MaskedDetails {
    pub fn is_empty(&self) -> bool {
        *self == MaskedDetails::default()
    }
}

/// A persisted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub site_id: String,
    pub timestamp: String,
    pub event_type: String,
    pub masked_details: MaskedDetails,
    pub anomaly_score: Option<f64>,
    pub severity: Severity,
    pub summary: String,
    /// Set once the correlation pass has written its result
    #[serde(skip)]
    pub resolved: bool,
}

/// An alert as handed to the store, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub site_id: String,
    pub timestamp: String,
    pub event_type: String,
    pub masked_details: MaskedDetails,
    pub anomaly_score: Option<f64>,
    pub severity: Severity,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" medium ".parse::<Severity>().unwrap(), Severity::Medium);
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn test_masked_details_skip_absent_fields() {
        let details = MaskedDetails {
            username_hash: Some("123456".to_string()),
            attempts: Some(Number::from(4)),
            ..Default::default()
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json, serde_json::json!({"username_hash": "123456", "attempts": 4}));
        assert!(MaskedDetails::default().is_empty());
    }

    #[test]
    fn test_alert_serialization_hides_resolution_flag() {
        let alert = Alert {
            id: 7,
            site_id: "SUC_A".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            event_type: "port_scan".to_string(),
            masked_details: MaskedDetails::default(),
            anomaly_score: None,
            severity: Severity::Low,
            summary: String::new(),
            resolved: true,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert!(json.get("resolved").is_none());
        assert_eq!(json["severity"], "Low");
        assert!(json["anomaly_score"].is_null());
    }
}
