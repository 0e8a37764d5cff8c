//! Reporting-site simulator
//!
//! Produces synthetic telemetry the way a school's sensor would and posts
//! it to a running hub. Used for demos and manual end-to-end checks.

use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::api::SubmitResponse;
use crate::detection::scoring::{score_or_unavailable, AnomalyScorer};
use crate::models::AlertSubmission;

/// Score used when the scorer cannot produce one
pub const FALLBACK_SCORE: f64 = 0.5;

const LOGIN_ATTEMPTS: [u32; 11] = [1, 1, 1, 2, 3, 4, 5, 6, 8, 10, 12];
const BURST_LOGIN_ATTEMPTS: [u32; 6] = [5, 6, 7, 8, 10, 12];
const PORTS_SCANNED: [u32; 11] = [1, 1, 1, 2, 3, 5, 10, 15, 20, 30, 50];

/// Probability that the port-scan profile emits a login burst instead
const LOGIN_BURST_PROBABILITY: f64 = 0.3;

/// Errors that can occur while talking to the hub
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Hub rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Kind of traffic a simulated site reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SiteProfile {
    /// Login attempt telemetry from a 10.0.0.0/24 network
    Login,
    /// Port scans from a 192.168.1.0/24 network, with occasional login bursts
    PortScan,
}

impl SiteProfile {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "login" | "login_attempts" => Some(SiteProfile::Login),
            "portscan" | "port_scan" => Some(SiteProfile::PortScan),
            _ => None,
        }
    }
}

/// Generate one synthetic event for `site_id`
pub fn generate_event<R: Rng>(
    profile: SiteProfile,
    site_id: &str,
    scorer: &dyn AnomalyScorer,
    rng: &mut R,
) -> AlertSubmission {
    let jitter: f64 = rng.gen();
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    let (event_type, count, details) = match profile {
        SiteProfile::Login => {
            let attempts = *LOGIN_ATTEMPTS.choose(rng).unwrap_or(&1);
            let details = json!({
                "src_ip": format!("10.0.0.{}", rng.gen_range(2..=254)),
                "username": format!("user{}", rng.gen_range(1..=200)),
                "attempts": attempts,
            });
            ("login_attempts", attempts, details)
        }
        SiteProfile::PortScan if rng.gen_bool(LOGIN_BURST_PROBABILITY) => {
            let attempts = *BURST_LOGIN_ATTEMPTS.choose(rng).unwrap_or(&5);
            let details = json!({
                "src_ip": format!("192.168.1.{}", rng.gen_range(2..=254)),
                "username": format!("user{}", rng.gen_range(1..=200)),
                "attempts": attempts,
            });
            ("login_attempts", attempts, details)
        }
        SiteProfile::PortScan => {
            let ports = *PORTS_SCANNED.choose(rng).unwrap_or(&1);
            let details = json!({
                "src_ip": format!("192.168.1.{}", rng.gen_range(2..=254)),
                "dst_port": rng.gen_range(20..=65535),
                "ports_scanned": ports,
            });
            ("port_scan", ports, details)
        }
    };

    let score = score_or_unavailable(scorer, &[f64::from(count), jitter]).unwrap_or(FALLBACK_SCORE);

    AlertSubmission::new(site_id, event_type)
        .with_timestamp(timestamp)
        .with_details(details)
        .with_score(score)
}

/// HTTP client for a hub's ingestion endpoint
pub struct HubClient {
    client: Client,
    hub_url: String,
}

impl HubClient {
    pub fn new(hub_url: impl Into<String>) -> Self {
        HubClient {
            client: Client::builder()
                .timeout(Duration::from_secs(3))
                .build()
                .unwrap_or_default(),
            hub_url: hub_url.into(),
        }
    }

    /// Post one event to the hub
    pub async fn send(&self, submission: &AlertSubmission) -> Result<SubmitResponse, SimulatorError> {
        let response = self.client.post(&self.hub_url).json(submission).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SimulatorError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<SubmitResponse>().await?)
    }
}
