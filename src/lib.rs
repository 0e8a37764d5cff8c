pub mod anonymize;
pub mod api;
pub mod config;
pub mod detection;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod output;
pub mod persistence;
pub mod simulator;

// Re-export commonly used types
pub use models::{Alert, AlertSubmission, Severity, SubmitReceipt};
pub use detection::{AnomalyScorer, BaselineScorer, CorrelationEngine, CorrelationOutcome};
pub use ingest::{HubService, IngestError};
pub use metrics::{HubMetrics, MetricsService};
pub use persistence::{AlertStore, PersistenceError, SqliteAlertStore};
