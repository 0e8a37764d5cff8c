//! Persistence module for alert storage
//!
//! This module provides the durable alert table the ingestion pipeline
//! writes to and the correlation engine and metrics read from.

pub mod sqlite_store;

pub use sqlite_store::SqliteAlertStore;

use crate::models::{Alert, NewAlert, Severity};
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Trait for alert storage backends
///
/// Alerts are append-only. The only mutation allowed after insert is the
/// single severity/summary resolution written by the correlation pass.
/// A read issued after a write returns must observe that write.
pub trait AlertStore: Send + Sync {
    /// Insert a new alert atomically and return its freshly assigned id
    ///
    /// Ids are strictly increasing and never reused.
    fn insert_alert(&self, alert: &NewAlert) -> Result<i64, PersistenceError>;

    /// Fetch a single alert by id
    fn get_alert(&self, id: i64) -> Result<Option<Alert>, PersistenceError>;

    /// Record the resolved severity and summary of an alert
    ///
    /// Returns `false` without writing if the alert does not exist or has
    /// already been resolved.
    fn resolve_alert(
        &self,
        id: i64,
        severity: Severity,
        summary: &str,
    ) -> Result<bool, PersistenceError>;

    /// First alert of the given event type, other than `exclude_id`, for
    /// which `matches` holds, scanning most recent (highest id) first
    ///
    /// Rows are decoded one at a time and the scan stops at the first match.
    fn find_by_event_type(
        &self,
        event_type: &str,
        exclude_id: i64,
        matches: &mut dyn FnMut(&Alert) -> bool,
    ) -> Result<Option<Alert>, PersistenceError>;

    /// All alerts, most recent first
    fn list_alerts(&self) -> Result<Vec<Alert>, PersistenceError>;

    /// The `limit` most recent alerts
    fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, PersistenceError>;

    /// Check that the backend is reachable
    fn ping(&self) -> Result<(), PersistenceError>;
}
