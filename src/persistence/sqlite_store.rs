//! SQLite implementation of the AlertStore trait

use super::{AlertStore, PersistenceError};
use crate::models::{Alert, MaskedDetails, NewAlert, Severity};
use rusqlite::{params, Connection, OpenFlags, Params, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const ALERT_COLUMNS: &str =
    "id, site_id, timestamp, event_type, masked_details, anomaly_score, severity, summary, resolved";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based alert storage
///
/// All writes go through a single connection guarded by a mutex, which
/// serializes inserts and the correlation update. File-backed stores run in
/// WAL mode and read through a second, read-only connection, so scans never
/// wait on the writer and only ever observe committed rows.
pub struct SqliteAlertStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
}

impl SqliteAlertStore {
    /// Create a new SQLite alert store at the specified path
    ///
    /// Creates the database file and initializes the schema if it doesn't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let db_path = db_path.as_ref();

        let writer = Connection::open(db_path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            log::warn!("SQLite refused WAL mode, running with journal_mode={}", mode);
        }
        writer.execute_batch(include_str!("schema.sql"))?;

        let reader = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(BUSY_TIMEOUT)?;

        Ok(SqliteAlertStore {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
        })
    }

    /// Create an in-memory SQLite database (useful for testing)
    ///
    /// Reads and writes share one connection.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(SqliteAlertStore {
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.writer.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.reader
            .as_ref()
            .unwrap_or(&self.writer)
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)
    }

    fn query_alerts<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Alert>, PersistenceError> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(sql)?;
        let alerts = stmt
            .query_map(params, row_to_alert)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alerts)
    }
}

/// Decode an alert row
///
/// Decoding is lenient: a row with damaged optional columns still yields
/// an alert rather than failing the whole scan.
fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let site_id: Option<String> = row.get(1)?;
    let timestamp: Option<String> = row.get(2)?;
    let event_type: Option<String> = row.get(3)?;
    let masked_details: Option<String> = row.get(4)?;
    let severity: Option<String> = row.get(6)?;
    let summary: Option<String> = row.get(7)?;

    Ok(Alert {
        id: row.get(0)?,
        site_id: site_id.unwrap_or_else(|| "unknown".to_string()),
        timestamp: timestamp.unwrap_or_default(),
        event_type: event_type.unwrap_or_else(|| "unknown".to_string()),
        masked_details: masked_details
            .and_then(|json| serde_json::from_str::<MaskedDetails>(&json).ok())
            .unwrap_or_default(),
        anomaly_score: row.get(5)?,
        severity: severity
            .and_then(|s| s.parse().ok())
            .unwrap_or(Severity::Medium),
        summary: summary.unwrap_or_default(),
        resolved: row.get(8)?,
    })
}

impl AlertStore for SqliteAlertStore {
    fn insert_alert(&self, alert: &NewAlert) -> Result<i64, PersistenceError> {
        if let Some(score) = alert.anomaly_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(PersistenceError::InvalidData(format!(
                    "Anomaly score out of range: {}",
                    score
                )));
            }
        }
        if alert.severity == Severity::Unknown {
            return Err(PersistenceError::InvalidData(
                "Cannot persist an alert with Unknown severity".to_string(),
            ));
        }

        let masked_details = serde_json::to_string(&alert.masked_details)?;
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO alerts
             (site_id, timestamp, event_type, masked_details, anomaly_score, severity, summary)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                alert.site_id,
                alert.timestamp,
                alert.event_type,
                masked_details,
                alert.anomaly_score,
                alert.severity.as_str(),
                alert.summary
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_alert(&self, id: i64) -> Result<Option<Alert>, PersistenceError> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM alerts WHERE id = ?", ALERT_COLUMNS))?;

        match stmt.query_row(params![id], row_to_alert) {
            Ok(alert) => Ok(Some(alert)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_alert(
        &self,
        id: i64,
        severity: Severity,
        summary: &str,
    ) -> Result<bool, PersistenceError> {
        if severity == Severity::Unknown {
            return Err(PersistenceError::InvalidData(
                "Cannot resolve an alert to Unknown severity".to_string(),
            ));
        }

        let conn = self.writer()?;
        let changed = conn.execute(
            "UPDATE alerts SET severity = ?, summary = ?, resolved = 1
             WHERE id = ? AND resolved = 0",
            params![severity.as_str(), summary, id],
        )?;
        Ok(changed == 1)
    }

    fn find_by_event_type(
        &self,
        event_type: &str,
        exclude_id: i64,
        matches: &mut dyn FnMut(&Alert) -> bool,
    ) -> Result<Option<Alert>, PersistenceError> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM alerts WHERE event_type = ? AND id <> ? ORDER BY id DESC",
            ALERT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![event_type, exclude_id], row_to_alert)?;

        for row in rows {
            let alert = row?;
            if matches(&alert) {
                return Ok(Some(alert));
            }
        }
        Ok(None)
    }

    fn list_alerts(&self) -> Result<Vec<Alert>, PersistenceError> {
        self.query_alerts(
            &format!("SELECT {} FROM alerts ORDER BY id DESC", ALERT_COLUMNS),
            [],
        )
    }

    fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_alerts(
            &format!("SELECT {} FROM alerts ORDER BY id DESC LIMIT ?", ALERT_COLUMNS),
            params![limit],
        )
    }

    fn ping(&self) -> Result<(), PersistenceError> {
        let conn = self.reader()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
