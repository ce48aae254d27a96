use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use crate::error::HistoryError;
use crate::history::HistoryStore;
use crate::types::CycleRecord;

/// Initialise the history schema in `conn`.
///
/// `pulses` holds every id ever started; `pulse_cycles` is the append-only
/// log, read back in insertion (rowid) order.
pub fn init_db(conn: &Connection) -> Result<(), HistoryError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pulses (
            id            TEXT    NOT NULL PRIMARY KEY,
            first_started TEXT    NOT NULL    -- ISO-8601
        ) STRICT;

        CREATE TABLE IF NOT EXISTS pulse_cycles (
            pulse_id      TEXT    NOT NULL,
            cycle         INTEGER NOT NULL,   -- 1-based within a run
            timestamp     TEXT    NOT NULL,   -- ISO-8601
            burn_rate     REAL    NOT NULL,
            yield_score   REAL    NOT NULL,
            risk_level    TEXT    NOT NULL,
            action        TEXT    NOT NULL,
            cycle_time_ms INTEGER NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_pulse_cycles_pulse ON pulse_cycles (pulse_id);
        ",
    )?;
    Ok(())
}

/// SQLite-backed history that survives restarts.
pub struct SqliteHistory {
    db: Mutex<Connection>,
}

impl SqliteHistory {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self, HistoryError> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        Self::new(Connection::open(path)?)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, HistoryError> {
        self.db.lock().map_err(|_| HistoryError::Poisoned)
    }
}

impl HistoryStore for SqliteHistory {
    #[instrument(skip(self))]
    fn register(&self, pulse_id: &str) -> Result<(), HistoryError> {
        let db = self.conn()?;
        let inserted = db.execute(
            "INSERT OR IGNORE INTO pulses (id, first_started) VALUES (?1, ?2)",
            params![pulse_id, Utc::now().to_rfc3339()],
        )?;
        if inserted > 0 {
            debug!("first start recorded");
        }
        Ok(())
    }

    fn append(&self, pulse_id: &str, record: &CycleRecord) -> Result<(), HistoryError> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO pulse_cycles
             (pulse_id, cycle, timestamp, burn_rate, yield_score, risk_level, action, cycle_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                pulse_id,
                record.cycle as i64,
                record.timestamp.to_rfc3339(),
                record.burn_rate,
                record.yield_score,
                record.risk_level.as_str(),
                record.action.as_str(),
                record.cycle_time as i64,
            ],
        )?;
        Ok(())
    }

    fn history(&self, pulse_id: &str) -> Result<Vec<CycleRecord>, HistoryError> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT cycle, timestamp, burn_rate, yield_score, risk_level, action, cycle_time_ms
             FROM pulse_cycles WHERE pulse_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![pulse_id], row_to_record)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn pulse_count(&self) -> Result<usize, HistoryError> {
        let db = self.conn()?;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM pulses", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CycleRecord> {
    let timestamp: String = row.get(1)?;
    let risk: String = row.get(4)?;
    let action: String = row.get(5)?;
    Ok(CycleRecord {
        cycle: row.get::<_, i64>(0)? as u64,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| conversion_error(1, e))?
            .with_timezone(&Utc),
        burn_rate: row.get(2)?,
        yield_score: row.get(3)?,
        risk_level: risk.parse().map_err(|e: String| conversion_error(4, e))?,
        action: action.parse().map_err(|e: String| conversion_error(5, e))?,
        cycle_time: row.get::<_, i64>(6)? as u64,
    })
}

fn conversion_error(
    column: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::{exercise_store, record};

    #[test]
    fn sqlite_store_contract() {
        let store = SqliteHistory::new(Connection::open_in_memory().unwrap()).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = SqliteHistory::open(&path).unwrap();
            store.register("p1").unwrap();
            store.append("p1", &record(1, 12.5)).unwrap();
        }

        let store = SqliteHistory::open(&path).unwrap();
        let log = store.history("p1").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].burn_rate, 12.5);
        assert_eq!(store.pulse_count().unwrap(), 1);
    }
}
