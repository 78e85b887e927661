//! SQLite observation store
//!
//! One table keyed `UNIQUE(security_id, date)`. Decimals are stored as text
//! so prices and ratios round-trip exactly. Bulk inserts run inside a single
//! transaction, so a failed batch leaves the table unchanged.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::domain::Observation;
use crate::ports::{StorageError, StoragePort};

const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    security_id TEXT NOT NULL,
    date TEXT NOT NULL,
    price TEXT NOT NULL,
    eps TEXT,
    per TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(security_id, date)
);

CREATE INDEX IF NOT EXISTS idx_observations_security_date
ON observations(security_id, date DESC);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

/// SQLite-backed [`StoragePort`]
pub struct SqliteStore {
    /// rusqlite::Connection is Send but not Sync
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Database(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        tracing::info!(db_path = %path.display(), "Opened observation store");
        Self::with_connection(conn)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(CREATE_TABLES_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Number of stored rows for a security
    pub async fn count(&self, security_id: &str) -> Result<usize, StorageError> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM observations WHERE security_id = ?1",
            params![security_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

type RawRow = (String, String, String, Option<String>, Option<String>);

fn read_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn to_observation(raw: RawRow) -> Result<Observation, StorageError> {
    let (security_id, date, price, eps, per) = raw;
    let corrupt = |reason: String| StorageError::CorruptRow {
        security_id: security_id.clone(),
        reason,
    };

    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| corrupt(format!("date '{}': {}", date, e)))?;
    let decimal = |text: &str| {
        Decimal::from_str(text).map_err(|e| corrupt(format!("number '{}': {}", text, e)))
    };
    let price = decimal(&price)?;
    let eps = eps.as_deref().map(decimal).transpose()?;
    let per = per.as_deref().map(decimal).transpose()?;

    Ok(Observation::new(security_id.clone(), date, price, eps, per))
}

#[async_trait]
impl StoragePort for SqliteStore {
    async fn get_latest(&self, security_id: &str) -> Result<Option<Observation>, StorageError> {
        let db = self.db.lock().await;
        let raw = db
            .query_row(
                "SELECT security_id, date, price, eps, per FROM observations
                 WHERE security_id = ?1 ORDER BY date DESC LIMIT 1",
                params![security_id],
                read_raw,
            )
            .optional()?;
        raw.map(to_observation).transpose()
    }

    async fn get_series(
        &self,
        security_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, StorageError> {
        let db = self.db.lock().await;
        // ISO dates order lexically; "" precedes every date
        let since = since
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        let mut stmt = db.prepare(
            "SELECT security_id, date, price, eps, per FROM observations
             WHERE security_id = ?1 AND date > ?2 ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![security_id, since], read_raw)?;

        let mut observations = Vec::new();
        for raw in rows {
            observations.push(to_observation(raw?)?);
        }
        Ok(observations)
    }

    async fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, StorageError> {
        if observations.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO observations (security_id, date, price, eps, per)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for obs in observations {
                written += stmt.execute(params![
                    obs.security_id,
                    obs.date.format(DATE_FORMAT).to_string(),
                    obs.price.to_string(),
                    obs.eps.map(|v| v.to_string()),
                    obs.per.map(|v| v.to_string()),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(rows = written, "Inserted observations");
        Ok(written)
    }
}
