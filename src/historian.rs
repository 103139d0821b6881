//! Append-only historian over SQLite
//!
//! One physical table per sensor kind plus a shared event log, matching the
//! on-disk layout existing dashboards read. Internally everything funnels
//! through the generic [`SensorReading`] entity; only the persisted layout
//! is denormalized. Schema creation is idempotent and runs once when the
//! store is opened, before the first write.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;
use crate::events::Event;
use crate::registers::{SensorKind, SensorReading};

/// Timestamp layout shared by every persisted row
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only sink for readings and derived events
#[derive(Clone)]
pub struct Historian {
    pool: SqlitePool,
}

impl Historian {
    /// Open (or create) the historian database and ensure its schema.
    ///
    /// WAL journal mode and a busy timeout keep the store usable next to
    /// dashboard readers on the same file.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Historian> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let historian = Historian { pool };
        historian.ensure_schema().await?;

        info!("Historian database ready: {}", db_path.display());
        Ok(historian)
    }

    /// Create every per-kind table and the shared log table if missing.
    /// Safe to call repeatedly; runs once per process from [`Historian::open`].
    async fn ensure_schema(&self) -> Result<()> {
        for kind in SensorKind::ALL {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    timestamp TEXT NOT NULL,
                    {column} REAL NOT NULL
                )",
                table = kind.table(),
                column = kind.column(),
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY,
                event TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                description TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one sensor reading. Failures propagate to the caller and
    /// abort the current step; they are never silently dropped.
    pub async fn insert_reading(&self, reading: &SensorReading) -> Result<()> {
        // Table and column names come from the static register map, never
        // from user input.
        let sql = format!(
            "INSERT INTO {table} (timestamp, {column}) VALUES (?, ?)",
            table = reading.kind.table(),
            column = reading.kind.column(),
        );
        sqlx::query(&sql)
            .bind(reading.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .bind(reading.value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append one derived event to the shared log table
    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        sqlx::query("INSERT INTO logs (event, timestamp, description) VALUES (?, ?, ?)")
            .bind(event.name)
            .bind(event.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .bind(event.description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All persisted values for one sensor kind in insertion order
    pub async fn reading_values(&self, kind: SensorKind) -> Result<Vec<f64>> {
        let sql = format!(
            "SELECT {column} FROM {table} ORDER BY id",
            column = kind.column(),
            table = kind.table(),
        );
        let values: Vec<f64> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(values)
    }

    /// Most recent reading for one sensor kind as (timestamp, value)
    pub async fn latest_reading(&self, kind: SensorKind) -> Result<Option<(String, f64)>> {
        let sql = format!(
            "SELECT timestamp, {column} FROM {table} ORDER BY id DESC LIMIT 1",
            column = kind.column(),
            table = kind.table(),
        );
        let row: Option<(String, f64)> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    /// Persisted events in insertion order as (event, timestamp, description)
    pub async fn events(&self) -> Result<Vec<(String, String, String)>> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT event, timestamp, description FROM logs ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Underlying pool, for ad-hoc queries in tests
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, flushing outstanding writes
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
