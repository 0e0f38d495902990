mod event;
mod incident;
mod query;
mod service;
mod tx;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use beacon_ports::error::PortError;
use beacon_ports::outbound::TransactionManager;

pub use tx::SqliteTx;

/// How long a writer waits for another batch to release the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: [&str; 7] = [
    "CREATE TABLE IF NOT EXISTS incidents (
        id TEXT PRIMARY KEY,
        fingerprint TEXT NOT NULL,
        status TEXT NOT NULL,
        namespace TEXT NOT NULL,
        service TEXT NOT NULL,
        start_ms INTEGER NOT NULL,
        data TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_incidents_fingerprint_start
     ON incidents(fingerprint, start_ms)",
    // At most one firing incident per fingerprint, across concurrent batches.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_incidents_one_firing
     ON incidents(fingerprint) WHERE status = 'firing'",
    "CREATE TABLE IF NOT EXISTS events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        incident_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        event_ms INTEGER NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_incident_time
     ON events(incident_id, event_ms)",
    "CREATE TABLE IF NOT EXISTS services (
        namespace TEXT NOT NULL,
        service TEXT NOT NULL,
        data TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        PRIMARY KEY (namespace, service)
    )",
    "CREATE INDEX IF NOT EXISTS idx_services_last_seen ON services(last_seen)",
];

#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Connects and creates the schema. In-memory databases are per
    /// connection, so `sqlite::memory:` needs `max_connections == 1`.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self, PortError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PortError::Connection(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| PortError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::debug!(url, max_connections, "sqlite store ready");
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), PortError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Persistence(e.to_string()))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TransactionManager for SqliteDb {
    type Tx = SqliteTx;

    /// Starts with the write lock held; concurrent batches queue on
    /// `BUSY_TIMEOUT`.
    async fn begin(&self) -> Result<SqliteTx, PortError> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| PortError::Connection(e.to_string()))?;
        Ok(SqliteTx::new(tx))
    }
}

fn persistence(e: sqlx::Error) -> PortError {
    PortError::Persistence(e.to_string())
}

/// Unique-index violations are conflicts the caller can recover from.
fn write_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        _ => persistence(e),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, PortError> {
    serde_json::to_string(value).map_err(|e| PortError::Persistence(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(table: &str, data: &str) -> Result<T, PortError> {
    serde_json::from_str(data).map_err(|e| {
        tracing::warn!(table, error = %e, "undecodable row");
        PortError::Corrupt(format!("{table}: {e}"))
    })
}
