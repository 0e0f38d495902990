use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use beacon_ports::error::PortError;
use beacon_ports::outbound::UnitOfWork;

/// One SQLite transaction. Per-alert isolation uses a single named savepoint,
/// so savepoints do not nest.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTx {
    pub(super) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub(super) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    async fn exec(&mut self, statement: &str) -> Result<(), PortError> {
        sqlx::query(statement)
            .execute(self.conn())
            .await
            .map_err(|e| PortError::Transaction(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for SqliteTx {
    async fn savepoint(&mut self) -> Result<(), PortError> {
        self.exec("SAVEPOINT alert").await
    }

    async fn release_savepoint(&mut self) -> Result<(), PortError> {
        self.exec("RELEASE SAVEPOINT alert").await
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), PortError> {
        // ROLLBACK TO leaves the savepoint open.
        self.exec("ROLLBACK TO SAVEPOINT alert").await?;
        self.exec("RELEASE SAVEPOINT alert").await
    }

    async fn commit(self) -> Result<(), PortError> {
        self.tx
            .commit()
            .await
            .map_err(|e| PortError::Transaction(e.to_string()))
    }

    async fn rollback(self) -> Result<(), PortError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| PortError::Transaction(e.to_string()))
    }
}
