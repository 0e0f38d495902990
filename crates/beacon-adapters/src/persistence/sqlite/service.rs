use async_trait::async_trait;
use sqlx::SqliteExecutor;

use beacon_core::service::{Service, ServiceKey};
use beacon_ports::error::PortError;
use beacon_ports::outbound::ServiceRepository;

use super::{decode, encode, persistence, SqliteTx};

pub(super) async fn find_by_key<'e, E: SqliteExecutor<'e>>(
    executor: E,
    key: &ServiceKey,
) -> Result<Option<Service>, PortError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT data FROM services WHERE namespace = ? AND service = ?")
            .bind(&key.namespace)
            .bind(&key.service)
            .fetch_optional(executor)
            .await
            .map_err(persistence)?;

    row.map(|(data,)| decode("services", &data)).transpose()
}

#[async_trait]
impl ServiceRepository for SqliteTx {
    async fn find_service(&mut self, key: &ServiceKey) -> Result<Option<Service>, PortError> {
        find_by_key(self.conn(), key).await
    }

    async fn save_service(&mut self, service: &Service) -> Result<(), PortError> {
        let data = encode(service)?;

        sqlx::query(
            "INSERT INTO services (namespace, service, data, last_seen)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(namespace, service) DO UPDATE SET
                data = excluded.data,
                last_seen = excluded.last_seen",
        )
        .bind(service.namespace())
        .bind(service.name())
        .bind(&data)
        .bind(service.last_seen().to_rfc3339())
        .execute(self.conn())
        .await
        .map_err(persistence)?;

        Ok(())
    }
}
