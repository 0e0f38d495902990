use async_trait::async_trait;
use sqlx::SqliteExecutor;

use beacon_core::alert::Fingerprint;
use beacon_core::ids::IncidentId;
use beacon_core::incident::Incident;
use beacon_ports::error::PortError;
use beacon_ports::outbound::IncidentRepository;

use super::{decode, encode, persistence, write_error, SqliteTx};

pub(super) async fn find_by_id<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: &IncidentId,
) -> Result<Option<Incident>, PortError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT data FROM incidents WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
        .map_err(persistence)?;

    row.map(|(data,)| decode("incidents", &data)).transpose()
}

#[async_trait]
impl IncidentRepository for SqliteTx {
    async fn current_for_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Incident>, PortError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM incidents
             WHERE fingerprint = ?
             ORDER BY CASE status WHEN 'firing' THEN 0 ELSE 1 END, start_ms DESC
             LIMIT 1",
        )
        .bind(fingerprint.as_str())
        .fetch_optional(self.conn())
        .await
        .map_err(persistence)?;

        row.map(|(data,)| decode("incidents", &data)).transpose()
    }

    async fn find_incident(&mut self, id: &IncidentId) -> Result<Option<Incident>, PortError> {
        find_by_id(self.conn(), id).await
    }

    async fn insert_incident(&mut self, incident: &Incident) -> Result<(), PortError> {
        let data = encode(incident)?;

        sqlx::query(
            "INSERT INTO incidents (id, fingerprint, status, namespace, service, start_ms, data, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(incident.id().to_string())
        .bind(incident.fingerprint().as_str())
        .bind(incident.status().as_str())
        .bind(incident.namespace())
        .bind(incident.service())
        .bind(incident.start_time().timestamp_millis())
        .bind(&data)
        .bind(incident.updated_at().to_rfc3339())
        .execute(self.conn())
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn update_incident(&mut self, incident: &Incident) -> Result<(), PortError> {
        let data = encode(incident)?;

        let result = sqlx::query(
            "UPDATE incidents SET status = ?, start_ms = ?, data = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(incident.status().as_str())
        .bind(incident.start_time().timestamp_millis())
        .bind(&data)
        .bind(incident.updated_at().to_rfc3339())
        .bind(incident.id().to_string())
        .execute(self.conn())
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound);
        }
        Ok(())
    }
}
