use async_trait::async_trait;
use sqlx::SqliteExecutor;

use beacon_core::ids::IncidentId;
use beacon_core::incident::IncidentEvent;
use beacon_ports::error::PortError;
use beacon_ports::outbound::EventLog;

use super::{decode, encode, persistence, write_error, SqliteTx};

pub(super) async fn for_incident<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: &IncidentId,
) -> Result<Vec<IncidentEvent>, PortError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT data FROM events WHERE incident_id = ? ORDER BY event_ms, seq",
    )
    .bind(id.to_string())
    .fetch_all(executor)
    .await
    .map_err(persistence)?;

    rows.iter().map(|(data,)| decode("events", data)).collect()
}

#[async_trait]
impl EventLog for SqliteTx {
    async fn append(&mut self, event: &IncidentEvent) -> Result<(), PortError> {
        let data = encode(event)?;

        sqlx::query(
            "INSERT INTO events (id, incident_id, kind, event_ms, data) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.id().to_string())
        .bind(event.incident_id().to_string())
        .bind(event.kind().as_str())
        .bind(event.time().timestamp_millis())
        .bind(&data)
        .execute(self.conn())
        .await
        .map_err(write_error)?;

        Ok(())
    }
}
